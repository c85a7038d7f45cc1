//! The image spatial-pattern experiment.
//!
//! Orchestration only: discover the corpus, build the engine and its
//! stability plumbing, run the training loop until convergence or the
//! epoch budget, score reconstructions, and emit the run's artifacts.

use neopool::homeostasis::{HomeostasisConfig, HomeostasisController};
use neopool::pooler::{PoolerConfig, SpatialPooler};
use serde::Serialize;
use tracing::info;

use crate::corpus;
use crate::error::LabError;
use crate::eval::{self, EvalConfig};
use crate::monitor::StabilityMonitor;
use crate::paths::LabPaths;
use crate::report;
use crate::trainer::{self, LoopState, TrainerConfig};

/// Fixed configuration of one run. There are no runtime flags; a run is
/// fully described by this struct.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentConfig {
    /// Corpus file-name prefix filter.
    pub input_prefix: String,
    /// Square size images are binarized to.
    pub image_size: u32,
    /// Column grid of the pooler.
    pub column_grid: (usize, usize),
    /// Stability patience, in presentations per corpus image.
    pub cycles_per_image: usize,
    /// Hard cap on training epochs.
    pub max_epochs: usize,
    /// Per-pattern similarity required for stability.
    pub similarity_threshold: f64,
    /// Cutoff that turns a reconstructed permanence sum into an active
    /// bit.
    pub permanence_cutoff: f32,
    /// Keep the stable state once entered even if the detector reverts.
    pub ignore_instability_after_stable: bool,
    /// Engine seed.
    pub seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            input_prefix: String::new(),
            image_size: 28,
            column_grid: (64, 64),
            cycles_per_image: 50,
            max_epochs: 5,
            similarity_threshold: 0.975,
            permanence_cutoff: 30.5,
            ignore_instability_after_stable: true,
            seed: 42,
        }
    }
}

impl ExperimentConfig {
    pub fn input_count(&self) -> usize {
        (self.image_size * self.image_size) as usize
    }

    pub fn column_count(&self) -> usize {
        self.column_grid.0 * self.column_grid.1
    }

    /// Pooler parameters derived from the run constants: receptive fields
    /// span 15% of the input, 6% of columns win each round, and starved
    /// columns may be boosted up to 5x.
    pub fn pooler_config(&self) -> PoolerConfig {
        let input_count = self.input_count();
        let column_count = self.column_count();
        PoolerConfig {
            input_count,
            column_count,
            potential_radius: ((input_count as f32) * 0.15) as usize,
            potential_pct: 0.5,
            active_columns_per_round: (((column_count as f32) * 0.06).round() as usize).max(1),
            stimulus_threshold: 10,
            perm_connected: 0.5,
            perm_active_inc: 0.05,
            perm_inactive_dec: 0.008,
            duty_cycle_period: 100,
            min_pct_overlap_duty_cycles: 1.0,
            max_boost: 5.0,
            seed: Some(self.seed),
        }
    }

    pub fn homeostasis_config(&self, image_count: usize) -> HomeostasisConfig {
        HomeostasisConfig {
            patience: image_count * self.cycles_per_image,
            similarity_threshold: self.similarity_threshold,
        }
    }
}

/// Machine-readable outcome of one run, persisted as `run_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub config: ExperimentConfig,
    pub images: usize,
    pub loop_state: LoopState,
    pub epochs_run: usize,
    pub presentations: usize,
    pub train_skipped: usize,
    pub eval_skipped: usize,
    pub stability_reversions: u32,
    pub similarities: Vec<f64>,
    pub mean_similarity: f64,
}

/// Run the whole experiment under `paths`. Aborts before training on an
/// empty corpus or an invalid engine configuration; per-image trouble is
/// handled inside the loop and the evaluator.
pub fn run_experiment(
    cfg: &ExperimentConfig,
    paths: &LabPaths,
) -> Result<ExperimentSummary, LabError> {
    let corpus = corpus::discover(&paths.sample_dir(), &cfg.input_prefix)?;
    info!(images = corpus.len(), dir = %paths.sample_dir().display(), "corpus discovered");

    let mut pooler = SpatialPooler::new(cfg.pooler_config())?;
    let mut controller = HomeostasisController::new(cfg.homeostasis_config(corpus.len()));
    let mut monitor = StabilityMonitor::new(cfg.ignore_instability_after_stable);

    let outcome = trainer::train(
        &corpus,
        TrainerConfig {
            image_size: cfg.image_size,
            max_epochs: cfg.max_epochs,
        },
        paths,
        &mut pooler,
        &mut controller,
        &mut monitor,
    );

    let eval_report = eval::evaluate(
        &corpus,
        EvalConfig {
            image_size: cfg.image_size,
            permanence_cutoff: cfg.permanence_cutoff,
        },
        paths,
        &mut pooler,
    );

    let similarities = eval_report.similarities();
    report::write_similarity_plot(&similarities, &paths.similarity_plot_file())?;

    let rows: Vec<&[f32]> = eval_report
        .records
        .iter()
        .map(|r| r.permanences.as_slice())
        .collect();
    report::write_heatmaps(&rows, &paths.heatmap_dir())?;

    let summary = ExperimentSummary {
        config: cfg.clone(),
        images: corpus.len(),
        loop_state: outcome.state,
        epochs_run: outcome.epochs_run,
        presentations: outcome.presentations,
        train_skipped: outcome.skipped,
        eval_skipped: eval_report.skipped,
        stability_reversions: monitor.reversions(),
        similarities,
        mean_similarity: eval_report.mean_similarity(),
    };
    report::write_run_summary(&paths.run_summary_file(), &summary)?;

    info!(
        state = ?summary.loop_state,
        epochs = summary.epochs_run,
        mean_similarity = summary.mean_similarity,
        "experiment complete"
    );
    Ok(summary)
}
