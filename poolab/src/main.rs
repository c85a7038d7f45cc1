//! Image spatial-pattern experiment runner.
//!
//! Trains the spatial pooler on the prefix-filtered images under
//! `Sample/`, waits for the learned representation to stabilize (or for
//! the epoch budget to run out), then reconstructs every input from its
//! active columns and scores the reconstruction against the original.
//!
//! Artifacts, all relative to the working directory:
//! - `BinarizedImages/<name>.csv`: binarized input vectors
//! - `SDR_Values/sdr_<name>.csv`: active columns per image
//! - `SimilarityPlots_Image_Inputs/combined_similarity_plot.png`
//! - `1DHeatMap_Image_Inputs/heatmap_<n>.png`
//! - `run_summary.json`

use tracing::info;

mod binarize;
mod corpus;
mod error;
mod eval;
mod experiment;
mod monitor;
mod paths;
mod report;
mod trainer;

use experiment::ExperimentConfig;
use paths::LabPaths;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cfg = ExperimentConfig::default();
    let paths = LabPaths::new(std::env::current_dir()?);

    info!(
        base = %paths.base().display(),
        prefix = %cfg.input_prefix,
        image_size = cfg.image_size,
        columns = cfg.column_count(),
        max_epochs = cfg.max_epochs,
        "starting image spatial-pattern experiment"
    );

    let summary = experiment::run_experiment(&cfg, &paths)?;

    info!(
        state = ?summary.loop_state,
        epochs = summary.epochs_run,
        images = summary.images,
        mean_similarity = summary.mean_similarity,
        "done"
    );
    Ok(())
}
