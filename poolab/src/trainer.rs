//! Epoch-driven training loop.
//!
//! Presents every corpus image to the pooler, in listing order, epoch
//! after epoch, until the stability monitor reports convergence or the
//! epoch budget runs out. Per-image failures are logged and skipped; the
//! loop itself only ever ends in `Stable` or `Exhausted`.

use std::path::{Path, PathBuf};

use neopool::homeostasis::HomeostasisController;
use neopool::pooler::SpatialPooler;
use neopool::sdr::Sdr;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::binarize::{binarize_image, load_vector};
use crate::error::LabError;
use crate::monitor::StabilityMonitor;
use crate::paths::LabPaths;

/// Loop states. `Running` only exists while an epoch is in flight; the
/// loop always returns one of the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Running,
    /// The monitor reported convergence. Terminal success.
    Stable,
    /// The epoch budget ran out first. Terminal but non-fatal: the
    /// partially trained pooler is still handed to evaluation.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainerConfig {
    /// Square size images are binarized to.
    pub image_size: u32,
    /// Hard cap on training epochs.
    pub max_epochs: usize,
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub state: LoopState,
    pub epochs_run: usize,
    /// Successful presentations across all epochs.
    pub presentations: usize,
    /// Images skipped due to per-image failures, across all epochs.
    pub skipped: usize,
}

/// Run the training loop to a terminal state. Guaranteed to finish within
/// `max_epochs` epochs.
pub fn train(
    corpus: &[PathBuf],
    cfg: TrainerConfig,
    paths: &LabPaths,
    pooler: &mut SpatialPooler,
    controller: &mut HomeostasisController,
    monitor: &mut StabilityMonitor,
) -> TrainOutcome {
    let input_len = (cfg.image_size * cfg.image_size) as usize;

    let mut state = LoopState::Running;
    let mut epochs_run = 0;
    let mut presentations = 0;
    let mut skipped = 0;

    while state == LoopState::Running {
        for image in corpus {
            match present(image, cfg.image_size, input_len, paths, pooler, controller, monitor) {
                Ok(active) => {
                    presentations += 1;
                    debug!(
                        epoch = epochs_run,
                        image = %image.display(),
                        active_columns = active.len(),
                        "presented"
                    );
                }
                Err(err) => {
                    skipped += 1;
                    warn!(image = %image.display(), error = %err, "skipping image");
                }
            }
        }
        epochs_run += 1;

        if monitor.is_stable() {
            state = LoopState::Stable;
        } else if epochs_run >= cfg.max_epochs {
            state = LoopState::Exhausted;
        }
    }

    info!(?state, epochs_run, presentations, skipped, "training finished");
    TrainOutcome {
        state,
        epochs_run,
        presentations,
        skipped,
    }
}

/// One presentation: binarize, reload, stimulate, let the detector see the
/// outcome, and pass its report on to the monitor.
fn present(
    image: &Path,
    image_size: u32,
    input_len: usize,
    paths: &LabPaths,
    pooler: &mut SpatialPooler,
    controller: &mut HomeostasisController,
    monitor: &mut StabilityMonitor,
) -> Result<Vec<usize>, LabError> {
    let artifact = binarize_image(image, image_size, &paths.binarized_dir())?;
    let bits = load_vector(&artifact, input_len)?;
    let input = Sdr::from_dense(&bits);

    let active = pooler.compute(&input, true)?;
    let report = controller.observe(&input, &active);
    monitor.notify(&report);

    Ok(active)
}
