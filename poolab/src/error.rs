//! Error taxonomy of the experiment pipeline.
//!
//! Image-scoped variants are caught at the training/evaluation boundary,
//! logged with the offending file, and skipped. Run-scoped variants abort
//! the run before training starts. No failure is ever retried.

use std::path::PathBuf;

use neopool::pooler::PoolerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabError {
    /// Source image could not be decoded. Fatal for that image only.
    #[error("cannot decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A persisted binarized vector has the wrong length. Fatal for that
    /// image only.
    #[error("binarized vector {path} has {actual} elements, expected {expected}")]
    ShapeMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// No images match the prefix filter. Fatal for the whole run.
    #[error("no images matching prefix `{prefix}` under {dir}")]
    CorpusEmpty { dir: PathBuf, prefix: String },

    /// Propagated unchanged from the learning engine.
    #[error("engine error: {0}")]
    Engine(#[from] PoolerError),

    /// A rendered artifact could not be written.
    #[error("cannot write artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
