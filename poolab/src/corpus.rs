//! Corpus discovery.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LabError;

/// List the training corpus: files under `sample_dir` whose name starts
/// with `prefix` and ends with `.png`, sorted by file name.
///
/// `read_dir` order is platform-dependent; the sort is what makes epoch
/// presentation order reproducible across runs.
pub fn discover(sample_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, LabError> {
    let mut images = Vec::new();

    if sample_dir.is_dir() {
        for entry in fs::read_dir(sample_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if name.starts_with(prefix) && name.ends_with(".png") {
                images.push(path);
            }
        }
    }

    images.sort();

    if images.is_empty() {
        return Err(LabError::CorpusEmpty {
            dir: sample_dir.to_path_buf(),
            prefix: prefix.to_string(),
        });
    }
    Ok(images)
}
