//! Post-training reconstruction and similarity scoring.
//!
//! For each corpus image, independently of how training ended: recompute
//! the active columns against the now-fixed pooler, reconstruct a
//! permanence profile from them, densify and threshold it into a binary
//! vector, and score it against the original input with Jaccard
//! similarity. Evaluation is best-effort: a failing image is logged and
//! skipped, the rest of the corpus is still scored.

use std::fs;
use std::path::{Path, PathBuf};

use neopool::pooler::SpatialPooler;
use neopool::sdr::{self, Sdr};
use tracing::{debug, info, warn};

use crate::binarize::{binarize_image, file_stem, load_vector};
use crate::error::LabError;
use crate::paths::LabPaths;

#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    /// Square size images are binarized to.
    pub image_size: u32,
    /// Cutoff that turns a reconstructed permanence sum into an active
    /// bit. Calibrated to the engine's permanence scale, not a
    /// probability.
    pub permanence_cutoff: f32,
}

/// One evaluated image.
#[derive(Debug, Clone)]
pub struct EvalRecord {
    pub image: PathBuf,
    /// Jaccard similarity of input vs normalized reconstruction, in [0,1].
    pub similarity: f64,
    /// Dense permanence profile, index-ascending, one entry per input bit.
    pub permanences: Vec<f32>,
    /// Thresholded reconstruction, same length as the input vector.
    pub reconstruction: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    /// One record per successfully evaluated image, in corpus order.
    pub records: Vec<EvalRecord>,
    pub skipped: usize,
}

impl EvalReport {
    pub fn similarities(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.similarity).collect()
    }

    pub fn mean_similarity(&self) -> f64 {
        if self.records.is_empty() {
            0.0
        } else {
            self.records.iter().map(|r| r.similarity).sum::<f64>() / self.records.len() as f64
        }
    }
}

/// Evaluate the whole corpus against the trained pooler.
///
/// The pooler is read/reconstruct-only here: every compute runs with
/// learning off, so evaluation cannot disturb the trained state.
pub fn evaluate(
    corpus: &[PathBuf],
    cfg: EvalConfig,
    paths: &LabPaths,
    pooler: &mut SpatialPooler,
) -> EvalReport {
    let mut report = EvalReport::default();

    for image in corpus {
        match evaluate_one(image, cfg, paths, pooler) {
            Ok(record) => {
                debug!(
                    image = %image.display(),
                    similarity = record.similarity,
                    reconstructed_bits = record.reconstruction.iter().filter(|&&b| b != 0).count(),
                    "evaluated"
                );
                report.records.push(record);
            }
            Err(err) => {
                report.skipped += 1;
                warn!(image = %image.display(), error = %err, "skipping image in evaluation");
            }
        }
    }

    info!(
        evaluated = report.records.len(),
        skipped = report.skipped,
        mean_similarity = report.mean_similarity(),
        "evaluation finished"
    );
    report
}

fn evaluate_one(
    image: &Path,
    cfg: EvalConfig,
    paths: &LabPaths,
    pooler: &mut SpatialPooler,
) -> Result<EvalRecord, LabError> {
    let input_len = (cfg.image_size * cfg.image_size) as usize;

    let artifact = binarize_image(image, cfg.image_size, &paths.binarized_dir())?;
    let bits = load_vector(&artifact, input_len)?;
    let input = Sdr::from_dense(&bits);

    let active = pooler.compute(&input, false)?;
    write_sdr_dump(&paths.sdr_dir(), image, &active)?;

    let sparse = pooler.reconstruct(&active)?;
    let permanences = densify(sparse, input_len);
    let reconstruction = threshold(&permanences, cfg.permanence_cutoff);

    let similarity = sdr::jaccard(&input, &Sdr::from_dense(&reconstruction));

    Ok(EvalRecord {
        image: image.to_path_buf(),
        similarity,
        permanences,
        reconstruction,
    })
}

/// Expand the engine's sparse reconstruction to one entry per input index,
/// ascending; indices absent from the map are 0.0.
pub fn densify(sparse: impl IntoIterator<Item = (usize, f32)>, len: usize) -> Vec<f32> {
    let mut dense = vec![0.0f32; len];
    for (index, permanence) in sparse {
        if index < len {
            dense[index] = permanence;
        }
    }
    dense
}

/// Strictly-greater cutoff: a value exactly at the cutoff stays 0.
pub fn threshold(values: &[f32], cutoff: f32) -> Vec<u8> {
    values.iter().map(|&v| (v > cutoff) as u8).collect()
}

/// One active column index per line, `SDR_Values/sdr_<stem>.csv`.
fn write_sdr_dump(dir: &Path, image: &Path, active: &[usize]) -> Result<PathBuf, LabError> {
    fs::create_dir_all(dir)?;
    let mut text = String::with_capacity(active.len() * 5);
    for index in active {
        text.push_str(&index.to_string());
        text.push('\n');
    }
    let out = dir.join(format!("sdr_{}.csv", file_stem(image)));
    fs::write(&out, text)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    use image::GrayImage;
    use neopool::pooler::PoolerConfig;

    fn scratch(name: &str) -> LabPaths {
        let dir = std::env::temp_dir().join(format!("poolab_eval_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("Sample")).unwrap();
        LabPaths::new(dir)
    }

    fn write_checkerboard(paths: &LabPaths, name: &str, size: u32) -> PathBuf {
        let img = GrayImage::from_fn(size, size, |x, y| {
            image::Luma([if (x + y) % 2 == 0 { 255 } else { 0 }])
        });
        let path = paths.sample_dir().join(name);
        img.save(&path).unwrap();
        path
    }

    fn test_pooler(input_count: usize) -> SpatialPooler {
        SpatialPooler::new(PoolerConfig {
            input_count,
            column_count: 64,
            potential_radius: input_count,
            potential_pct: 1.0,
            active_columns_per_round: 4,
            stimulus_threshold: 0,
            perm_connected: 0.5,
            perm_active_inc: 0.05,
            perm_inactive_dec: 0.008,
            duty_cycle_period: 100,
            min_pct_overlap_duty_cycles: 0.001,
            max_boost: 1.0,
            seed: Some(42),
        })
        .unwrap()
    }

    #[test]
    fn densify_always_covers_every_index() {
        // 99 is out of range and dropped.
        let sparse = vec![(2usize, 1.5f32), (5, 0.25), (99, 9.0)];

        let dense = densify(sparse, 8);
        assert_eq!(dense.len(), 8);
        assert_eq!(dense[2], 1.5);
        assert_eq!(dense[5], 0.25);
        assert_eq!(dense[0], 0.0);
        assert_eq!(dense[7], 0.0);
    }

    #[test]
    fn densify_of_empty_map_is_all_zero() {
        let dense = densify(std::iter::empty(), 16);
        assert_eq!(dense, vec![0.0f32; 16]);
    }

    #[test]
    fn threshold_is_strictly_greater() {
        let values = vec![30.4, 30.5, 30.6, 0.0];
        assert_eq!(threshold(&values, 30.5), vec![0, 0, 1, 0]);
    }

    #[test]
    fn all_below_cutoff_scores_zero_against_non_empty_input() {
        let permanences = vec![1.0f32, 2.0, 3.0, 0.5];
        let reconstruction = threshold(&permanences, 30.5);
        assert!(reconstruction.iter().all(|&b| b == 0));

        let input = Sdr::from_dense(&[1, 0, 1, 0]);
        let similarity = sdr::jaccard(&input, &Sdr::from_dense(&reconstruction));
        assert_eq!(similarity, 0.0);
    }

    #[test]
    fn corrupt_artifact_still_yields_a_similarity() {
        // The loader's lossy fallback feeds a zero-filled vector through
        // the same scoring path instead of skipping the image.
        let dir = scratch("corrupt");
        let artifact = dir.base().join("vec.csv");
        fs::write(&artifact, "junk,junk,junk,junk\n").unwrap();

        let bits = load_vector(&artifact, 4).unwrap();
        assert_eq!(bits, vec![0, 0, 0, 0]);

        let input = Sdr::from_dense(&bits);
        let reconstruction = Sdr::from_dense(&[0, 0, 0, 0]);
        // Both empty: similarity is defined, not a crash.
        assert_eq!(sdr::jaccard(&input, &reconstruction), 1.0);
    }

    #[test]
    fn evaluates_corpus_in_order_and_writes_sdr_dumps() {
        let paths = scratch("order");
        let corpus = vec![
            write_checkerboard(&paths, "img_0.png", 8),
            write_checkerboard(&paths, "img_1.png", 8),
        ];

        let mut pooler = test_pooler(64);
        let report = evaluate(
            &corpus,
            EvalConfig {
                image_size: 8,
                permanence_cutoff: 30.5,
            },
            &paths,
            &mut pooler,
        );

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.records[0].image, corpus[0]);
        assert_eq!(report.records[1].image, corpus[1]);
        for record in &report.records {
            assert_eq!(record.permanences.len(), 64);
            assert_eq!(record.reconstruction.len(), 64);
            assert!((0.0..=1.0).contains(&record.similarity));
        }

        assert!(paths.sdr_dir().join("sdr_img_0.csv").is_file());
        assert!(paths.sdr_dir().join("sdr_img_1.csv").is_file());
    }

    #[test]
    fn evaluation_leaves_the_pooler_untouched() {
        let paths = scratch("frozen");
        let corpus = vec![write_checkerboard(&paths, "img_0.png", 8)];

        let mut pooler = test_pooler(64);
        let before: Vec<f32> = pooler.column_synapses(0).unwrap().1.to_vec();

        evaluate(
            &corpus,
            EvalConfig {
                image_size: 8,
                permanence_cutoff: 30.5,
            },
            &paths,
            &mut pooler,
        );

        assert_eq!(pooler.column_synapses(0).unwrap().1, before.as_slice());
    }

    #[test]
    fn unreadable_image_is_skipped_not_fatal() {
        let paths = scratch("skip");
        let good = write_checkerboard(&paths, "img_good.png", 8);
        let bad = paths.sample_dir().join("img_bad.png");
        fs::write(&bad, b"nope").unwrap();

        let mut pooler = test_pooler(64);
        let report = evaluate(
            &[bad, good],
            EvalConfig {
                image_size: 8,
                permanence_cutoff: 30.5,
            },
            &paths,
            &mut pooler,
        );

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped, 1);
    }
}
