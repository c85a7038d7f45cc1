//! Homeostatic stability detection.
//!
//! Watches the pooler's output one presented input at a time and decides
//! when the learned mapping has stopped changing. Each distinct input
//! pattern is fingerprinted; the active set it produced last time is
//! compared (Jaccard) against the one it produces now. When every known
//! pattern reproduces itself at or above the similarity threshold, and the
//! patience budget of total presentations has elapsed, the detector
//! reports stable.
//!
//! The detector re-evaluates on every call and will report a reversion if
//! the mapping drifts after going stable. What to *do* about a reversion
//! is the consumer's policy, not decided here.

use hashbrown::HashMap;

use crate::sdr::{jaccard_indices, Sdr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HomeostasisConfig {
    /// Minimum number of presented inputs before the detector may report
    /// stable. Callers derive this as `image_count * cycles_per_image`.
    pub patience: usize,
    /// Per-pattern Jaccard similarity required between consecutive
    /// presentations for the pattern to count as settled.
    pub similarity_threshold: f64,
}

impl Default for HomeostasisConfig {
    fn default() -> Self {
        Self {
            patience: 100,
            similarity_threshold: 0.975,
        }
    }
}

/// What the detector tells its consumer after each presented input.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilityReport {
    pub is_stable: bool,
    /// Distinct input patterns seen so far.
    pub num_patterns: usize,
    /// Running mean of active columns per presentation.
    pub avg_active_columns: f64,
    /// Total inputs presented so far.
    pub total_inputs_seen: usize,
}

#[derive(Debug, Clone)]
struct PatternTrack {
    previous_active: Vec<usize>,
    presentations: usize,
    settled: bool,
}

#[derive(Debug, Clone)]
pub struct HomeostasisController {
    cfg: HomeostasisConfig,
    patterns: HashMap<u64, PatternTrack>,
    total_inputs_seen: usize,
    active_column_total: usize,
}

impl HomeostasisController {
    pub fn new(cfg: HomeostasisConfig) -> Self {
        Self {
            cfg,
            patterns: HashMap::new(),
            total_inputs_seen: 0,
            active_column_total: 0,
        }
    }

    /// Record one presentation: the input pattern and the active set the
    /// engine produced for it. Returns the detector's current verdict.
    pub fn observe(&mut self, input: &Sdr, active: &[usize]) -> StabilityReport {
        self.total_inputs_seen += 1;
        self.active_column_total += active.len();

        let key = fingerprint(input.active());
        let threshold = self.cfg.similarity_threshold;
        let track = self.patterns.entry(key).or_insert_with(|| PatternTrack {
            previous_active: Vec::new(),
            presentations: 0,
            settled: false,
        });

        if track.presentations > 0 {
            let similarity = jaccard_indices(&track.previous_active, active);
            track.settled = similarity >= threshold;
        }
        track.presentations += 1;
        track.previous_active = active.to_vec();

        self.report()
    }

    pub fn report(&self) -> StabilityReport {
        StabilityReport {
            is_stable: self.is_stable(),
            num_patterns: self.patterns.len(),
            avg_active_columns: self.avg_active_columns(),
            total_inputs_seen: self.total_inputs_seen,
        }
    }

    fn is_stable(&self) -> bool {
        self.total_inputs_seen >= self.cfg.patience
            && !self.patterns.is_empty()
            && self
                .patterns
                .values()
                .all(|t| t.presentations >= 2 && t.settled)
    }

    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    pub fn total_inputs_seen(&self) -> usize {
        self.total_inputs_seen
    }

    fn avg_active_columns(&self) -> f64 {
        if self.total_inputs_seen == 0 {
            0.0
        } else {
            self.active_column_total as f64 / self.total_inputs_seen as f64
        }
    }
}

/// FNV-1a over the active indices. Collisions would merge two patterns'
/// tracks; at corpus scale (tens of images) this is not a concern.
fn fingerprint(indices: &[usize]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &i in indices {
        for byte in (i as u64).to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(bits: &[usize]) -> Sdr {
        Sdr::from_sparse(64, bits.to_vec())
    }

    #[test]
    fn repeated_identical_pattern_turns_stable_after_patience() {
        let mut ctl = HomeostasisController::new(HomeostasisConfig {
            patience: 4,
            similarity_threshold: 0.975,
        });
        let pattern = input(&[1, 5, 9]);
        let active = vec![3, 17, 40];

        let mut first_stable_at = None;
        for n in 1..=8 {
            let report = ctl.observe(&pattern, &active);
            assert_eq!(report.total_inputs_seen, n);
            if report.is_stable && first_stable_at.is_none() {
                first_stable_at = Some(n);
            }
        }
        assert_eq!(first_stable_at, Some(4));
    }

    #[test]
    fn never_stable_before_patience() {
        let mut ctl = HomeostasisController::new(HomeostasisConfig {
            patience: 100,
            similarity_threshold: 0.975,
        });
        let pattern = input(&[2, 3]);
        for _ in 0..50 {
            assert!(!ctl.observe(&pattern, &[7, 8]).is_stable);
        }
    }

    #[test]
    fn drifting_active_set_is_not_stable() {
        let mut ctl = HomeostasisController::new(HomeostasisConfig {
            patience: 2,
            similarity_threshold: 0.975,
        });
        let pattern = input(&[2, 3]);
        let mut report = ctl.observe(&pattern, &[1, 2, 3]);
        for n in 0..10 {
            // A different active set every time.
            report = ctl.observe(&pattern, &[n, n + 1]);
        }
        assert!(!report.is_stable);
    }

    #[test]
    fn stability_can_revert_when_mapping_drifts() {
        let mut ctl = HomeostasisController::new(HomeostasisConfig {
            patience: 2,
            similarity_threshold: 0.975,
        });
        let pattern = input(&[4, 6]);
        ctl.observe(&pattern, &[10, 11]);
        let settled = ctl.observe(&pattern, &[10, 11]);
        assert!(settled.is_stable);

        let drifted = ctl.observe(&pattern, &[50, 51]);
        assert!(!drifted.is_stable);
    }

    #[test]
    fn tracks_distinct_patterns_separately() {
        let mut ctl = HomeostasisController::new(HomeostasisConfig {
            patience: 4,
            similarity_threshold: 0.975,
        });
        let a = input(&[1]);
        let b = input(&[2]);

        ctl.observe(&a, &[10]);
        ctl.observe(&b, &[20]);
        ctl.observe(&a, &[10]);
        let report = ctl.observe(&b, &[20]);

        assert_eq!(report.num_patterns, 2);
        assert!(report.is_stable);
    }

    #[test]
    fn one_unsettled_pattern_blocks_stability() {
        let mut ctl = HomeostasisController::new(HomeostasisConfig {
            patience: 2,
            similarity_threshold: 0.975,
        });
        let a = input(&[1]);
        let b = input(&[2]);

        ctl.observe(&a, &[10]);
        ctl.observe(&a, &[10]);
        // Pattern b has been seen only once; no self-similarity sample yet.
        let report = ctl.observe(&b, &[20]);
        assert!(!report.is_stable);
    }

    #[test]
    fn avg_active_columns_is_running_mean() {
        let mut ctl = HomeostasisController::new(HomeostasisConfig::default());
        let pattern = input(&[1]);
        ctl.observe(&pattern, &[1, 2, 3, 4]);
        let report = ctl.observe(&pattern, &[1, 2]);
        assert!((report.avg_active_columns - 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_active_sets_count_as_settled() {
        // An engine that produces nothing still reproduces "nothing"
        // exactly; the empty/empty similarity is defined as 1.0.
        let mut ctl = HomeostasisController::new(HomeostasisConfig {
            patience: 2,
            similarity_threshold: 0.975,
        });
        let pattern = input(&[9]);
        ctl.observe(&pattern, &[]);
        let report = ctl.observe(&pattern, &[]);
        assert!(report.is_stable);
    }
}
