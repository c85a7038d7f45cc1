//! Stability monitor.
//!
//! Consumes the engine's per-input stability reports and owns the
//! run-level stable/unstable decision the training loop polls.

use neopool::homeostasis::StabilityReport;
use tracing::{info, warn};

/// Tracks whether the engine has converged.
///
/// The first stable report latches the monitor. What happens on a later
/// unstable report is an explicit policy choice, not a silent default:
/// with `ignore_instability_after_stable` the reversion is logged and
/// counted but the monitor stays latched; without it the monitor drops
/// back to unstable so training resumes.
#[derive(Debug)]
pub struct StabilityMonitor {
    stable: bool,
    ignore_instability_after_stable: bool,
    reversions: u32,
}

impl StabilityMonitor {
    pub fn new(ignore_instability_after_stable: bool) -> Self {
        Self {
            stable: false,
            ignore_instability_after_stable,
            reversions: 0,
        }
    }

    /// Feed one report from the engine's stability detector.
    pub fn notify(&mut self, report: &StabilityReport) {
        if report.is_stable {
            if !self.stable {
                info!(
                    num_patterns = report.num_patterns,
                    total_inputs = report.total_inputs_seen,
                    avg_active_columns = report.avg_active_columns,
                    "entered stable state"
                );
            }
            self.stable = true;
        } else if self.stable {
            self.reversions += 1;
            if self.ignore_instability_after_stable {
                warn!(
                    reversions = self.reversions,
                    "stability reverted; keeping stable state"
                );
            } else {
                warn!(
                    reversions = self.reversions,
                    "stability reverted; resuming training"
                );
                self.stable = false;
            }
        }
    }

    /// Read-only query the training loop uses for its termination check.
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// How many stable-to-unstable signals have been observed.
    pub fn reversions(&self) -> u32 {
        self.reversions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(is_stable: bool) -> StabilityReport {
        StabilityReport {
            is_stable,
            num_patterns: 3,
            avg_active_columns: 40.0,
            total_inputs_seen: 150,
        }
    }

    #[test]
    fn starts_unstable() {
        let monitor = StabilityMonitor::new(true);
        assert!(!monitor.is_stable());
        assert_eq!(monitor.reversions(), 0);
    }

    #[test]
    fn latches_on_first_stable_report() {
        let mut monitor = StabilityMonitor::new(true);
        monitor.notify(&report(false));
        assert!(!monitor.is_stable());
        monitor.notify(&report(true));
        assert!(monitor.is_stable());
    }

    #[test]
    fn ignoring_policy_keeps_stable_through_reversion() {
        let mut monitor = StabilityMonitor::new(true);
        monitor.notify(&report(true));
        monitor.notify(&report(false));
        monitor.notify(&report(false));

        assert!(monitor.is_stable());
        assert_eq!(monitor.reversions(), 2);
    }

    #[test]
    fn strict_policy_reverts_on_instability() {
        let mut monitor = StabilityMonitor::new(false);
        monitor.notify(&report(true));
        monitor.notify(&report(false));

        assert!(!monitor.is_stable());
        assert_eq!(monitor.reversions(), 1);

        // It can latch again.
        monitor.notify(&report(true));
        assert!(monitor.is_stable());
    }

    #[test]
    fn unstable_reports_before_first_stable_are_not_reversions() {
        let mut monitor = StabilityMonitor::new(false);
        monitor.notify(&report(false));
        monitor.notify(&report(false));
        assert_eq!(monitor.reversions(), 0);
    }
}
