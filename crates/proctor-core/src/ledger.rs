//! Violation counters and termination thresholds

use proctor_api::{GazeCounts, IdentityFlags, TerminationReason};
use proctor_config::ProctorPolicy;

/// Limits the ledger compares counters against. Each limit must be exceeded,
/// not merely reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerLimits {
    pub max_identity_violations: u32,
    pub max_gaze_per_direction: u32,
    pub max_gaze_total: u32,
    pub iris_fault_limit: u32,
    pub iris_fault_divisor: u32,
}

impl LedgerLimits {
    pub fn from_policy(policy: &ProctorPolicy) -> Self {
        Self {
            max_identity_violations: policy.identity.max_violations,
            max_gaze_per_direction: policy.gaze.max_per_direction,
            max_gaze_total: policy.gaze.max_total,
            iris_fault_limit: policy.iris.fault_limit,
            iris_fault_divisor: policy.iris.fault_count_divisor,
        }
    }
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self::from_policy(&ProctorPolicy::default())
    }
}

/// One monitor's contribution to a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Identity(IdentityFlags),
    Device { present: bool },
    Gaze(GazeCounts),
    Iris { fault_count: u32 },
}

/// Owns the identity counter and decides termination from every signal.
#[derive(Debug, Clone)]
pub struct ViolationLedger {
    limits: LedgerLimits,
    identity_count: u32,
    identity_active: bool,
}

impl ViolationLedger {
    pub fn new(limits: LedgerLimits) -> Self {
        Self {
            limits,
            identity_count: 0,
            identity_active: false,
        }
    }

    /// Apply one signal. Identity signals update the rising-edge counter
    /// before the limit is checked.
    pub fn check(&mut self, signal: Signal) -> Option<TerminationReason> {
        match signal {
            Signal::Identity(flags) => {
                let now = flags.is_violation();
                if now && !self.identity_active {
                    self.identity_count += 1;
                }
                self.identity_active = now;

                (self.identity_count > self.limits.max_identity_violations)
                    .then_some(TerminationReason::FaceProctoring)
            }
            Signal::Device { present } => present.then_some(TerminationReason::DeviceMobile),
            Signal::Gaze(counts) => {
                let per_direction = self.limits.max_gaze_per_direction;
                let over = counts.left > per_direction
                    || counts.right > per_direction
                    || counts.up > per_direction
                    || counts.total() > self.limits.max_gaze_total;
                over.then_some(TerminationReason::GazeAway)
            }
            Signal::Iris { fault_count } => {
                let ratio = f64::from(fault_count) / f64::from(self.limits.iris_fault_divisor);
                (ratio > f64::from(self.limits.iris_fault_limit))
                    .then_some(TerminationReason::IrisMismatch)
            }
        }
    }

    /// Apply signals in order; the first that terminates wins and the rest
    /// are not applied.
    pub fn evaluate(&mut self, signals: &[Signal]) -> Option<TerminationReason> {
        signals.iter().find_map(|signal| self.check(*signal))
    }

    pub fn identity_count(&self) -> u32 {
        self.identity_count
    }

    pub fn identity_active(&self) -> bool {
        self.identity_active
    }

    pub fn limits(&self) -> &LedgerLimits {
        &self.limits
    }
}
