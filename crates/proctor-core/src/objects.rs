//! Sampled object presence

use proctor_config::ObjectPolicy;
use std::collections::BTreeSet;

/// Tracks whether a target object is in view. Detection results are only
/// consulted on every Nth monitoring tick; in between, the last sampled
/// value is held.
#[derive(Debug, Clone)]
pub struct ObjectPresenceMonitor {
    targets: BTreeSet<String>,
    every: u64,
    present: bool,
}

impl ObjectPresenceMonitor {
    pub fn new(policy: &ObjectPolicy) -> Self {
        Self {
            targets: policy.target_labels.clone(),
            every: policy.sample_every_n_frames.max(1),
            present: false,
        }
    }

    /// `tick_index` counts monitoring ticks starting at 1.
    pub fn observe(&mut self, tick_index: u64, labels: &BTreeSet<String>) -> bool {
        if self.is_sampled(tick_index) {
            self.present = !self.targets.is_disjoint(labels);
        }
        self.present
    }

    pub fn is_sampled(&self, tick_index: u64) -> bool {
        tick_index % self.every == 0
    }

    pub fn is_present(&self) -> bool {
        self.present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_sampled_ticks_are_evaluated() {
        let mut monitor = ObjectPresenceMonitor::new(&ObjectPolicy::default());
        let phone = labels(&["cell phone"]);

        assert!(!monitor.observe(1, &phone));
        assert!(!monitor.observe(2, &phone));
        assert!(monitor.observe(3, &phone));
    }

    #[test]
    fn value_is_held_between_samples() {
        let mut monitor = ObjectPresenceMonitor::new(&ObjectPolicy::default());
        let none = BTreeSet::new();

        assert!(monitor.observe(3, &labels(&["cell phone", "person"])));
        assert!(monitor.observe(4, &none));
        assert!(monitor.observe(5, &none));
        assert!(!monitor.observe(6, &none));
    }

    #[test]
    fn non_target_labels_ignored() {
        let mut monitor = ObjectPresenceMonitor::new(&ObjectPolicy::default());
        assert!(!monitor.observe(3, &labels(&["book", "laptop"])));
    }

    #[test]
    fn custom_targets_and_interval() {
        let policy = ObjectPolicy {
            target_labels: labels(&["book"]),
            sample_every_n_frames: 1,
        };
        let mut monitor = ObjectPresenceMonitor::new(&policy);
        assert!(monitor.observe(1, &labels(&["book"])));
    }
}
