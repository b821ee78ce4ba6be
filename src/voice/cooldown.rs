//! Per-label announcement cooldown

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// When each label was last announced
///
/// Keyed by the detector's original label, never the translation, so the
/// cooldown does not depend on which language the translator returns.
/// Entries are never evicted; the detector vocabulary bounds the map.
#[derive(Debug)]
pub struct AnnouncementState {
    last: HashMap<String, Instant>,
    cooldown: Duration,
}

impl AnnouncementState {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last: HashMap::new(),
            cooldown,
        }
    }

    /// Decide whether `label` may be announced at `now`, recording it if so
    ///
    /// The timestamp is recorded before any speech happens, so a second
    /// detection arriving while the first is still being spoken is skipped.
    pub fn should_announce(&mut self, label: &str, now: Instant) -> bool {
        let due = self
            .last
            .get(label)
            .is_none_or(|last| now.saturating_duration_since(*last) > self.cooldown);

        if due {
            self.last.insert(label.to_string(), now);
        }
        due
    }

    /// Last announcement time for `label`
    #[must_use]
    pub fn last_announced(&self, label: &str) -> Option<Instant> {
        self.last.get(label).copied()
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
