//! Pulse ID sequence checking on the receiving side.

use tracing::{debug, warn};

/// How a received pulse ID relates to the previously adopted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseTransition {
    /// First pulse ID seen.
    First,
    /// Exactly one past the previous.
    Advance,
    /// Same as the previous.
    Duplicate,
    /// Pulse IDs in between were never received.
    Gap { missed: u64 },
    /// Lower than the previous; not adopted.
    Reverted,
}

/// Counters accumulated by a [`ConsistencyChecker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub missed: u64,
    pub duplicated: u64,
    pub reverted: u64,
}

/// Classifies each received pulse ID against the last adopted one.
///
/// Not synchronized: callers sharing a checker across threads serialize
/// access themselves.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyChecker {
    last: Option<u64>,
    statistics: Statistics,
}

impl ConsistencyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, pulse_id: u64) -> PulseTransition {
        let Some(last) = self.last else {
            self.last = Some(pulse_id);
            return PulseTransition::First;
        };

        if pulse_id == last {
            self.statistics.duplicated += 1;
            debug!(pulse_id, "duplicated pulse id");
            PulseTransition::Duplicate
        } else if pulse_id < last {
            self.statistics.reverted += 1;
            debug!(pulse_id, last, "pulse id reverted");
            PulseTransition::Reverted
        } else if pulse_id == last + 1 {
            self.last = Some(pulse_id);
            PulseTransition::Advance
        } else {
            let missed = pulse_id - last - 1;
            self.statistics.missed += missed;
            self.last = Some(pulse_id);
            warn!(
                expected = last + 1,
                received = pulse_id,
                missed,
                "skipped message detected"
            );
            PulseTransition::Gap { missed }
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Last adopted pulse ID.
    pub fn last_pulse_id(&self) -> Option<u64> {
        self.last
    }

    /// Forget the adopted pulse ID and zero the counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
