//! Delayed self-events.
//!
//! The core never sleeps. Anything that has to happen later is requested
//! through [`Timers`] and comes back as a [`TimerEvent`] stamped with the
//! phase epoch it was armed in, so a timer that outlives its phase is inert.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerEvent {
    /// The host tree had time to settle after entering the phase.
    PhaseSettled { epoch: u64 },
    /// Retry locating the anchor.
    LocatorRetry { epoch: u64 },
}

impl TimerEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            Self::PhaseSettled { epoch } | Self::LocatorRetry { epoch } => *epoch,
        }
    }
}

pub trait Timers {
    fn schedule(&mut self, delay: Duration, event: TimerEvent);
}

/// Records requests instead of firing them; the caller decides when.
impl Timers for Vec<(Duration, TimerEvent)> {
    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        self.push((delay, event));
    }
}
