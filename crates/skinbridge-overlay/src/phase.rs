//! Phase gate: whether the host is in the phase where the overlay may act.

use serde::{Deserialize, Serialize};

use skinbridge_protocol::{INTERACTION_PHASES, PHASE_SETTLE_DELAY_MS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Host phase identifiers that count as the interaction phase.
    pub interaction_phases: Vec<String>,
    /// Delay before the first render pass after entering the phase.
    pub settle_delay_ms: u64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            interaction_phases: INTERACTION_PHASES.iter().map(|p| p.to_string()).collect(),
            settle_delay_ms: PHASE_SETTLE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    Entered,
    Exited,
    Unchanged,
}

/// Edge-triggered view of the host phase.
///
/// `epoch` counts phase exits. Timers are stamped with the epoch they were
/// armed in and ignored if it has moved on.
#[derive(Debug, Clone)]
pub struct PhaseGate {
    allowed: Vec<String>,
    in_phase: bool,
    epoch: u64,
}

impl PhaseGate {
    pub fn new(config: &PhaseConfig) -> Self {
        Self {
            allowed: config.interaction_phases.clone(),
            in_phase: false,
            epoch: 0,
        }
    }

    pub fn in_phase(&self) -> bool {
        self.in_phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a timer armed in `epoch` may still act.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.in_phase && self.epoch == epoch
    }

    pub fn on_signal(&mut self, phase: &str) -> PhaseTransition {
        let was = self.in_phase;
        self.in_phase = self.allowed.iter().any(|p| p == phase);

        match (was, self.in_phase) {
            (false, true) => PhaseTransition::Entered,
            (true, false) => {
                self.epoch += 1;
                PhaseTransition::Exited
            }
            _ => PhaseTransition::Unchanged,
        }
    }
}
