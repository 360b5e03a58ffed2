//! Mutation watcher: decides whether a batch of host-tree changes should
//! re-trigger placement and reconciliation.

use crate::host::Mutation;
use crate::phase::PhaseGate;

#[derive(Debug, Clone)]
pub struct MutationWatcher {
    own_class: String,
    seen: u64,
    relevant: u64,
}

impl MutationWatcher {
    /// `own_class` marks nodes the overlay created; changes to those never
    /// re-trigger it.
    pub fn new(own_class: impl Into<String>) -> Self {
        Self {
            own_class: own_class.into(),
            seen: 0,
            relevant: 0,
        }
    }

    pub fn observe(&mut self, gate: &PhaseGate, batch: &[Mutation]) -> bool {
        self.seen += 1;
        if !gate.in_phase() {
            return false;
        }

        let relevant = batch
            .iter()
            .any(|m| !m.classes.iter().any(|c| *c == self.own_class));
        if relevant {
            self.relevant += 1;
        } else if !batch.is_empty() {
            tracing::trace!(records = batch.len(), "Ignoring self-inflicted mutations");
        }
        relevant
    }

    /// Batches observed so far, and how many of them were relevant.
    pub fn stats(&self) -> (u64, u64) {
        (self.seen, self.relevant)
    }
}
