//! The owning overlay component.
//!
//! One [`Overlay`] is built per process and holds every piece of mutable
//! core state. Events are fed in one at a time through the `handle_*`
//! methods; side effects go out through the [`Env`] seams.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use skinbridge_protocol::{
    ActivationState, AssetDelivered, InboundMessage, OutboundMessage, Outbox, PhaseSignal,
    ResourceHandle, ResourceKey, StateUpdate,
};

use crate::assets::{AssetResolver, Interest};
use crate::host::{HostTree, Mutation, NodeId};
use crate::locator::{ControlGeometry, LocatorConfig, TreeLocator};
use crate::phase::{PhaseConfig, PhaseGate, PhaseTransition};
use crate::reconciler::{FlagOutcome, MarkerConfig, RenderReconciler};
use crate::timer::{TimerEvent, Timers};
use crate::watcher::MutationWatcher;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub phase: PhaseConfig,
    pub locator: LocatorConfig,
    pub control: ControlGeometry,
    pub markers: MarkerConfig,
    /// Request every asset up front instead of on first use.
    pub prefetch_assets: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            phase: PhaseConfig::default(),
            locator: LocatorConfig::default(),
            control: ControlGeometry::default(),
            markers: MarkerConfig::default(),
            prefetch_assets: true,
        }
    }
}

/// Side-effect seams for one dispatch.
pub struct Env<'a> {
    pub tree: &'a mut dyn HostTree,
    pub outbox: &'a mut dyn Outbox,
    pub timers: &'a mut dyn Timers,
}

impl<'a> Env<'a> {
    pub fn new(
        tree: &'a mut dyn HostTree,
        outbox: &'a mut dyn Outbox,
        timers: &'a mut dyn Timers,
    ) -> Self {
        Self {
            tree,
            outbox,
            timers,
        }
    }
}

pub struct Overlay {
    gate: PhaseGate,
    activation: ActivationState,
    assets: AssetResolver,
    locator: TreeLocator,
    reconciler: RenderReconciler,
    watcher: MutationWatcher,
    settle_delay: Duration,
    prefetch_assets: bool,
}

impl Overlay {
    pub fn new(config: OverlayConfig) -> Self {
        let retry_limit = config.locator.retry_limit;
        let retry_delay = Duration::from_millis(config.locator.retry_delay_ms);
        let watcher = MutationWatcher::new(config.markers.control_class.clone());

        Self {
            gate: PhaseGate::new(&config.phase),
            activation: ActivationState::default(),
            assets: AssetResolver::new(),
            locator: TreeLocator::new(config.locator, config.control),
            reconciler: RenderReconciler::new(config.markers, retry_limit, retry_delay),
            watcher,
            settle_delay: Duration::from_millis(config.phase.settle_delay_ms),
            prefetch_assets: config.prefetch_assets,
        }
    }

    /// Initial asset requests. Nothing is rendered until a phase signal
    /// says the host is in the interaction phase.
    pub fn start(&mut self, outbox: &mut dyn Outbox) {
        if self.prefetch_assets {
            for key in ResourceKey::ALL {
                self.assets.prefetch(key, outbox);
            }
        }
        tracing::info!(prefetch = self.prefetch_assets, "Overlay started");
    }

    pub fn handle_inbound(&mut self, message: InboundMessage, env: &mut Env<'_>) {
        match message {
            InboundMessage::StateUpdate(update) => self.on_state_update(&update, env),
            InboundMessage::AssetDelivered(delivery) => self.on_asset_delivered(&delivery, env),
            InboundMessage::PhaseSignal(signal) => self.on_phase_signal(&signal, env),
        }
    }

    fn on_state_update(&mut self, update: &StateUpdate, env: &mut Env<'_>) {
        let previous = self.activation;
        self.activation = update.activation();
        tracing::info!(
            active = self.activation.active,
            was_active = previous.active,
            mode = %self.activation.control_mode,
            context = ?update.context_id,
            "State update received"
        );

        if !self.gate.in_phase() {
            return;
        }
        self.sync_control(env);
        // Re-run even on redundant updates; the anchor may have been missing.
        self.reconcile_flag(env);
    }

    fn on_asset_delivered(&mut self, delivery: &AssetDelivered, env: &mut Env<'_>) {
        let Some(key) = delivery.resource_key() else {
            tracing::debug!(key = %delivery.key, "Ignoring delivery for unknown asset");
            return;
        };
        let Some(handle) = delivery.handle_ref.as_deref().filter(|h| !h.is_empty()) else {
            tracing::debug!(key = %key, "Ignoring delivery without a handle");
            return;
        };

        let waiting = self.assets.on_delivery(key, ResourceHandle::new(handle));
        if !self.gate.in_phase() {
            return;
        }
        // Every delivery is a trigger, whether or not a pass got far enough
        // to register interest. Both passes are idempotent.
        let control_image = self.activation.control_mode.resource_key();
        if key == control_image || waiting.contains(&Interest::Control) {
            self.sync_control(env);
        }
        if key == ResourceKey::Flag && self.activation.active {
            self.reconcile_flag(env);
        }
    }

    fn on_phase_signal(&mut self, signal: &PhaseSignal, env: &mut Env<'_>) {
        match self.gate.on_signal(signal.phase()) {
            PhaseTransition::Entered => {
                tracing::debug!(phase = signal.phase(), "Entered interaction phase");
                env.timers.schedule(
                    self.settle_delay,
                    TimerEvent::PhaseSettled {
                        epoch: self.gate.epoch(),
                    },
                );
            }
            PhaseTransition::Exited => {
                tracing::debug!(phase = signal.phase(), "Left interaction phase");
                self.reconciler.teardown(&self.assets, env.tree);
            }
            PhaseTransition::Unchanged => {}
        }
    }

    pub fn handle_timer(&mut self, event: TimerEvent, env: &mut Env<'_>) {
        if !self.gate.is_current(event.epoch()) {
            tracing::debug!(?event, epoch = self.gate.epoch(), "Ignoring stale timer");
            return;
        }

        match event {
            TimerEvent::PhaseSettled { .. } => {
                self.sync_control(env);
                if self.activation.active {
                    self.reconcile_flag(env);
                }
            }
            TimerEvent::LocatorRetry { .. } => {
                self.reconciler.retry_fired();
                self.reconcile_flag(env);
            }
        }
    }

    pub fn handle_mutations(&mut self, batch: &[Mutation], env: &mut Env<'_>) {
        if !self.watcher.observe(&self.gate, batch) {
            return;
        }
        self.sync_control(env);
        if self.activation.active {
            self.reconcile_flag(env);
        }
    }

    /// A click on `node`. Only the live control reacts, and only in phase.
    pub fn handle_click(&mut self, node: NodeId, env: &mut Env<'_>) -> bool {
        if !self.gate.in_phase() || !self.reconciler.is_control(node, &*env.tree) {
            tracing::debug!(node = %node, "Ignoring click");
            return false;
        }
        let mode = self.activation.control_mode;
        tracing::info!(mode = %mode, "Control clicked");
        env.outbox.send(OutboundMessage::control_click(mode));
        true
    }

    fn reconcile_flag(&mut self, env: &mut Env<'_>) -> FlagOutcome {
        self.reconciler.reconcile_flag(
            &self.gate,
            self.activation,
            &self.locator,
            &mut self.assets,
            env,
        )
    }

    fn sync_control(&mut self, env: &mut Env<'_>) {
        self.reconciler.sync_control(
            &self.gate,
            self.activation.control_mode,
            &self.locator,
            &mut self.assets,
            env,
        );
    }

    pub fn in_phase(&self) -> bool {
        self.gate.in_phase()
    }

    pub fn activation(&self) -> ActivationState {
        self.activation
    }

    pub fn control_node(&self) -> Option<NodeId> {
        self.reconciler.control_node()
    }

    pub fn rendered_anchor(&self) -> Option<NodeId> {
        self.reconciler.rendered_anchor()
    }

    pub fn retry_attempts(&self) -> u32 {
        self.reconciler.retry_attempts()
    }

    /// Whether a locator retry timer is outstanding.
    pub fn retry_pending(&self) -> bool {
        self.reconciler.retry_pending()
    }

    pub fn assets(&self) -> &AssetResolver {
        &self.assets
    }

    pub fn watcher(&self) -> &MutationWatcher {
        &self.watcher
    }
}
