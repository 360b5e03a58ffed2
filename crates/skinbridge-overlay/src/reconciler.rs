//! Render reconciler: converges the anchor and the injected control to the
//! latest known state.
//!
//! Every pass re-derives the anchor from the live tree. The only node ids
//! kept between passes are the anchor we last wrote overrides to (so they can
//! be torn down) and the control node we created ourselves.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use skinbridge_protocol::{ActivationState, ControlMode, ResourceHandle, ResourceKey};

use crate::assets::{AssetResolver, Interest, Resolution};
use crate::host::{HostTree, NodeId, Priority, Rect};
use crate::locator::TreeLocator;
use crate::overlay::Env;
use crate::phase::PhaseGate;
use crate::timer::TimerEvent;

const PLACEMENT_MISS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Fixed properties written to the anchor alongside the image.
const FLAG_OVERRIDES: &[(&str, &str)] = &[
    ("display", "block"),
    ("visibility", "visible"),
    ("opacity", "1"),
    ("background-repeat", "no-repeat"),
    ("background-size", "contain"),
    ("height", "32px"),
    ("width", "32px"),
    ("position", "absolute"),
    ("right", "-14px"),
    ("top", "-14px"),
    ("pointer-events", "none"),
    ("cursor", "default"),
    ("-webkit-user-select", "none"),
    ("list-style-type", "none"),
    ("content", " "),
];

const BACKGROUND_IMAGE: &str = "background-image";

/// Class names the reconciler writes or looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Tags an anchor carrying our overrides.
    pub marker_class: String,
    /// Tags an anchor also used by another overlay feature.
    pub foreign_marker_class: String,
    /// Carried by the injected control node.
    pub control_class: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            marker_class: "lu-random-flag-active".to_string(),
            foreign_marker_class: "lu-historic-flag-active".to_string(),
            control_class: "lu-random-dice-button".to_string(),
        }
    }
}

/// Bounded per-operation retry counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    attempts: u32,
    limit: u32,
}

impl RetryCounter {
    pub fn new(limit: u32) -> Self {
        Self { attempts: 0, limit }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count one more attempt. Returns `false` once the bound is reached.
    pub fn try_next(&mut self) -> bool {
        if self.attempts < self.limit {
            self.attempts += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Result of one flag reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    /// Not in the interaction phase; nothing was touched.
    Skipped,
    /// No anchor yet; a retry is armed (or already was).
    Retrying,
    /// No anchor after the last allowed retry.
    Abandoned,
    /// Inactive; overrides were cleared.
    Cleared,
    /// Active, but the flag image has not been delivered yet.
    AwaitingAsset,
    Applied,
}

#[derive(Debug)]
pub struct RenderReconciler {
    markers: MarkerConfig,
    retry: RetryCounter,
    retry_delay: Duration,
    retry_pending: bool,
    rendered: Option<NodeId>,
    control: Option<NodeId>,
    control_mode: Option<ControlMode>,
    last_placement_miss: Option<Instant>,
}

impl RenderReconciler {
    pub fn new(markers: MarkerConfig, retry_limit: u32, retry_delay: Duration) -> Self {
        Self {
            markers,
            retry: RetryCounter::new(retry_limit),
            retry_delay,
            retry_pending: false,
            rendered: None,
            control: None,
            control_mode: None,
            last_placement_miss: None,
        }
    }

    /// Anchor currently carrying our overrides.
    pub fn rendered_anchor(&self) -> Option<NodeId> {
        self.rendered
    }

    pub fn control_node(&self) -> Option<NodeId> {
        self.control
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry.attempts()
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Called when a locator retry timer of the current epoch fires.
    pub fn retry_fired(&mut self) {
        self.retry_pending = false;
    }

    /// One locate-and-render pass for the flag.
    pub fn reconcile_flag(
        &mut self,
        gate: &PhaseGate,
        activation: ActivationState,
        locator: &TreeLocator,
        assets: &mut AssetResolver,
        env: &mut Env<'_>,
    ) -> FlagOutcome {
        if !gate.in_phase() {
            return FlagOutcome::Skipped;
        }

        if !activation.active {
            if let Some(previous) = self.rendered.take() {
                self.clear_overrides(previous, assets, env.tree);
            }
        }

        let Some(located) = locator.locate_anchor(gate, &*env.tree) else {
            return self.anchor_missing(gate, env);
        };
        self.retry.reset();
        let anchor = located.node;

        if let Some(previous) = self.rendered {
            if previous != anchor {
                tracing::debug!(previous = %previous, anchor = %anchor, "Selection changed, clearing previous anchor");
                self.clear_overrides(previous, assets, env.tree);
                self.rendered = None;
            }
        }

        if !activation.active {
            self.clear_overrides(anchor, assets, env.tree);
            return FlagOutcome::Cleared;
        }

        let handle = match assets.resolve(ResourceKey::Flag, Interest::Flag, env.outbox) {
            Resolution::Ready(handle) => handle,
            Resolution::Pending => {
                tracing::debug!(anchor = %anchor, "Flag image pending");
                return FlagOutcome::AwaitingAsset;
            }
        };

        let fresh = !env.tree.has_class(anchor, self.markers.marker_class.as_str());
        self.apply_overrides(anchor, &handle, env.tree);
        self.rendered = Some(anchor);
        if fresh {
            tracing::info!(
                anchor = %anchor,
                strategy = %located.strategy,
                handle = %handle,
                "Flag shown on anchor"
            );
        }
        FlagOutcome::Applied
    }

    fn anchor_missing(&mut self, gate: &PhaseGate, env: &mut Env<'_>) -> FlagOutcome {
        if let Some(previous) = self.rendered {
            if !env.tree.contains(previous) {
                self.rendered = None;
            }
        }

        if self.retry_pending {
            return FlagOutcome::Retrying;
        }

        if self.retry.try_next() {
            tracing::debug!(attempt = self.retry.attempts(), "Anchor not found, will retry");
            self.retry_pending = true;
            env.timers.schedule(
                self.retry_delay,
                TimerEvent::LocatorRetry {
                    epoch: gate.epoch(),
                },
            );
            FlagOutcome::Retrying
        } else {
            tracing::warn!(
                retries = self.retry.attempts(),
                "Anchor not found after retries, giving up"
            );
            self.retry.reset();
            FlagOutcome::Abandoned
        }
    }

    fn apply_overrides(&self, anchor: NodeId, handle: &ResourceHandle, tree: &mut dyn HostTree) {
        for (property, value) in FLAG_OVERRIDES {
            tree.set_style(anchor, property, value, Priority::Important);
        }
        tree.add_class(anchor, self.markers.marker_class.as_str());
        tree.set_style(anchor, BACKGROUND_IMAGE, &handle.css_url(), Priority::Important);
    }

    /// Remove what we wrote to `node`, leaving a foreign overlay's shared
    /// properties in place.
    fn clear_overrides(&self, node: NodeId, assets: &AssetResolver, tree: &mut dyn HostTree) {
        if !tree.contains(node) {
            return;
        }
        tree.remove_class(node, self.markers.marker_class.as_str());

        if tree.has_class(node, self.markers.foreign_marker_class.as_str()) {
            let ours = tree
                .style(node, BACKGROUND_IMAGE)
                .is_some_and(|image| is_our_flag_image(&image, assets));
            if ours {
                tree.remove_style(node, BACKGROUND_IMAGE);
            }
            tracing::debug!(node = %node, removed_image = ours, "Foreign marker present, kept shared styles");
            return;
        }

        tree.remove_style(node, BACKGROUND_IMAGE);
        for (property, _) in FLAG_OVERRIDES {
            tree.remove_style(node, property);
        }
    }

    /// Create, reposition and restyle the control for `mode`.
    pub fn sync_control(
        &mut self,
        gate: &PhaseGate,
        mode: ControlMode,
        locator: &TreeLocator,
        assets: &mut AssetResolver,
        env: &mut Env<'_>,
    ) {
        if !gate.in_phase() {
            return;
        }

        if let Some(node) = self.control {
            if !env.tree.contains(node) {
                tracing::debug!(node = %node, "Control removed by host, recreating");
                self.control = None;
                self.control_mode = None;
            }
        }

        let Some(rect) = locator.locate_placement(gate, &*env.tree) else {
            self.placement_missing();
            return;
        };

        let node = match self.control {
            Some(node) => node,
            None => {
                let node = env
                    .tree
                    .append_to_root(&[self.markers.control_class.as_str(), mode.as_str()]);
                tracing::info!(node = %node, x = rect.x, y = rect.y, mode = %mode, "Created control");
                self.control = Some(node);
                self.control_mode = Some(mode);
                node
            }
        };

        self.position_control(node, rect, locator, env.tree);

        if self.control_mode != Some(mode) {
            env.tree.remove_class(node, mode.other().as_str());
            env.tree.add_class(node, mode.as_str());
            tracing::debug!(node = %node, mode = %mode, "Control mode changed");
            self.control_mode = Some(mode);
        }

        assets.prefetch(mode.other().resource_key(), env.outbox);
        match assets.resolve(mode.resource_key(), Interest::Control, env.outbox) {
            Resolution::Ready(handle) => {
                env.tree
                    .set_style(node, BACKGROUND_IMAGE, &handle.css_url(), Priority::Normal);
            }
            Resolution::Pending => env.tree.remove_style(node, BACKGROUND_IMAGE),
        }
    }

    fn position_control(
        &self,
        node: NodeId,
        rect: Rect,
        locator: &TreeLocator,
        tree: &mut dyn HostTree,
    ) {
        let z_index = locator.geometry().z_index.to_string();
        let styles = [
            ("position", "fixed".to_string()),
            ("left", px(rect.x)),
            ("top", px(rect.y)),
            ("width", px(rect.width)),
            ("height", px(rect.height)),
            ("z-index", z_index),
        ];
        for (property, value) in &styles {
            tree.set_style(node, property, value, Priority::Normal);
        }
    }

    fn placement_missing(&mut self) {
        let now = Instant::now();
        let due = self
            .last_placement_miss
            .map_or(true, |at| now.duration_since(at) >= PLACEMENT_MISS_LOG_INTERVAL);
        if due {
            tracing::debug!("Control placement not found, will retry");
            self.last_placement_miss = Some(now);
        }
    }

    /// Whether `node` is the live control node.
    pub fn is_control(&self, node: NodeId, tree: &dyn HostTree) -> bool {
        self.control == Some(node) && tree.contains(node)
    }

    /// Drop every override and the control node, and forget retry state.
    pub fn teardown(&mut self, assets: &AssetResolver, tree: &mut dyn HostTree) {
        let mut marked = tree.select_all(&[self.markers.marker_class.as_str()]);
        if let Some(previous) = self.rendered.take() {
            if !marked.contains(&previous) {
                marked.push(previous);
            }
        }
        for node in marked {
            self.clear_overrides(node, assets, tree);
        }

        if let Some(control) = self.control.take() {
            if tree.contains(control) {
                tree.remove(control);
            }
        }
        self.control_mode = None;
        self.retry.reset();
        self.retry_pending = false;
        tracing::debug!("Overlay torn down");
    }
}

fn is_our_flag_image(image: &str, assets: &AssetResolver) -> bool {
    let by_handle = assets
        .handle(ResourceKey::Flag)
        .is_some_and(|handle| image == handle.css_url() || image.contains(handle.as_str()));
    by_handle || image.contains(ResourceKey::Flag.asset_path())
}

fn px(value: f64) -> String {
    format!("{value}px")
}
