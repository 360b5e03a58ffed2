/// Default controller endpoint.
pub const DEFAULT_BRIDGE_URL: &str = "ws://localhost:3000";

/// Value of the `source` field stamped on every outbound message.
pub const MESSAGE_SOURCE: &str = "skinbridge";

pub const RECONNECT_DELAY_MS: u64 = 3_000;
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Delay between entering the interaction phase and the first render pass,
/// so the host tree can settle.
pub const PHASE_SETTLE_DELAY_MS: u64 = 100;

pub const LOCATOR_RETRY_DELAY_MS: u64 = 500;
pub const LOCATOR_RETRY_LIMIT: u32 = 5;

/// Host phases in which the overlay is allowed to act.
pub const INTERACTION_PHASES: &[&str] = &["ChampSelect", "FINALIZATION"];

// Inbound message kinds and the names the original plugin bridge used.
pub const KIND_STATE_UPDATE: &str = "state-update";
pub const KIND_STATE_UPDATE_LEGACY: &str = "random-mode-state";
pub const KIND_ASSET_DELIVERED: &str = "asset-delivered";
pub const KIND_ASSET_DELIVERED_LEGACY: &str = "local-asset-url";
pub const KIND_PHASE_SIGNAL: &str = "phase-signal";
pub const KIND_PHASE_SIGNAL_LEGACY: &str = "phase-change";
