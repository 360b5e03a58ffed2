//! skinbridge overlay - state reconciliation core
//!
//! Reflects controller state onto a host visual tree the overlay does not
//! own. The tree is rebuilt out-of-band, so the anchor is searched for again
//! on every pass, retried a bounded number of times, and every override is
//! torn down as soon as the host leaves the interaction phase or the
//! controller deactivates.

pub mod assets;
pub mod error;
pub mod host;
pub mod locator;
pub mod memory;
pub mod overlay;
pub mod phase;
pub mod reconciler;
pub mod timer;
pub mod watcher;

pub use assets::{AssetResolver, Interest, Resolution};
pub use error::HostError;
pub use host::{HostTree, Mutation, MutationKind, NodeId, Priority, Rect};
pub use locator::{AnchorStrategy, ControlGeometry, Located, LocatorConfig, TreeLocator};
pub use memory::{MemoryTree, NodeSpec, StyleEntry};
pub use overlay::{Env, Overlay, OverlayConfig};
pub use phase::{PhaseConfig, PhaseGate, PhaseTransition};
pub use reconciler::{FlagOutcome, MarkerConfig, RenderReconciler, RetryCounter};
pub use timer::{TimerEvent, Timers};
pub use watcher::MutationWatcher;
