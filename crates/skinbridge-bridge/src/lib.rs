//! Bridge channel to the external controller.
//!
//! A long-lived WebSocket sidecar connection: messages submitted while the
//! channel is not open are queued and flushed in order once it opens, inbound
//! frames are parsed and delivered in arrival order, and every close or
//! connect failure schedules another attempt after a fixed delay.

pub mod client;
pub mod error;
pub mod queue;

pub use client::{bridge, BridgeClient, BridgeConfig, BridgeHandle};
pub use error::{BridgeError, Result};
pub use queue::{ChannelState, OutboundQueue};
