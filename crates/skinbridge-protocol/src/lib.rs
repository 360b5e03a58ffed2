//! skinbridge protocol - wire messages and shared types
//!
//! Defines the JSON messages exchanged with the external controller process
//! over the bridge channel, the logical resource keys the overlay asks the
//! controller to deliver, and the `Outbox` seam every component sends
//! through.

pub mod constants;
pub mod error;
pub mod messages;
pub mod types;

pub use constants::*;
pub use error::*;
pub use messages::*;
pub use types::*;

/// Sink for outbound controller messages.
///
/// The bridge handle implements this for the live channel; a plain `Vec`
/// implements it so the core can be driven without a socket.
pub trait Outbox {
    fn send(&mut self, message: OutboundMessage);
}

impl Outbox for Vec<OutboundMessage> {
    fn send(&mut self, message: OutboundMessage) {
        self.push(message);
    }
}
