//! Asset resolver: logical resource key → delivered handle.
//!
//! Handles live for the whole process; the first delivery for a key wins.
//! At most one request per key is ever outstanding, no matter how many
//! render passes ask for it.

use std::collections::{HashMap, HashSet};

use skinbridge_protocol::{OutboundMessage, Outbox, ResourceHandle, ResourceKey};

/// Who is waiting on a resource, to be re-run when it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interest {
    Flag,
    Control,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(ResourceHandle),
    Pending,
}

#[derive(Debug, Default)]
pub struct AssetResolver {
    handles: HashMap<ResourceKey, ResourceHandle>,
    pending: HashSet<ResourceKey>,
    interest: HashMap<ResourceKey, HashSet<Interest>>,
}

impl AssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `key`, or request it and report `Pending`.
    ///
    /// `interest` is remembered until delivery so the caller can be re-run.
    pub fn resolve(
        &mut self,
        key: ResourceKey,
        interest: Interest,
        outbox: &mut dyn Outbox,
    ) -> Resolution {
        if let Some(handle) = self.handles.get(&key) {
            return Resolution::Ready(handle.clone());
        }
        self.interest.entry(key).or_default().insert(interest);
        self.request(key, outbox);
        Resolution::Pending
    }

    /// Request `key` without registering interest in its delivery.
    pub fn prefetch(&mut self, key: ResourceKey, outbox: &mut dyn Outbox) {
        if !self.handles.contains_key(&key) {
            self.request(key, outbox);
        }
    }

    fn request(&mut self, key: ResourceKey, outbox: &mut dyn Outbox) {
        if self.pending.insert(key) {
            tracing::debug!(key = %key, asset = key.asset_path(), "Requesting asset");
            outbox.send(OutboundMessage::asset_request(key));
        }
    }

    /// Store a delivered handle and return whoever was waiting on it.
    ///
    /// Later deliveries for an already resolved key are ignored.
    pub fn on_delivery(&mut self, key: ResourceKey, handle: ResourceHandle) -> Vec<Interest> {
        if self.handles.contains_key(&key) {
            tracing::debug!(key = %key, "Ignoring repeated asset delivery");
            return Vec::new();
        }
        tracing::info!(key = %key, handle = %handle, "Asset delivered");
        self.handles.insert(key, handle);
        self.pending.remove(&key);

        let mut waiting: Vec<Interest> = self
            .interest
            .remove(&key)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        waiting.sort();
        waiting
    }

    pub fn handle(&self, key: ResourceKey) -> Option<&ResourceHandle> {
        self.handles.get(&key)
    }

    pub fn is_pending(&self, key: ResourceKey) -> bool {
        self.pending.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_resolves_issue_one_request() {
        let mut resolver = AssetResolver::new();
        let mut outbox: Vec<OutboundMessage> = Vec::new();

        for _ in 0..5 {
            assert_eq!(
                resolver.resolve(ResourceKey::Flag, Interest::Flag, &mut outbox),
                Resolution::Pending
            );
        }
        resolver.prefetch(ResourceKey::Flag, &mut outbox);

        assert_eq!(outbox, vec![OutboundMessage::asset_request(ResourceKey::Flag)]);
        assert!(resolver.is_pending(ResourceKey::Flag));
    }

    #[test]
    fn delivery_notifies_each_interest_once() {
        let mut resolver = AssetResolver::new();
        let mut outbox: Vec<OutboundMessage> = Vec::new();
        resolver.resolve(ResourceKey::DiceEnabled, Interest::Control, &mut outbox);
        resolver.resolve(ResourceKey::DiceEnabled, Interest::Control, &mut outbox);
        resolver.resolve(ResourceKey::DiceEnabled, Interest::Flag, &mut outbox);

        let waiting = resolver.on_delivery(ResourceKey::DiceEnabled, ResourceHandle::new("u"));
        assert_eq!(waiting, vec![Interest::Flag, Interest::Control]);
        assert!(!resolver.is_pending(ResourceKey::DiceEnabled));
    }

    #[test]
    fn first_delivery_wins() {
        let mut resolver = AssetResolver::new();
        let mut outbox: Vec<OutboundMessage> = Vec::new();
        resolver.resolve(ResourceKey::Flag, Interest::Flag, &mut outbox);

        resolver.on_delivery(ResourceKey::Flag, ResourceHandle::new("first"));
        let waiting = resolver.on_delivery(ResourceKey::Flag, ResourceHandle::new("second"));

        assert!(waiting.is_empty());
        assert_eq!(resolver.handle(ResourceKey::Flag), Some(&ResourceHandle::new("first")));
        assert_eq!(
            resolver.resolve(ResourceKey::Flag, Interest::Flag, &mut outbox),
            Resolution::Ready(ResourceHandle::new("first"))
        );
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn unsolicited_delivery_is_cached() {
        let mut resolver = AssetResolver::new();
        let mut outbox: Vec<OutboundMessage> = Vec::new();

        assert!(resolver
            .on_delivery(ResourceKey::DiceDisabled, ResourceHandle::new("d"))
            .is_empty());
        resolver.prefetch(ResourceKey::DiceDisabled, &mut outbox);
        assert!(outbox.is_empty());
    }
}
