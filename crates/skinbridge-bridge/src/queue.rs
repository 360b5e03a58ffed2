use std::collections::VecDeque;

/// Connection state of the bridge channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Serialized messages waiting for the channel to open.
///
/// Append-only while the channel is not open. `take_snapshot` drains the whole
/// queue at once, so anything pushed afterwards belongs to the next flush.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: VecDeque<String>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: String) {
        self.items.push_back(text);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove and return every queued message in enqueue order.
    pub fn take_snapshot(&mut self) -> Vec<String> {
        std::mem::take(&mut self.items).into()
    }

    /// Put messages a flush could not deliver back ahead of anything queued
    /// since, keeping their relative order.
    pub fn restore_front(&mut self, unsent: Vec<String>) {
        for text in unsent.into_iter().rev() {
            self.items.push_front(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_fifo_and_empties_queue() {
        let mut queue = OutboundQueue::new();
        queue.push("a".into());
        queue.push("b".into());
        queue.push("c".into());

        assert_eq!(queue.take_snapshot(), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
        assert!(queue.take_snapshot().is_empty());
    }

    #[test]
    fn pushes_after_snapshot_wait_for_next_flush() {
        let mut queue = OutboundQueue::new();
        queue.push("first".into());
        let snapshot = queue.take_snapshot();
        queue.push("late".into());

        assert_eq!(snapshot, vec!["first"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.take_snapshot(), vec!["late"]);
    }

    #[test]
    fn restore_front_keeps_original_order() {
        let mut queue = OutboundQueue::new();
        queue.push("x".into());
        queue.push("y".into());
        queue.push("z".into());
        let mut snapshot = queue.take_snapshot();
        let unsent = snapshot.split_off(1);

        queue.push("later".into());
        queue.restore_front(unsent);

        assert_eq!(queue.take_snapshot(), vec!["y", "z", "later"]);
    }
}
