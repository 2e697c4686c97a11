//! The bounded pending-message queue the admission step (spec-wise: one
//! per ingestion path) drains against the transform oracle. Kept as a
//! plain FIFO with drop-oldest-on-overflow, the same shape as
//! `tsdfmap_submap`'s deintegration queue, rather than a channel: this
//! queue is single-writer/single-reader (one `Pipeline` instance drains
//! its own queue) and needs to drop the *oldest* entry on overflow, which
//! a bounded channel doesn't expose directly.

use std::collections::VecDeque;

use tsdfmap_core::Position;

/// Maximum number of unresolved messages an ingestion path holds onto
/// before dropping the oldest. Mirrors the original server's queue depth.
pub const MAX_QUEUE_SIZE: usize = 10;

/// A raw inbound pointcloud message, not yet resolved against the
/// transform oracle. Points are in the sensor's own frame.
#[derive(Clone, Debug)]
pub struct RawPointcloud {
    pub timestamp: f64,
    pub frame_id: String,
    pub points: Vec<Position>,
    pub colors: Option<Vec<[u8; 3]>>,
}

/// A bounded FIFO of [`RawPointcloud`] messages awaiting transform
/// resolution.
#[derive(Default)]
pub struct PendingQueue {
    items: VecDeque<RawPointcloud>,
}

impl PendingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new message, dropping the oldest if this exceeds
    /// [`MAX_QUEUE_SIZE`].
    pub fn push(&mut self, msg: RawPointcloud) {
        self.items.push_back(msg);
        while self.items.len() > MAX_QUEUE_SIZE {
            self.items.pop_front();
            tracing::warn!("pointcloud queue exceeded capacity; dropped oldest message");
        }
    }

    #[must_use]
    pub fn front(&self) -> Option<&RawPointcloud> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<RawPointcloud> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(t: f64) -> RawPointcloud {
        RawPointcloud {
            timestamp: t,
            frame_id: "camera".into(),
            points: Vec::new(),
            colors: None,
        }
    }

    #[test]
    fn push_beyond_capacity_drops_oldest() {
        let mut queue = PendingQueue::new();
        for i in 0..(MAX_QUEUE_SIZE + 3) {
            queue.push(msg(i as f64));
        }
        assert_eq!(queue.len(), MAX_QUEUE_SIZE);
        assert_eq!(queue.front().unwrap().timestamp, 3.0);
    }

    #[test]
    fn pop_front_returns_oldest_first() {
        let mut queue = PendingQueue::new();
        queue.push(msg(1.0));
        queue.push(msg(2.0));
        assert_eq!(queue.pop_front().unwrap().timestamp, 1.0);
        assert_eq!(queue.pop_front().unwrap().timestamp, 2.0);
        assert!(queue.is_empty());
    }
}
