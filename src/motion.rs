//! Short-lived motion labels
//!
//! Gesture recognizers run at their own rate and report labels such as
//! "wave" or "swipe left". Each label stays visible for a fixed time after it
//! was last recorded, so a consumer polling at frame rate sees a stable value
//! instead of flicker.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

/// Where a motion label was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotionSlot {
    /// A single tracked hand, by id
    Hand(u32),
    Left,
    Right,
    /// Both hands together
    Both,
}

impl MotionSlot {
    /// How long a label stays visible when no explicit TTL is given
    pub fn default_ttl(self) -> Duration {
        match self {
            MotionSlot::Hand(_) => Duration::from_millis(2500),
            MotionSlot::Left | MotionSlot::Right => Duration::from_millis(1500),
            MotionSlot::Both => Duration::from_millis(2000),
        }
    }

    fn priority(self) -> (u8, u32) {
        match self {
            MotionSlot::Both => (0, 0),
            MotionSlot::Left => (1, 0),
            MotionSlot::Right => (2, 0),
            MotionSlot::Hand(id) => (3, id),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    label: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared board of the most recent label per slot
#[derive(Debug, Clone, Default)]
pub struct MotionBoard {
    entries: Arc<RwLock<BTreeMap<MotionSlot, Entry>>>,
}

impl MotionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label with the slot's default TTL
    pub fn record(&self, slot: MotionSlot, label: impl Into<String>) {
        self.record_with_ttl(slot, label, slot.default_ttl());
    }

    /// Record a label that expires `ttl` from now, replacing any previous one
    pub fn record_with_ttl(&self, slot: MotionSlot, label: impl Into<String>, ttl: Duration) {
        let entry = Entry {
            label: label.into(),
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, entry);
    }

    /// Live label for one slot
    pub fn current(&self, slot: MotionSlot) -> Option<String> {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.label.clone())
    }

    /// Most relevant live label
    ///
    /// Two-handed motion wins over either hand, left over right, and
    /// individually tracked hands come last in id order.
    pub fn headline(&self) -> Option<(MotionSlot, String)> {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .min_by_key(|(slot, _)| slot.priority())
            .map(|(slot, entry)| (*slot, entry.label.clone()))
    }

    /// Drop expired entries, returning how many were removed
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet pruned
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_label_visible_for_ttl() {
        let board = MotionBoard::new();
        board.record(MotionSlot::Left, "swipe");

        tokio::time::advance(Duration::from_millis(1499)).await;
        assert_eq!(board.current(MotionSlot::Left).as_deref(), Some("swipe"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(board.current(MotionSlot::Left), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_refreshes_expiry() {
        let board = MotionBoard::new();
        board.record(MotionSlot::Hand(0), "wave");

        tokio::time::advance(Duration::from_secs(2)).await;
        board.record(MotionSlot::Hand(0), "wave");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(board.current(MotionSlot::Hand(0)).as_deref(), Some("wave"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_headline_priority() {
        let board = MotionBoard::new();
        board.record(MotionSlot::Hand(2), "point");
        board.record(MotionSlot::Hand(1), "fist");
        assert_eq!(board.headline(), Some((MotionSlot::Hand(1), "fist".into())));

        board.record(MotionSlot::Right, "swipe right");
        board.record(MotionSlot::Left, "swipe left");
        assert_eq!(board.headline(), Some((MotionSlot::Left, "swipe left".into())));

        board.record(MotionSlot::Both, "clap");
        assert_eq!(board.headline(), Some((MotionSlot::Both, "clap".into())));

        // Both expires at 2.0s, left and right at 1.5s, hands at 2.5s
        tokio::time::advance(Duration::from_millis(2100)).await;
        assert_eq!(board.headline(), Some((MotionSlot::Hand(1), "fist".into())));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(board.headline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_removes_only_expired() {
        let board = MotionBoard::new();
        board.record_with_ttl(MotionSlot::Left, "a", Duration::from_millis(100));
        board.record_with_ttl(MotionSlot::Right, "b", Duration::from_secs(10));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(board.len(), 2);
        assert_eq!(board.prune(), 1);
        assert_eq!(board.len(), 1);
        assert_eq!(board.current(MotionSlot::Right).as_deref(), Some("b"));
    }

    #[test]
    fn test_clones_share_state() {
        let board = MotionBoard::new();
        let other = board.clone();
        other.record(MotionSlot::Both, "clap");

        assert_eq!(board.current(MotionSlot::Both).as_deref(), Some("clap"));
    }
}
