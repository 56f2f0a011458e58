//! Snapshot History
//!
//! Bounded in-memory buffer of recent database snapshots, oldest first.
//! Only the driving loop touches it, between cycles, so there is no locking.

use super::model::DatabaseSnapshot;

/// Maximum number of snapshots kept in memory
pub const HISTORY_CAPACITY: usize = 100;

/// Ordered store of captured snapshots
#[derive(Debug)]
pub struct SnapshotHistory {
    snapshots: Vec<DatabaseSnapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a snapshot.
    ///
    /// When the history would grow past its capacity it is collapsed to hold
    /// only the snapshot just appended; this is not a sliding window.
    pub fn append(&mut self, snapshot: DatabaseSnapshot) {
        if self.snapshots.len() >= self.capacity {
            let dropped = self.snapshots.len();
            self.snapshots.clear();
            tracing::debug!("Collapsed snapshot history, dropped {} snapshots", dropped);
        }
        self.snapshots.push(snapshot);
    }

    /// The most recent snapshot, if any
    pub fn latest(&self) -> Option<&DatabaseSnapshot> {
        self.snapshots.last()
    }

    /// The two most recent snapshots as (older, newer)
    pub fn latest_pair(&self) -> Option<(&DatabaseSnapshot, &DatabaseSnapshot)> {
        match self.snapshots.as_slice() {
            [.., older, newer] => Some((older, newer)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn snapshot_at(seconds: i64) -> DatabaseSnapshot {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        DatabaseSnapshot::new(base + Duration::seconds(seconds), vec![], vec![])
    }

    #[test]
    fn test_latest_pair_needs_two_snapshots() {
        let mut history = SnapshotHistory::new();
        assert!(history.latest_pair().is_none());

        history.append(snapshot_at(0));
        assert!(history.latest_pair().is_none());
        assert!(history.latest().is_some());

        history.append(snapshot_at(5));
        let (older, newer) = history.latest_pair().unwrap();
        assert!(older.captured_at < newer.captured_at);
    }

    #[test]
    fn test_latest_pair_uses_most_recent() {
        let mut history = SnapshotHistory::new();
        for i in 0..5 {
            history.append(snapshot_at(i));
        }

        let (older, newer) = history.latest_pair().unwrap();
        assert_eq!(older.captured_at, snapshot_at(3).captured_at);
        assert_eq!(newer.captured_at, snapshot_at(4).captured_at);
    }

    #[test]
    fn test_full_history_is_kept() {
        let mut history = SnapshotHistory::new();
        for i in 0..100 {
            history.append(snapshot_at(i));
        }
        assert_eq!(history.len(), 100);
    }

    #[test]
    fn test_overflow_collapses_to_newest() {
        let mut history = SnapshotHistory::new();
        for i in 0..101 {
            history.append(snapshot_at(i));
        }

        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().captured_at, snapshot_at(100).captured_at);
    }

    #[test]
    fn test_small_capacity() {
        let mut history = SnapshotHistory::with_capacity(2);
        history.append(snapshot_at(0));
        history.append(snapshot_at(1));
        history.append(snapshot_at(2));

        assert_eq!(history.len(), 1);
        assert_eq!(history.capacity(), 2);
        assert!(!history.is_empty());
    }
}
