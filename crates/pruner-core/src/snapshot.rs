//! Archived message snapshots and the bounded store that holds them.
//!
//! The store is an ordered buffer, oldest first. Pruning appends to the
//! tail, expansion drains from the tail, and the capacity cap discards
//! from the head.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// The serialized markup of one archived message block.
///
/// Immutable once captured; restoring it yields the exact markup that was
/// removed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Arc<str>);

impl Snapshot {
    /// Wrap captured markup.
    pub fn new(markup: impl Into<Arc<str>>) -> Self {
        Snapshot(markup.into())
    }

    /// The captured markup.
    pub fn markup(&self) -> &str {
        &self.0
    }

    /// Size of the markup in bytes.
    pub fn size(&self) -> usize {
        self.0.len()
    }
}

impl From<String> for Snapshot {
    fn from(markup: String) -> Self {
        Snapshot::new(markup)
    }
}

impl From<&str> for Snapshot {
    fn from(markup: &str) -> Self {
        Snapshot::new(markup)
    }
}

/// Result of appending to the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Snapshots added to the tail.
    pub appended: usize,

    /// Snapshots dropped from the head to honour the capacity.
    pub discarded: usize,
}

impl AppendOutcome {
    /// Whether the append pushed the store past its capacity.
    pub fn overflowed(&self) -> bool {
        self.discarded > 0
    }
}

/// Ordered, capacity-bounded buffer of snapshots (oldest -> newest).
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotStore {
    /// Create an empty store holding at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        SnapshotStore {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate oldest -> newest.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    /// Total markup bytes held.
    pub fn total_size(&self) -> usize {
        self.entries.iter().map(Snapshot::size).sum()
    }

    /// Append snapshots to the tail in the given order, then enforce the cap.
    pub fn append<I>(&mut self, snapshots: I) -> AppendOutcome
    where
        I: IntoIterator<Item = Snapshot>,
    {
        let before = self.entries.len();
        self.entries.extend(snapshots);
        let appended = self.entries.len() - before;

        let discarded = self.entries.len().saturating_sub(self.capacity);
        if discarded > 0 {
            self.entries.drain(..discarded);
        }

        AppendOutcome {
            appended,
            discarded,
        }
    }

    /// Remove up to `count` of the newest snapshots, returned oldest first.
    pub fn take_newest(&mut self, count: usize) -> Vec<Snapshot> {
        let start = self.entries.len().saturating_sub(count);
        self.entries.drain(start..).collect()
    }

    /// Remove every snapshot, returned oldest first.
    pub fn drain_all(&mut self) -> Vec<Snapshot> {
        self.entries.drain(..).collect()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        SnapshotStore::new(2000)
    }
}
