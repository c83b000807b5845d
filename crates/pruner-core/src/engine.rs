//! The pruning engine.
//!
//! Keeps the last `keep` message blocks live and archives everything older
//! into the [`SnapshotStore`], oldest first.

use crate::document::{find_message_blocks, HostDocument};
use crate::regions::{self, capture_and_detach};
use crate::snapshot::SnapshotStore;
use tracing::{debug, warn};

/// Minimum-interval rate limiter for prune passes.
#[derive(Clone, Debug)]
pub struct Throttle {
    interval_ms: u64,
    last_run_at: Option<u64>,
}

impl Throttle {
    pub fn new(interval_ms: u64) -> Self {
        Throttle {
            interval_ms,
            last_run_at: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Admit a run at `now_ms`, or return how long until the next one is
    /// allowed.
    pub fn try_acquire(&mut self, now_ms: u64) -> Result<(), u64> {
        if let Some(last) = self.last_run_at {
            let elapsed = now_ms.saturating_sub(last);
            if elapsed < self.interval_ms {
                return Err(self.interval_ms - elapsed);
            }
        }
        self.last_run_at = Some(now_ms);
        Ok(())
    }
}

/// What a prune pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Threshold used for this pass.
    pub keep: usize,

    /// Live blocks moved into the store.
    pub archived: usize,

    /// Blocks or window nodes left in place because capture failed.
    pub skipped: usize,

    /// Expanded window nodes folded back into the store first.
    pub folded: usize,

    /// Oldest snapshots dropped by the capacity cap.
    pub discarded: usize,

    /// Live blocks remaining after the pass.
    pub live_after: usize,
}

/// Result of asking for a prune pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PruneOutcome {
    /// Too soon after the previous pass.
    Throttled { retry_in_ms: u64 },
    /// Another operation is in progress.
    Busy,
    /// Live count already within the threshold; nothing was touched.
    Unchanged { live: usize, keep: usize },
    Pruned(PruneReport),
}

impl PruneOutcome {
    /// Whether the pass ran (whether or not it changed anything).
    pub fn executed(&self) -> bool {
        matches!(self, PruneOutcome::Unchanged { .. } | PruneOutcome::Pruned(_))
    }

    pub fn report(&self) -> Option<&PruneReport> {
        match self {
            PruneOutcome::Pruned(report) => Some(report),
            _ => None,
        }
    }
}

/// Decides the live/archived boundary and moves blocks across it.
#[derive(Clone, Debug)]
pub struct PruningEngine {
    throttle: Throttle,
}

impl PruningEngine {
    pub fn new(throttle_ms: u64) -> Self {
        PruningEngine {
            throttle: Throttle::new(throttle_ms),
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Rate-limit check; must pass before [`prune`](Self::prune) is run.
    pub fn admit(&mut self, now_ms: u64) -> Result<(), PruneOutcome> {
        self.throttle
            .try_acquire(now_ms)
            .map_err(|retry_in_ms| PruneOutcome::Throttled { retry_in_ms })
    }

    /// Archive every live block older than the last `keep`.
    ///
    /// A non-empty window is folded back into the store before new blocks
    /// are archived so the store stays in chronological order.
    pub fn prune<D: HostDocument>(
        &self,
        doc: &mut D,
        store: &mut SnapshotStore,
        keep: usize,
    ) -> PruneOutcome {
        let blocks = find_message_blocks(doc);
        if blocks.len() <= keep {
            return PruneOutcome::Unchanged {
                live: blocks.len(),
                keep,
            };
        }

        let extra = blocks.len() - keep;
        let placed = regions::ensure_anchor(doc, Some(&blocks[extra]))
            .and_then(|_| regions::ensure_window(doc));
        if let Err(e) = placed {
            warn!(error = %e, "could not place anchor and window");
        }

        let expanded = regions::window_contents(doc);
        let (folded, fold_skipped) = capture_and_detach(doc, &expanded);
        let (archived, skipped) = capture_and_detach(doc, &blocks[..extra]);

        let mut report = PruneReport {
            keep,
            archived: archived.len(),
            skipped: skipped + fold_skipped,
            folded: folded.len(),
            discarded: 0,
            live_after: blocks.len() - archived.len(),
        };

        let appended = store.append(folded.into_iter().chain(archived));
        if appended.overflowed() {
            report.discarded = appended.discarded;
            let cleared = regions::clear_window(doc);
            warn!(
                discarded = appended.discarded,
                cleared, "store over capacity, oldest snapshots dropped"
            );
        }

        debug!(
            keep,
            archived = report.archived,
            folded = report.folded,
            skipped = report.skipped,
            stored = store.len(),
            "prune pass"
        );
        PruneOutcome::Pruned(report)
    }
}
