//! Moving snapshots between the store and the window region.
//!
//! The window always reads oldest at the top, newest at the bottom, and
//! sits directly above the live region. Repeated chunked expansion grows it
//! upward.

use crate::document::{reserved, HostDocument};
use crate::regions::{self, capture_and_detach};
use crate::snapshot::{Snapshot, SnapshotStore};
use tracing::{debug, warn};

/// What an expansion or collapse moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    /// Nodes moved between store and window.
    pub moved: usize,

    /// Snapshots that produced no element and were dropped.
    pub unparsable: usize,

    /// Window nodes left in place because capture failed.
    pub skipped: usize,

    /// Oldest snapshots dropped by the capacity cap.
    pub discarded: usize,

    /// Nodes in the window afterwards.
    pub expanded_after: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// Nothing to move: empty store (expand) or empty window (collapse),
    /// or the page has no place to put the window yet.
    Nothing,
    /// Another operation is in progress.
    Busy,
    Moved(ExpansionReport),
}

impl ExpansionOutcome {
    pub fn report(&self) -> Option<&ExpansionReport> {
        match self {
            ExpansionOutcome::Moved(report) => Some(report),
            _ => None,
        }
    }
}

/// Services the expand-chunk, collapse and expand-all intents.
#[derive(Clone, Debug)]
pub struct ExpansionController {
    chunk_size: usize,
}

impl ExpansionController {
    pub fn new(chunk_size: usize) -> Self {
        ExpansionController {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Move the newest chunk of snapshots to the top of the window.
    pub fn expand_chunk<D: HostDocument>(
        &self,
        doc: &mut D,
        store: &mut SnapshotStore,
    ) -> ExpansionOutcome {
        self.expand_by(doc, store, self.chunk_size)
    }

    /// Move the newest `count` snapshots to the top of the window.
    pub fn expand_by<D: HostDocument>(
        &self,
        doc: &mut D,
        store: &mut SnapshotStore,
        count: usize,
    ) -> ExpansionOutcome {
        if store.is_empty() || count == 0 {
            return ExpansionOutcome::Nothing;
        }
        let Some(window) = prepare(doc) else {
            return ExpansionOutcome::Nothing;
        };

        let taken = store.take_newest(count);
        let (nodes, unparsable) = materialize(doc, &taken);
        let top = doc.first_child(&window);
        if let Err(e) = doc.insert_all_before(&window, &nodes, top.as_ref()) {
            warn!(error = %e, "expansion failed, returning snapshots to the store");
            restore(doc, store, &nodes, taken);
            return ExpansionOutcome::Nothing;
        }

        let report = ExpansionReport {
            moved: nodes.len(),
            unparsable,
            expanded_after: regions::expanded_count(doc),
            ..Default::default()
        };
        debug!(moved = report.moved, stored = store.len(), "expanded chunk");
        ExpansionOutcome::Moved(report)
    }

    /// Fold every expanded node back into the tail of the store.
    pub fn collapse<D: HostDocument>(
        &self,
        doc: &mut D,
        store: &mut SnapshotStore,
    ) -> ExpansionOutcome {
        let mut report = fold_window(doc, store);
        if report.moved == 0 && report.skipped == 0 {
            return ExpansionOutcome::Nothing;
        }
        report.expanded_after = regions::expanded_count(doc);
        debug!(moved = report.moved, stored = store.len(), "collapsed window");
        ExpansionOutcome::Moved(report)
    }

    /// Fold the window back, then restore the whole store into it.
    pub fn expand_all<D: HostDocument>(
        &self,
        doc: &mut D,
        store: &mut SnapshotStore,
    ) -> ExpansionOutcome {
        if store.is_empty() {
            return ExpansionOutcome::Nothing;
        }
        let Some(window) = prepare(doc) else {
            return ExpansionOutcome::Nothing;
        };

        let folded = fold_window(doc, store);
        let taken = store.drain_all();
        let (nodes, unparsable) = materialize(doc, &taken);
        if let Err(e) = doc.insert_all_before(&window, &nodes, None) {
            warn!(error = %e, "expand-all failed, returning snapshots to the store");
            restore(doc, store, &nodes, taken);
            return ExpansionOutcome::Nothing;
        }

        let report = ExpansionReport {
            moved: nodes.len(),
            unparsable,
            skipped: folded.skipped,
            discarded: folded.discarded,
            expanded_after: regions::expanded_count(doc),
        };
        debug!(moved = report.moved, "expanded all");
        ExpansionOutcome::Moved(report)
    }
}

/// Make sure the anchor and window exist, rebuilding them from the live
/// blocks after a host re-render.
fn prepare<D: HostDocument>(doc: &mut D) -> Option<D::Node> {
    let anchor = doc.element_by_id(reserved::ANCHOR_ID);
    if let (Some(_), Some(window)) = (anchor, regions::window(doc)) {
        return Some(window);
    }
    match regions::rebuild(doc) {
        Ok(window) => window,
        Err(e) => {
            warn!(error = %e, "could not rebuild anchor and window");
            None
        }
    }
}

fn fold_window<D: HostDocument>(doc: &mut D, store: &mut SnapshotStore) -> ExpansionReport {
    let expanded = regions::window_contents(doc);
    if expanded.is_empty() {
        return ExpansionReport::default();
    }
    let (snapshots, skipped) = capture_and_detach(doc, &expanded);
    let appended = store.append(snapshots);
    if appended.overflowed() {
        let cleared = regions::clear_window(doc);
        warn!(
            discarded = appended.discarded,
            cleared, "store over capacity, oldest snapshots dropped"
        );
    }
    ExpansionReport {
        moved: appended.appended,
        skipped,
        discarded: appended.discarded,
        ..Default::default()
    }
}

fn materialize<D: HostDocument>(doc: &mut D, snapshots: &[Snapshot]) -> (Vec<D::Node>, usize) {
    let mut nodes = Vec::with_capacity(snapshots.len());
    let mut unparsable = 0;
    for snapshot in snapshots {
        match doc.parse_element(snapshot.markup()) {
            Ok(Some(node)) => nodes.push(node),
            Ok(None) => {
                warn!(size = snapshot.size(), "snapshot holds no element, dropping it");
                unparsable += 1;
            }
            Err(e) => {
                warn!(error = %e, "snapshot failed to parse, dropping it");
                unparsable += 1;
            }
        }
    }
    (nodes, unparsable)
}

/// Undo a failed insertion: detach whatever made it in and put the
/// snapshots back on the tail they came from.
fn restore<D: HostDocument>(
    doc: &mut D,
    store: &mut SnapshotStore,
    nodes: &[D::Node],
    taken: Vec<Snapshot>,
) {
    for node in nodes {
        if doc.is_connected(node) {
            let _ = doc.detach(node);
        }
    }
    store.append(taken);
}
