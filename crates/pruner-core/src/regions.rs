//! Engine-owned regions: the anchor, the window and the bottom spacer.
//!
//! Each is resolved by its reserved id on every call and recreated if a
//! host re-render dropped it.

use crate::document::{find_message_blocks, main_region, reserved, HostDocument};
use crate::error::DocumentError;
use crate::snapshot::Snapshot;
use tracing::{debug, warn};

/// Return the anchor, creating it before `before` (or at the top of the
/// main region) when missing.
pub fn ensure_anchor<D: HostDocument>(
    doc: &mut D,
    before: Option<&D::Node>,
) -> Result<D::Node, DocumentError> {
    if let Some(anchor) = doc.element_by_id(reserved::ANCHOR_ID) {
        return Ok(anchor);
    }

    let anchor = doc.create_marker(reserved::ANCHOR_ID, reserved::ANCHOR_STYLE)?;
    match before.and_then(|b| doc.parent(b).map(|p| (p, b.clone()))) {
        Some((parent, before)) => doc.insert_before(&parent, &anchor, Some(&before))?,
        None => {
            let main = main_region(doc);
            let first = doc.first_child(&main);
            doc.insert_before(&main, &anchor, first.as_ref())?;
        }
    }
    debug!("anchor created");
    Ok(anchor)
}

/// Return the window container, creating it directly above the anchor
/// (or at the top of the main region) when missing.
pub fn ensure_window<D: HostDocument>(doc: &mut D) -> Result<D::Node, DocumentError> {
    if let Some(window) = doc.element_by_id(reserved::WINDOW_ID) {
        return Ok(window);
    }

    let window = doc.create_marker(reserved::WINDOW_ID, reserved::WINDOW_STYLE)?;
    let slot = doc
        .element_by_id(reserved::ANCHOR_ID)
        .and_then(|a| doc.parent(&a).map(|p| (p, a)));
    match slot {
        Some((parent, anchor)) => doc.insert_before(&parent, &window, Some(&anchor))?,
        None => {
            let main = main_region(doc);
            let first = doc.first_child(&main);
            doc.insert_before(&main, &window, first.as_ref())?;
        }
    }
    debug!("window created");
    Ok(window)
}

/// Return the bottom spacer, appending it to the main region when missing.
pub fn ensure_spacer<D: HostDocument>(
    doc: &mut D,
    height_px: u32,
) -> Result<D::Node, DocumentError> {
    if let Some(spacer) = doc.element_by_id(reserved::SPACER_ID) {
        return Ok(spacer);
    }
    let style = format!("height:{}px;", height_px);
    let spacer = doc.create_marker(reserved::SPACER_ID, &style)?;
    let main = main_region(doc);
    doc.insert_before(&main, &spacer, None)?;
    Ok(spacer)
}

/// Recreate the anchor and window above the first live block, since every
/// live block is newer than the store. Does nothing when the page has no
/// message blocks yet.
pub fn rebuild<D: HostDocument>(doc: &mut D) -> Result<Option<D::Node>, DocumentError> {
    let blocks = find_message_blocks(doc);
    let Some(first) = blocks.first() else {
        return Ok(None);
    };
    ensure_anchor(doc, Some(first))?;
    ensure_window(doc).map(Some)
}

/// The window container if it is attached.
pub fn window<D: HostDocument>(doc: &D) -> Option<D::Node> {
    doc.element_by_id(reserved::WINDOW_ID)
}

/// Nodes currently expanded in the window, top to bottom.
pub fn window_contents<D: HostDocument>(doc: &D) -> Vec<D::Node> {
    window(doc).map(|w| doc.children(&w)).unwrap_or_default()
}

/// Number of nodes currently expanded.
pub fn expanded_count<D: HostDocument>(doc: &D) -> usize {
    window_contents(doc).len()
}

/// Remove every node from the window without re-queuing it.
pub fn clear_window<D: HostDocument>(doc: &mut D) -> usize {
    let mut removed = 0;
    for node in window_contents(doc) {
        match doc.detach(&node) {
            Ok(()) => removed += 1,
            Err(e) => warn!(error = %e, "failed to clear window node"),
        }
    }
    removed
}

/// Serialize each node, keeping only those whose markup was captured and
/// that were then detached. Failures are left in place.
pub fn capture_and_detach<D: HostDocument>(
    doc: &mut D,
    nodes: &[D::Node],
) -> (Vec<Snapshot>, usize) {
    let mut captured = Vec::with_capacity(nodes.len());
    let mut skipped = 0;
    for node in nodes {
        let markup = match doc.outer_html(node) {
            Ok(markup) => markup,
            Err(e) => {
                warn!(error = %e, "skipping node that failed to serialize");
                skipped += 1;
                continue;
            }
        };
        match doc.detach(node) {
            Ok(()) => captured.push(Snapshot::from(markup)),
            Err(e) => {
                warn!(error = %e, "skipping node that failed to detach");
                skipped += 1;
            }
        }
    }
    (captured, skipped)
}
