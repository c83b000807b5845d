//! The document boundary.
//!
//! The host page owns and mutates the transcript; the engine only reads it
//! through matcher queries and detaches nodes from it. Nothing here holds a
//! node across calls: every operation re-resolves by query or reserved id.

use crate::error::DocumentError;
use crate::selector::{BlockMatcher, Selector, BLOCK_MATCHERS, CANVAS_MARKERS, MAIN_REGION};
use std::fmt::Debug;

/// Reserved element ids for nodes the engine injects.
pub mod reserved {
    /// Zero-height marker between the window region and the live region.
    pub const ANCHOR_ID: &str = "chat-pruner-keep-anchor";
    /// Container holding expanded snapshots.
    pub const WINDOW_ID: &str = "chat-pruner-window";
    /// Space reserved under the transcript for the control bar.
    pub const SPACER_ID: &str = "chat-pruner-spacer";
    /// The control bar.
    pub const BAR_ID: &str = "chat-pruner-bottombar";
    /// Animation-disabling stylesheet.
    pub const STYLE_ID: &str = "chat-pruner-style";

    /// Ids whose subtrees never contain message blocks.
    pub const ENGINE_OWNED: [&str; 4] = [BAR_ID, ANCHOR_ID, WINDOW_ID, SPACER_ID];

    pub const ANCHOR_STYLE: &str = "height:0; margin:0; padding:0;";
    pub const WINDOW_STYLE: &str = "display:block;";
    pub const NO_ANIMATIONS_CSS: &str =
        "* { animation: none !important; transition: none !important; }";
}

/// Read/detach/insert access to a host document.
///
/// Implemented over the live DOM by the browser binding and over an arena
/// tree by [`MemoryDocument`](crate::MemoryDocument).
pub trait HostDocument {
    /// A handle to an element. Handles are compared by identity.
    type Node: Clone + PartialEq + Debug;

    /// The `<body>` element.
    fn body(&self) -> Self::Node;

    /// First element in the whole document matching `selector`.
    fn query_first(&self, selector: &Selector) -> Option<Self::Node>;

    /// Every descendant of `root` matching `selector`, in document order.
    fn query_all(&self, root: &Self::Node, selector: &Selector) -> Vec<Self::Node>;

    /// Nearest inclusive ancestor of `node` matching `selector`.
    fn closest(&self, node: &Self::Node, selector: &Selector) -> Option<Self::Node>;

    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    fn is_connected(&self, node: &Self::Node) -> bool;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Element children in order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node> {
        self.children(node).into_iter().next()
    }

    /// Full serialized markup of the element, itself included.
    fn outer_html(&self, node: &Self::Node) -> Result<String, DocumentError>;

    /// Detach `node` from its parent.
    fn detach(&mut self, node: &Self::Node) -> Result<(), DocumentError>;

    /// Create a detached `<div>` with the given id and inline style.
    fn create_marker(&mut self, id: &str, style: &str) -> Result<Self::Node, DocumentError>;

    /// Insert `node` under `parent` before `reference`, or append when
    /// `reference` is `None`.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        node: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), DocumentError>;

    /// Insert several nodes, in order, as one operation.
    fn insert_all_before(
        &mut self,
        parent: &Self::Node,
        nodes: &[Self::Node],
        reference: Option<&Self::Node>,
    ) -> Result<(), DocumentError> {
        for node in nodes {
            self.insert_before(parent, node, reference)?;
        }
        Ok(())
    }

    /// Parse markup and return its first element, detached. `Ok(None)` when
    /// the markup contains no element.
    fn parse_element(&mut self, markup: &str) -> Result<Option<Self::Node>, DocumentError>;

    /// Install (or refresh) a stylesheet with the given id. Leaves the
    /// document untouched when it already holds exactly `css`.
    fn ensure_stylesheet(&mut self, id: &str, css: &str) -> Result<(), DocumentError>;
}

/// The container holding the transcript.
pub fn main_region<D: HostDocument>(doc: &D) -> D::Node {
    MAIN_REGION
        .iter()
        .find_map(|sel| doc.query_first(sel))
        .unwrap_or_else(|| doc.body())
}

/// Whether a side canvas is open.
pub fn is_canvas_open<D: HostDocument>(doc: &D) -> bool {
    CANVAS_MARKERS.iter().any(|sel| doc.query_first(sel).is_some())
}

/// Whether `node` is, or sits inside, an element the engine injected.
pub fn is_engine_owned<D: HostDocument>(doc: &D, node: &D::Node) -> bool {
    reserved::ENGINE_OWNED
        .iter()
        .any(|&id| doc.closest(node, &Selector::Id(id)).is_some())
}

/// The live region: real message blocks in document order.
pub fn find_message_blocks<D: HostDocument>(doc: &D) -> Vec<D::Node> {
    let main = main_region(doc);
    for matcher in BLOCK_MATCHERS {
        let blocks: Vec<_> = candidates(doc, &main, matcher)
            .into_iter()
            .filter(|b| !is_engine_owned(doc, b))
            .collect();
        if !blocks.is_empty() {
            return blocks;
        }
    }
    Vec::new()
}

fn candidates<D: HostDocument>(doc: &D, main: &D::Node, matcher: &BlockMatcher) -> Vec<D::Node> {
    match matcher {
        BlockMatcher::Direct(sel) => doc.query_all(main, sel),
        BlockMatcher::Climb { body, ancestors } => {
            let mut blocks: Vec<D::Node> = Vec::new();
            for b in doc.query_all(main, body) {
                let block = ancestors.iter().find_map(|sel| doc.closest(&b, sel));
                if let Some(block) = block {
                    if !blocks.contains(&block) {
                        blocks.push(block);
                    }
                }
            }
            blocks
        }
    }
}
