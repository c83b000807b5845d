//! In-memory document tree.
//!
//! An arena of element and text nodes. Markup is parsed with `scraper`,
//! so snapshots taken from a real page's `outerHTML` load the same way they
//! would in a browser. Used by the test suites and the soak driver; it also
//! supports fault injection and counts mutations so that "no-op" can be
//! asserted as "zero mutations".

use crate::document::HostDocument;
use crate::error::DocumentError;
use crate::selector::Selector;
use scraper::{ElementRef, Html, Node};

/// Handle to a node in a [`MemoryDocument`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    poisoned: bool,
}

/// Arena-backed document with `<html>`, `<head>` and `<body>`.
#[derive(Clone, Debug)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    mutations: usize,
}

impl MemoryDocument {
    pub fn new() -> Self {
        let mut doc = MemoryDocument {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            mutations: 0,
        };
        doc.root = doc.alloc_element("html", &[]);
        doc.head = doc.alloc_element("head", &[]);
        doc.body = doc.alloc_element("body", &[]);
        doc.link(doc.root, doc.head, None);
        doc.link(doc.root, doc.body, None);
        doc
    }

    /// A page shaped like a chat UI: `<main>` holding a thread container
    /// with `count` conversation turns. Returns the document and the thread.
    pub fn with_transcript(count: usize) -> (Self, NodeId) {
        let mut doc = MemoryDocument::new();
        let body = doc.body;
        let main = doc.append_element(&body, "main", &[]);
        let thread = doc.append_element(&main, "div", &[("class", "thread")]);
        for i in 1..=count {
            doc.push_turn(&thread, &format!("message {i}"));
        }
        doc.mutations = 0;
        (doc, thread)
    }

    /// Append a conversation turn holding `text` to `thread`.
    pub fn push_turn(&mut self, thread: &NodeId, text: &str) -> NodeId {
        let turn = self.append_element(thread, "div", &[("data-testid", "conversation-turn")]);
        let body = self.append_element(&turn, "p", &[]);
        self.append_text(&body, text);
        turn
    }

    /// Append a new element under `parent`.
    pub fn append_element(&mut self, parent: &NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.alloc_element(tag, attrs);
        self.link(*parent, id, None);
        self.mutations += 1;
        id
    }

    /// Parse `markup` and append its first element under `parent`.
    pub fn append_markup(
        &mut self,
        parent: &NodeId,
        markup: &str,
    ) -> Result<Option<NodeId>, DocumentError> {
        let Some(node) = self.parse_element(markup)? else {
            return Ok(None);
        };
        self.link(*parent, node, None);
        self.mutations += 1;
        Ok(Some(node))
    }

    /// Append a text node under `parent`.
    pub fn append_text(&mut self, parent: &NodeId, text: &str) {
        let id = self.alloc(NodeKind::Text(text.to_string()));
        self.link(*parent, id, None);
        self.mutations += 1;
    }

    /// Attribute value of an element.
    pub fn attr(&self, node: &NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.collect_text(*node, &mut out);
        out
    }

    /// Make `outer_html` fail for this node.
    pub fn poison(&mut self, node: &NodeId) {
        self.nodes[node.0].poisoned = true;
    }

    /// Number of tree mutations performed so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            poisoned: false,
        });
        NodeId(self.nodes.len() - 1)
    }

    fn alloc_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    fn link(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        let children = &mut self.nodes[parent.0].children;
        match index {
            Some(i) => children.insert(i, child),
            None => children.push(child),
        }
        self.nodes[child.0].parent = Some(parent);
    }

    fn unlink(&mut self, node: NodeId) -> bool {
        match self.nodes[node.0].parent.take() {
            Some(parent) => {
                self.nodes[parent.0].children.retain(|c| *c != node);
                true
            }
            None => false,
        }
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Element { .. })
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => selector.matches(tag, |name| self.attr(&node, name)),
            NodeKind::Text(_) => false,
        }
    }

    /// Pre-order descendants of `node`, excluding itself.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element { .. } => {
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Copy a parsed element and its element and text descendants into the
    /// arena as a detached subtree. Comments are dropped.
    fn graft(&mut self, element: ElementRef<'_>) -> NodeId {
        let mut attrs: Vec<(String, String)> = element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        attrs.sort();
        let id = self.alloc(NodeKind::Element {
            tag: element.value().name().to_string(),
            attrs,
        });
        for child in element.children() {
            let grafted = match child.value() {
                Node::Element(_) => ElementRef::wrap(child).map(|el| self.graft(el)),
                Node::Text(text) => Some(self.alloc(NodeKind::Text(String::from(&**text)))),
                _ => None,
            };
            if let Some(grafted) = grafted {
                self.link(id, grafted, None);
            }
        }
        id
    }

    fn serialize(&self, node: NodeId, out: &mut String) -> Result<(), DocumentError> {
        let data = &self.nodes[node.0];
        if data.poisoned {
            return Err(DocumentError::Serialize(format!("node {} is poisoned", node.0)));
        }
        match &data.kind {
            NodeKind::Text(t) => out.push_str(&escape(t, false)),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape(v, true));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return Ok(());
                }
                for child in &data.children {
                    self.serialize(*child, out)?;
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        Ok(())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDocument for MemoryDocument {
    type Node = NodeId;

    fn body(&self) -> NodeId {
        self.body
    }

    fn query_first(&self, selector: &Selector) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.matches(*n, selector))
    }

    fn query_all(&self, root: &NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(*root)
            .into_iter()
            .filter(|n| self.matches(*n, selector))
            .collect()
    }

    fn closest(&self, node: &NodeId, selector: &Selector) -> Option<NodeId> {
        let mut current = Some(*node);
        while let Some(n) = current {
            if self.matches(n, selector) {
                return Some(n);
            }
            current = self.nodes[n.0].parent;
        }
        None
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attr(n, "id") == Some(id))
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let mut current = *node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.0].parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    fn outer_html(&self, node: &NodeId) -> Result<String, DocumentError> {
        let mut out = String::new();
        self.serialize(*node, &mut out)?;
        Ok(out)
    }

    fn detach(&mut self, node: &NodeId) -> Result<(), DocumentError> {
        if self.unlink(*node) {
            self.mutations += 1;
            Ok(())
        } else {
            Err(DocumentError::Detached)
        }
    }

    fn create_marker(&mut self, id: &str, style: &str) -> Result<NodeId, DocumentError> {
        Ok(self.alloc_element("div", &[("id", id), ("style", style)]))
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        node: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), DocumentError> {
        if !self.is_element(*parent) {
            return Err(DocumentError::Dom("parent is not an element".to_string()));
        }
        let mut ancestor = Some(*parent);
        while let Some(a) = ancestor {
            if a == *node {
                return Err(DocumentError::Dom("cannot insert a node into itself".to_string()));
            }
            ancestor = self.nodes[a.0].parent;
        }
        if let Some(r) = reference {
            if self.nodes[r.0].parent != Some(*parent) {
                return Err(DocumentError::Dom("reference is not a child of parent".to_string()));
            }
        }

        self.unlink(*node);
        let index = match reference {
            Some(r) => self.nodes[parent.0].children.iter().position(|c| c == r),
            None => None,
        };
        self.link(*parent, *node, index);
        self.mutations += 1;
        Ok(())
    }

    fn parse_element(&mut self, markup: &str) -> Result<Option<NodeId>, DocumentError> {
        let fragment = Html::parse_fragment(markup.trim());
        let first = fragment.root_element().children().find_map(ElementRef::wrap);
        Ok(first.map(|el| self.graft(el)))
    }

    fn ensure_stylesheet(&mut self, id: &str, css: &str) -> Result<(), DocumentError> {
        let style = match self.element_by_id(id) {
            Some(style) if self.text_content(&style) == css => return Ok(()),
            Some(style) => style,
            None => {
                let style = self.alloc_element("style", &[("id", id)]);
                let head = self.head;
                self.link(head, style, None);
                style
            }
        };
        for child in std::mem::take(&mut self.nodes[style.0].children) {
            self.nodes[child.0].parent = None;
        }
        let text = self.alloc(NodeKind::Text(css.to_string()));
        self.link(style, text, None);
        self.mutations += 1;
        Ok(())
    }
}

/// Elements serialized without an end tag, as `outerHTML` does.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::find_message_blocks;

    #[test]
    fn test_transcript_fixture() {
        let (doc, thread) = MemoryDocument::with_transcript(3);
        let blocks = find_message_blocks(&doc);

        assert_eq!(blocks.len(), 3);
        assert_eq!(doc.parent(&blocks[0]), Some(thread));
        assert_eq!(doc.text_content(&blocks[2]), "message 3");
        assert_eq!(doc.mutation_count(), 0);
    }

    #[test]
    fn test_markup_round_trip() {
        let (mut doc, _) = MemoryDocument::with_transcript(1);
        let block = find_message_blocks(&doc)[0];
        let p = doc.children(&block)[0];
        doc.append_text(&p, " & <friends> \"quoted\"");

        let markup = doc.outer_html(&block).unwrap();
        let copy = doc.parse_element(&markup).unwrap().unwrap();

        assert!(!doc.is_connected(&copy));
        assert_eq!(doc.outer_html(&copy).unwrap(), markup);
        assert_eq!(doc.text_content(&copy), "message 1 & <friends> \"quoted\"");
    }

    #[test]
    fn test_parse_ignores_leading_text() {
        let mut doc = MemoryDocument::new();
        let el = doc.parse_element("  hello <b class=\"x\">hi</b> tail ").unwrap().unwrap();
        assert_eq!(doc.attr(&el, "class"), Some("x"));
        assert_eq!(doc.text_content(&el), "hi");

        assert_eq!(doc.parse_element("just text").unwrap(), None);
    }

    #[test]
    fn test_parse_browser_markup() {
        let mut doc = MemoryDocument::new();

        let turn = doc
            .parse_element(r#"<div data-testid="conversation-turn"><p>a<br>b</p></div>"#)
            .unwrap()
            .unwrap();
        assert_eq!(doc.text_content(&turn), "ab");
        assert_eq!(
            doc.outer_html(&turn).unwrap(),
            r#"<div data-testid="conversation-turn"><p>a<br>b</p></div>"#
        );

        let quoted = doc.parse_element("<div class='x' hidden>y</div>").unwrap().unwrap();
        assert_eq!(doc.attr(&quoted, "class"), Some("x"));
        assert_eq!(doc.attr(&quoted, "hidden"), Some(""));

        let commented = doc.parse_element("<div><!-- c --><p>x</p></div>").unwrap().unwrap();
        assert_eq!(doc.outer_html(&commented).unwrap(), "<div><p>x</p></div>");
    }

    #[test]
    fn test_parse_recovers_unclosed() {
        let mut doc = MemoryDocument::new();
        let el = doc.parse_element("<div><p>open</div>").unwrap().unwrap();
        assert_eq!(doc.outer_html(&el).unwrap(), "<div><p>open</p></div>");
    }

    #[test]
    fn test_append_markup_joins_transcript() {
        let (mut doc, thread) = MemoryDocument::with_transcript(2);
        let markup = "<article data-testid='conversation-turn'>\
                      <p>x&nbsp;&amp;&nbsp;y<img src='a.png'></p></article>";
        let turn = doc.append_markup(&thread, markup).unwrap().unwrap();

        assert_eq!(find_message_blocks(&doc).len(), 3);
        assert_eq!(doc.mutation_count(), 1);
        let markup = doc.outer_html(&turn).unwrap();
        assert_eq!(
            markup,
            concat!(
                r#"<article data-testid="conversation-turn">"#,
                r#"<p>x&nbsp;&amp;&nbsp;y<img src="a.png"></p></article>"#,
            )
        );
        let copy = doc.parse_element(&markup).unwrap().unwrap();
        assert_eq!(doc.outer_html(&copy).unwrap(), markup);
    }

    #[test]
    fn test_insert_before_and_detach() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let a = doc.append_element(&body, "div", &[("id", "a")]);
        let b = doc.create_marker("b", "").unwrap();
        assert!(!doc.is_connected(&b));

        doc.insert_before(&body, &b, Some(&a)).unwrap();
        assert_eq!(doc.children(&body), vec![b, a]);
        assert_eq!(doc.element_by_id("b"), Some(b));

        doc.detach(&b).unwrap();
        assert_eq!(doc.detach(&b), Err(DocumentError::Detached));
        assert_eq!(doc.element_by_id("b"), None);
    }

    #[test]
    fn test_insert_rejects_foreign_reference() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let a = doc.append_element(&body, "div", &[]);
        let inner = doc.append_element(&a, "div", &[]);
        let c = doc.create_marker("c", "").unwrap();

        assert!(doc.insert_before(&body, &c, Some(&inner)).is_err());
        assert!(doc.insert_before(&inner, &a, None).is_err());
    }

    #[test]
    fn test_poisoned_node_fails_serialization() {
        let (mut doc, _) = MemoryDocument::with_transcript(2);
        let block = find_message_blocks(&doc)[1];
        doc.poison(&block);
        assert!(matches!(doc.outer_html(&block), Err(DocumentError::Serialize(_))));
    }

    #[test]
    fn test_stylesheet_is_idempotent() {
        let mut doc = MemoryDocument::new();
        doc.ensure_stylesheet("s", "a{}").unwrap();
        doc.ensure_stylesheet("s", "b{}").unwrap();

        let style = doc.element_by_id("s").unwrap();
        assert_eq!(doc.text_content(&style), "b{}");
        assert_eq!(doc.query_all(&doc.head, &Selector::Tag("style")).len(), 1);
    }
}
