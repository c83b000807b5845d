//! [`HostDocument`] over the live browser DOM.

use pruner_core::{DocumentError, HostDocument, Selector};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlTemplateElement, Node};

fn dom_err(e: JsValue) -> DocumentError {
    DocumentError::Dom(format!("{:?}", e))
}

/// The page document.
#[derive(Clone, Debug)]
pub struct DomDocument {
    document: Document,
    root: Element,
}

impl DomDocument {
    /// Bind to the window's document.
    pub fn from_window() -> Result<Self, DocumentError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| DocumentError::Dom("no document".to_string()))?;
        Self::new(document)
    }

    pub fn new(document: Document) -> Result<Self, DocumentError> {
        let root = document
            .document_element()
            .ok_or_else(|| DocumentError::Dom("document has no root element".to_string()))?;
        Ok(DomDocument { document, root })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl HostDocument for DomDocument {
    type Node = Element;

    fn body(&self) -> Element {
        self.document
            .body()
            .map(Element::from)
            .unwrap_or_else(|| self.root.clone())
    }

    fn query_first(&self, selector: &Selector) -> Option<Element> {
        self.document.query_selector(&selector.to_css()).ok().flatten()
    }

    fn query_all(&self, root: &Element, selector: &Selector) -> Vec<Element> {
        let Ok(list) = root.query_selector_all(&selector.to_css()) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect()
    }

    fn closest(&self, node: &Element, selector: &Selector) -> Option<Element> {
        node.closest(&selector.to_css()).ok().flatten()
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn children(&self, node: &Element) -> Vec<Element> {
        let children = node.children();
        (0..children.length()).filter_map(|i| children.item(i)).collect()
    }

    fn first_child(&self, node: &Element) -> Option<Element> {
        node.first_element_child()
    }

    fn outer_html(&self, node: &Element) -> Result<String, DocumentError> {
        Ok(node.outer_html())
    }

    fn detach(&mut self, node: &Element) -> Result<(), DocumentError> {
        if node.parent_node().is_none() {
            return Err(DocumentError::Detached);
        }
        node.remove();
        Ok(())
    }

    fn create_marker(&mut self, id: &str, style: &str) -> Result<Element, DocumentError> {
        let marker = self.document.create_element("div").map_err(dom_err)?;
        marker.set_id(id);
        marker.set_attribute("style", style).map_err(dom_err)?;
        Ok(marker)
    }

    fn insert_before(
        &mut self,
        parent: &Element,
        node: &Element,
        reference: Option<&Element>,
    ) -> Result<(), DocumentError> {
        parent
            .insert_before(node, reference.map(AsRef::<Node>::as_ref))
            .map(|_| ())
            .map_err(dom_err)
    }

    fn insert_all_before(
        &mut self,
        parent: &Element,
        nodes: &[Element],
        reference: Option<&Element>,
    ) -> Result<(), DocumentError> {
        let fragment = self.document.create_document_fragment();
        for node in nodes {
            fragment.append_child(node).map_err(dom_err)?;
        }
        parent
            .insert_before(&fragment, reference.map(AsRef::<Node>::as_ref))
            .map(|_| ())
            .map_err(dom_err)
    }

    fn parse_element(&mut self, markup: &str) -> Result<Option<Element>, DocumentError> {
        let template: HtmlTemplateElement = self
            .document
            .create_element("template")
            .map_err(dom_err)?
            .dyn_into()
            .map_err(|_| DocumentError::Parse("template element unavailable".to_string()))?;
        template.set_inner_html(markup.trim());
        Ok(template.content().first_element_child())
    }

    fn ensure_stylesheet(&mut self, id: &str, css: &str) -> Result<(), DocumentError> {
        let style = match self.document.get_element_by_id(id) {
            Some(style) if style.text_content().as_deref() == Some(css) => return Ok(()),
            Some(style) => style,
            None => {
                let style = self.document.create_element("style").map_err(dom_err)?;
                style.set_id(id);
                let node: &Node = self.root.as_ref();
                node.append_child(&style).map_err(dom_err)?;
                style
            }
        };
        style.set_text_content(Some(css));
        Ok(())
    }
}
