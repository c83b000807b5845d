//! The on-page control bar.
//!
//! One bar per page, appended to the main region: a status line and three
//! buttons, one per [`Intent`]. Buttons that expand are disabled while the
//! store is empty.

use pruner_core::{reserved, Intent, StatusReport, StatusSink};
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlButtonElement, HtmlElement};

const BAR_STYLE: &str = "display:flex; gap:8px; align-items:center; padding:8px 12px; \
    border-top:1px solid rgba(127,127,127,.3); background:inherit; \
    font-size:12px; z-index:50;";
const STICKY_STYLE: &str = "position:sticky; bottom:0;";
const BUTTON_STYLE: &str = "padding:4px 10px; border-radius:6px; \
    border:1px solid rgba(127,127,127,.4); background:transparent; cursor:pointer;";

/// Routes a button click back to the session.
pub type Dispatch = Rc<dyn Fn(Intent)>;

struct Buttons {
    expand_chunk: HtmlButtonElement,
    expand_all: HtmlButtonElement,
}

/// Status sink rendering into the page.
pub struct ControlBar {
    document: Document,
    chunk_size: usize,
    sticky: bool,
    dispatch: Option<Dispatch>,
    bar: Option<Element>,
    info: Option<Element>,
    buttons: Option<Buttons>,
    handlers: Vec<Closure<dyn FnMut()>>,
}

impl ControlBar {
    pub fn new(document: Document, chunk_size: usize, sticky: bool) -> Self {
        ControlBar {
            document,
            chunk_size,
            sticky,
            dispatch: None,
            bar: None,
            info: None,
            buttons: None,
            handlers: Vec::new(),
        }
    }

    /// Install the click router. Buttons created before this call stay inert.
    pub fn set_dispatch(&mut self, dispatch: Dispatch) {
        self.dispatch = Some(dispatch);
    }

    pub fn is_mounted(&self) -> bool {
        self.bar.as_ref().is_some_and(|bar| bar.is_connected())
    }

    /// Make sure exactly one bar is attached under `main`.
    pub fn ensure(&mut self, main: &Element) -> Result<(), JsValue> {
        self.remove_strays()?;
        if self.is_mounted() {
            return Ok(());
        }

        self.handlers.clear();

        let bar = self.document.create_element("div")?;
        bar.set_id(reserved::BAR_ID);
        let style = if self.sticky {
            format!("{BAR_STYLE} {STICKY_STYLE}")
        } else {
            BAR_STYLE.to_string()
        };
        bar.set_attribute("style", &style)?;

        let info = self.document.create_element("span")?;
        info.set_attribute("style", "opacity:.8; margin-right:auto;")?;
        bar.append_child(&info)?;

        let expand_chunk = self.button(
            &bar,
            &format!("Expand {} older", self.chunk_size),
            Intent::ExpandChunk,
        )?;
        self.button(&bar, "Collapse expanded", Intent::Collapse)?;
        let expand_all = self.button(&bar, "Expand all (may be slow)", Intent::ExpandAll)?;
        let buttons = Buttons {
            expand_chunk,
            expand_all,
        };

        main.append_child(&bar)?;
        debug!("control bar mounted");

        self.bar = Some(bar);
        self.info = Some(info);
        self.buttons = Some(buttons);
        Ok(())
    }

    /// Detach the bar and drop its handlers.
    pub fn unmount(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.remove();
        }
        self.info = None;
        self.buttons = None;
        self.handlers.clear();
    }

    fn button(
        &mut self,
        bar: &Element,
        label: &str,
        intent: Intent,
    ) -> Result<HtmlButtonElement, JsValue> {
        let button: HtmlButtonElement = self.document.create_element("button")?.dyn_into()?;
        button.set_type("button");
        button.set_text_content(Some(label));
        button.set_attribute("style", BUTTON_STYLE)?;
        button.set_attribute("data-intent", intent.as_str())?;

        if let Some(dispatch) = self.dispatch.clone() {
            let handler = Closure::<dyn FnMut()>::new(move || dispatch(intent));
            let element: &HtmlElement = button.as_ref();
            element.set_onclick(Some(handler.as_ref().unchecked_ref()));
            self.handlers.push(handler);
        }

        bar.append_child(&button)?;
        Ok(button)
    }

    /// Bars left behind by an earlier instance or duplicated by the host.
    fn remove_strays(&self) -> Result<(), JsValue> {
        let selector = format!("#{}", reserved::BAR_ID);
        let found = self.document.query_selector_all(&selector)?;
        for i in 0..found.length() {
            let Some(node) = found.get(i) else { continue };
            let Ok(element) = node.dyn_into::<Element>() else {
                continue;
            };
            if self.bar.as_ref() != Some(&element) {
                element.remove();
            }
        }
        Ok(())
    }
}

impl StatusSink for ControlBar {
    fn publish(&mut self, status: &StatusReport) {
        if let Some(info) = &self.info {
            info.set_text_content(Some(&status.to_string()));
        }
        let Some(buttons) = &self.buttons else { return };

        let empty = !status.has_history();
        for button in [&buttons.expand_chunk, &buttons.expand_all] {
            button.set_disabled(empty);
            let opacity = if empty { "0.5" } else { "1" };
            let element: &HtmlElement = button.as_ref();
            if let Err(e) = element.style().set_property("opacity", opacity) {
                warn!(error = ?e, "could not style button");
            }
        }
    }
}
