//! WASM-specific integration tests
//!
//! These tests run in a headless browser environment using wasm-bindgen-test.
//! Run with: `wasm-pack test --headless --chrome crates/pruner-wasm`

use pruner_core::{find_message_blocks, reserved, DocumentError, HostDocument, Selector};
use pruner_wasm::*;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{Document, Element};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

/// A `<main>` transcript of `count` turns, removed again on drop.
struct Page {
    main: Element,
}

impl Page {
    fn with_turns(count: usize) -> Self {
        let doc = document();
        let main = doc.create_element("main").unwrap();
        doc.body().unwrap().append_child(&main).unwrap();
        let page = Page { main };
        page.stream(1..=count);
        page
    }

    /// Append turns the way the host streams them in.
    fn stream(&self, numbers: std::ops::RangeInclusive<usize>) {
        let doc = document();
        for i in numbers {
            let turn = doc.create_element("div").unwrap();
            turn.set_attribute("data-testid", "conversation-turn").unwrap();
            turn.set_inner_html(&format!("<p>message {i}</p>"));
            self.main.append_child(&turn).unwrap();
        }
    }

    fn live_texts(&self) -> Vec<String> {
        let dom = DomDocument::from_window().unwrap();
        find_message_blocks(&dom)
            .iter()
            .map(|n| n.text_content().unwrap_or_default())
            .collect()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        self.main.remove();
    }
}

fn config(keep: usize) -> JsValue {
    let json = format!(r#"{{"keep":{keep},"canvasKeep":{keep},"throttleMs":0,"chunkSize":5}}"#);
    js_sys::JSON::parse(&json).unwrap()
}

/// Preferences for a pruner driven by its own observer and timers.
fn observed_config(keep: usize, throttle_ms: u64, start_delay_ms: u64) -> JsValue {
    let json = format!(
        r#"{{"keep":{keep},"canvasKeep":{keep},"throttleMs":{throttle_ms},
            "startDelayMs":{start_delay_ms},"idleTimeoutMs":50,"fallbackDelayMs":20,
            "chunkSize":5}}"#
    );
    js_sys::JSON::parse(&json).unwrap()
}

async fn sleep(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

/// Poll `cond` until it holds or `timeout_ms` passes.
async fn wait_for(mut cond: impl FnMut() -> bool, timeout_ms: i32) -> bool {
    let mut waited = 0;
    while waited < timeout_ms {
        if cond() {
            return true;
        }
        sleep(20).await;
        waited += 20;
    }
    cond()
}

fn field(value: &JsValue, name: &str) -> JsValue {
    js_sys::Reflect::get(value, &JsValue::from_str(name)).unwrap()
}

#[wasm_bindgen_test]
fn test_parse_element_round_trip() {
    let mut dom = DomDocument::from_window().unwrap();
    let markup = r#"<div data-testid="conversation-turn"><p>hello &amp; bye</p></div>"#;

    let node = dom.parse_element(markup).unwrap().unwrap();
    assert_eq!(dom.outer_html(&node).unwrap(), markup);
    assert!(!dom.is_connected(&node));

    assert!(dom.parse_element("just text").unwrap().is_none());
}

#[wasm_bindgen_test]
fn test_insert_all_before_keeps_order() {
    let page = Page::with_turns(1);
    let mut dom = DomDocument::from_window().unwrap();
    let first = dom.first_child(&page.main).unwrap();

    let nodes: Vec<Element> = ["a", "b", "c"]
        .iter()
        .map(|t| {
            dom.parse_element(&format!(r#"<div data-testid="conversation-turn">{t}</div>"#))
                .unwrap()
                .unwrap()
        })
        .collect();
    dom.insert_all_before(&page.main, &nodes, Some(&first)).unwrap();

    assert_eq!(page.live_texts(), vec!["a", "b", "c", "message 1"]);
}

#[wasm_bindgen_test]
fn test_detach_twice_reports_detached() {
    let page = Page::with_turns(2);
    let mut dom = DomDocument::from_window().unwrap();
    let node = dom.first_child(&page.main).unwrap();

    dom.detach(&node).unwrap();
    assert_eq!(dom.detach(&node), Err(DocumentError::Detached));
    assert_eq!(page.live_texts(), vec!["message 2"]);
}

#[wasm_bindgen_test]
fn test_stylesheet_installed_once() {
    let mut dom = DomDocument::from_window().unwrap();
    dom.ensure_stylesheet(reserved::STYLE_ID, reserved::NO_ANIMATIONS_CSS)
        .unwrap();
    dom.ensure_stylesheet(reserved::STYLE_ID, reserved::NO_ANIMATIONS_CSS)
        .unwrap();

    let found = document()
        .query_selector_all(&format!("#{}", reserved::STYLE_ID))
        .unwrap();
    assert_eq!(found.length(), 1);
}

#[wasm_bindgen_test]
fn test_queries_render_selectors() {
    let page = Page::with_turns(3);
    let dom = DomDocument::from_window().unwrap();

    let turns = dom.query_all(
        &page.main,
        &Selector::AttrEq("data-testid", "conversation-turn"),
    );
    assert_eq!(turns.len(), 3);
    assert!(dom.closest(&turns[0], &Selector::Tag("main")).is_some());
}

#[wasm_bindgen_test]
fn test_prune_and_expand_through_bindings() {
    let page = Page::with_turns(30);
    let pruner = ChatPruner::new(config(10)).unwrap();

    let summary = pruner.prune_now().unwrap();
    assert_eq!(field(&summary, "outcome"), "pruned");
    assert_eq!(field(&summary, "archived"), 20);
    assert_eq!(page.live_texts().len(), 10);
    assert_eq!(page.live_texts()[0], "message 21");

    assert_eq!(pruner.expand_chunk(), 5);
    let status = pruner.status().unwrap();
    assert_eq!(field(&status, "archived"), 15);
    assert_eq!(field(&status, "expanded"), 5);
    assert!(pruner.status_line().contains("Expanded: 5"));

    assert_eq!(pruner.collapse(), 5);
    assert_eq!(pruner.expand_all(), 20);
    assert_eq!(pruner.handle("collapse").unwrap(), 20);
    assert!(pruner.handle("explode").is_err());

    pruner.stop();
}

#[wasm_bindgen_test]
fn test_control_bar_is_unique_and_tracks_history() {
    let _page = Page::with_turns(4);
    let first = ChatPruner::new(config(10)).unwrap();
    first.prune_now().unwrap();
    let second = ChatPruner::new(config(10)).unwrap();
    second.prune_now().unwrap();

    let doc = document();
    let bars = doc
        .query_selector_all(&format!("#{}", reserved::BAR_ID))
        .unwrap();
    assert_eq!(bars.length(), 1);

    // Nothing archived yet, so the expand buttons are disabled.
    let expand = doc
        .query_selector(r#"[data-intent="expand-chunk"]"#)
        .unwrap()
        .unwrap();
    assert!(expand.has_attribute("disabled"));

    second.stop();
    assert!(doc.get_element_by_id(reserved::BAR_ID).is_none());
}

#[wasm_bindgen_test]
fn test_invalid_config_rejected() {
    assert!(ChatPruner::from_json(r#"{"keep":0}"#).is_err());
    assert!(ChatPruner::new(JsValue::from_str("nonsense")).is_err());
}

#[wasm_bindgen_test]
async fn test_observer_prunes_streamed_turns() {
    let page = Page::with_turns(3);
    let pruner = attach(observed_config(5, 0, 10)).unwrap();

    assert!(wait_for(|| pruner.is_running(), 1000).await);
    assert_eq!(page.live_texts().len(), 3);

    page.stream(4..=15);
    assert!(wait_for(|| page.live_texts().len() == 5, 2000).await);
    assert_eq!(page.live_texts()[0], "message 11");
    assert!(document().get_element_by_id(reserved::BAR_ID).is_some());

    pruner.stop();
    assert!(!pruner.is_running());
}

#[wasm_bindgen_test]
async fn test_throttled_burst_gets_trailing_pass() {
    let page = Page::with_turns(3);
    let pruner = attach(observed_config(5, 400, 10)).unwrap();
    assert!(wait_for(|| pruner.is_running(), 1000).await);

    page.stream(4..=12);
    assert!(wait_for(|| page.live_texts().len() == 5, 2000).await);

    // Lands inside the throttle window of the pass that just ran.
    page.stream(13..=16);
    assert!(wait_for(|| page.live_texts().len() == 5, 2000).await);
    assert_eq!(page.live_texts()[4], "message 16");

    let status = pruner.status().unwrap();
    assert_eq!(field(&status, "archived"), 11);
    pruner.stop();
}

#[wasm_bindgen_test]
async fn test_expansion_does_not_trigger_a_pass() {
    let page = Page::with_turns(3);
    let pruner = attach(observed_config(5, 0, 10)).unwrap();
    assert!(wait_for(|| pruner.is_running(), 1000).await);

    page.stream(4..=20);
    assert!(wait_for(|| page.live_texts().len() == 5, 2000).await);

    assert_eq!(pruner.expand_chunk(), 5);
    sleep(300).await;

    let status = pruner.status().unwrap();
    assert_eq!(field(&status, "expanded"), 5);
    assert_eq!(field(&status, "archived"), 10);
    pruner.stop();
}

#[wasm_bindgen_test]
async fn test_huge_start_delay_does_not_fire_early() {
    let page = Page::with_turns(12);
    let pruner = attach(observed_config(5, 0, 1_000_000_000_000_000)).unwrap();

    sleep(200).await;
    assert!(!pruner.is_running());
    assert_eq!(page.live_texts().len(), 12);
    pruner.stop();
}

#[wasm_bindgen_test]
fn test_debug_logging_toggles() {
    set_debug_logging(true).unwrap();
    assert!(tracing::enabled!(tracing::Level::DEBUG));

    set_debug_logging(false).unwrap();
    assert!(!tracing::enabled!(tracing::Level::DEBUG));
    assert!(tracing::enabled!(tracing::Level::INFO));
}
