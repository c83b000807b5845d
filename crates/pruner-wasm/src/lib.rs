//! # chat-pruner WebAssembly bindings
//!
//! Content-script entry point for the transcript pruner. Binds
//! `pruner-core` to the live page: the DOM document, a `MutationObserver`
//! on the main region, idle-callback scheduling and the control bar.
//!
//! ## Usage
//!
//! ```javascript
//! import init, { attach } from 'pruner-wasm';
//!
//! await init();
//!
//! const prefs = await chrome.storage.sync.get(null);
//! const pruner = attach(prefs);   // observer starts after `startDelayMs`
//!
//! pruner.expand_chunk();
//! console.log(pruner.status_line());  // "Archived: 22 | Keeping latest: 18"
//! ```

mod bar;
mod dom;
mod logging;
mod runtime;

pub use bar::ControlBar;
pub use dom::DomDocument;

use pruner_core::{ExpansionOutcome, Intent, PruneOutcome, PrunerConfig, PrunerSession};
use runtime::Runtime;
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init();
}

/// Turn DEBUG console output on or off. Takes effect immediately.
#[wasm_bindgen]
pub fn set_debug_logging(enabled: bool) -> Result<(), JsValue> {
    logging::init();
    logging::set_verbose(enabled).map_err(|e| JsValue::from_str(&e))
}

/// What a prune pass did, as handed to JavaScript.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct PassSummary {
    outcome: &'static str,
    archived: usize,
    skipped: usize,
    discarded: usize,
    live: usize,
    keep: usize,
    retry_in_ms: Option<u64>,
}

impl From<PruneOutcome> for PassSummary {
    fn from(outcome: PruneOutcome) -> Self {
        match outcome {
            PruneOutcome::Throttled { retry_in_ms } => PassSummary {
                outcome: "throttled",
                retry_in_ms: Some(retry_in_ms),
                ..Default::default()
            },
            PruneOutcome::Busy => PassSummary {
                outcome: "busy",
                ..Default::default()
            },
            PruneOutcome::Unchanged { live, keep } => PassSummary {
                outcome: "unchanged",
                live,
                keep,
                ..Default::default()
            },
            PruneOutcome::Pruned(report) => PassSummary {
                outcome: "pruned",
                archived: report.archived,
                skipped: report.skipped,
                discarded: report.discarded,
                live: report.live_after,
                keep: report.keep,
                retry_in_ms: None,
            },
        }
    }
}

fn moved(outcome: ExpansionOutcome) -> usize {
    outcome.report().map(|r| r.moved).unwrap_or(0)
}

// ============================================================================
// ChatPruner
// ============================================================================

/// A pruner attached to the current page.
///
/// Dropping the handle from JavaScript (`free()`) stops the observer and
/// removes the control bar.
#[wasm_bindgen]
pub struct ChatPruner {
    runtime: Rc<Runtime>,
}

#[wasm_bindgen]
impl ChatPruner {
    /// Attach to the page without starting the observer.
    ///
    /// # Arguments
    /// * `config` - Preferences object; `undefined` or `null` for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<ChatPruner, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            PrunerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };
        Self::with_config(config)
    }

    /// Attach to the page with preferences given as a JSON string.
    pub fn from_json(json: &str) -> Result<ChatPruner, JsValue> {
        let config = PrunerConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Self::with_config(config)
    }

    /// Start observing after the configured start delay.
    pub fn start(&self) -> Result<(), JsValue> {
        self.runtime.start()
    }

    /// Stop observing and remove the control bar.
    pub fn stop(&self) {
        self.runtime.stop();
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_running()
    }

    /// Run a prune pass immediately. Returns a summary object.
    pub fn prune_now(&self) -> Result<JsValue, JsValue> {
        let summary = PassSummary::from(self.runtime.prune_now());
        serde_wasm_bindgen::to_value(&summary).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Restore the next chunk of history. Returns the number of blocks moved.
    pub fn expand_chunk(&self) -> usize {
        moved(self.runtime.dispatch(Intent::ExpandChunk))
    }

    /// Fold expanded history back into the store.
    pub fn collapse(&self) -> usize {
        moved(self.runtime.dispatch(Intent::Collapse))
    }

    /// Restore all of history.
    pub fn expand_all(&self) -> usize {
        moved(self.runtime.dispatch(Intent::ExpandAll))
    }

    /// Service an intent by name: `expand-chunk`, `collapse` or `expand-all`.
    pub fn handle(&self, intent: &str) -> Result<usize, JsValue> {
        let intent: Intent = intent.parse().map_err(|e: String| JsValue::from_str(&e))?;
        Ok(moved(self.runtime.dispatch(intent)))
    }

    /// Current status as `{ archived, expanded, keep, canvasOpen, aggressiveWhenCanvas }`.
    pub fn status(&self) -> Result<JsValue, JsValue> {
        let status = self
            .runtime
            .status()
            .ok_or_else(|| JsValue::from_str("pruner is busy"))?;
        serde_wasm_bindgen::to_value(&status).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Current status as the one-line summary shown in the bar.
    pub fn status_line(&self) -> String {
        self.runtime
            .status()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

impl ChatPruner {
    fn with_config(config: PrunerConfig) -> Result<ChatPruner, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let doc = DomDocument::from_window().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let bar = ControlBar::new(doc.document().clone(), config.chunk_size, config.sticky_bar);
        let session =
            PrunerSession::new(doc, config, bar).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(ChatPruner {
            runtime: Runtime::new(window, session),
        })
    }
}

/// Attach to the page and start observing.
#[wasm_bindgen]
pub fn attach(config: JsValue) -> Result<ChatPruner, JsValue> {
    let pruner = ChatPruner::new(config)?;
    pruner.start()?;
    Ok(pruner)
}
