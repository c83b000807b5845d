//! Per-page pruning session.
//!
//! One explicit owner for what would otherwise be page-wide singletons:
//! the store, the debouncer and the throttle. Created at page load, dropped
//! at page unload.
//!
//! Every pass and expansion takes `&mut self`, so exclusive access is the
//! in-progress guard: nothing can re-enter a running operation. Hosts that
//! share a session between callbacks report `Busy` when they cannot get
//! that access.

use crate::config::PrunerConfig;
use crate::control::{Intent, NullSink, StatusReport, StatusSink};
use crate::document::{is_canvas_open, reserved, HostDocument};
use crate::engine::{PruneOutcome, PruningEngine};
use crate::error::Result;
use crate::expansion::{ExpansionController, ExpansionOutcome};
use crate::observer::{ChangeObserver, Schedule};
use crate::regions;
use crate::snapshot::SnapshotStore;
use tracing::{debug, trace, warn};

pub struct PrunerSession<D: HostDocument, S: StatusSink = NullSink> {
    doc: D,
    config: PrunerConfig,
    store: SnapshotStore,
    engine: PruningEngine,
    expansion: ExpansionController,
    observer: ChangeObserver,
    sink: S,
}

impl<D: HostDocument> PrunerSession<D, NullSink> {
    /// Create a session that publishes status nowhere.
    pub fn detached(doc: D, config: PrunerConfig) -> Result<Self> {
        Self::new(doc, config, NullSink)
    }
}

impl<D: HostDocument, S: StatusSink> PrunerSession<D, S> {
    /// Create a session over `doc`. Fails only on invalid configuration.
    pub fn new(doc: D, config: PrunerConfig, sink: S) -> Result<Self> {
        let config = config.validate()?;
        debug!(
            keep = config.keep,
            canvas_keep = config.canvas_keep,
            max_stored = config.max_stored,
            "pruner session created"
        );
        Ok(PrunerSession {
            doc,
            store: SnapshotStore::new(config.max_stored),
            engine: PruningEngine::new(config.throttle_ms),
            expansion: ExpansionController::new(config.chunk_size),
            observer: ChangeObserver::new(config.idle_timeout_ms, config.fallback_delay_ms),
            sink,
            config,
        })
    }

    /// Declare whether the host has idle callbacks.
    pub fn with_idle_callbacks(mut self, available: bool) -> Self {
        self.observer = self.observer.with_idle_callbacks(available);
        self
    }

    pub fn config(&self) -> &PrunerConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn observer(&self) -> &ChangeObserver {
        &self.observer
    }

    /// Retention threshold for the page as it is right now.
    pub fn keep(&self) -> usize {
        self.config.keep_for(is_canvas_open(&self.doc))
    }

    /// The host mutated the page. Returns a schedule when the host should
    /// arm its timer.
    pub fn on_mutation(&mut self) -> Option<Schedule> {
        self.observer.notify()
    }

    /// Ask for a pass without a mutation, e.g. at startup.
    pub fn request_prune(&mut self) -> Option<Schedule> {
        self.observer.notify()
    }

    /// Arm the trailing pass after a throttled one.
    pub fn retry_after(&mut self, delay_ms: u64) -> Option<Schedule> {
        self.observer.retry_after(delay_ms)
    }

    /// The host timer armed by [`on_mutation`](Self::on_mutation) fired.
    pub fn on_scheduled(&mut self, now_ms: u64) -> PruneOutcome {
        if !self.observer.fire() {
            trace!("scheduled pass fired with nothing pending");
        }
        self.prune_now(now_ms)
    }

    /// Run a prune pass, subject to the throttle.
    pub fn prune_now(&mut self, now_ms: u64) -> PruneOutcome {
        if let Err(throttled) = self.engine.admit(now_ms) {
            trace!(?throttled, "prune throttled");
            return throttled;
        }

        self.install_page_glue();
        let keep = self.keep();

        let outcome = self.engine.prune(&mut self.doc, &mut self.store, keep);

        self.publish_status();
        outcome
    }

    /// Service a user intent.
    pub fn handle(&mut self, intent: Intent) -> ExpansionOutcome {
        debug!(%intent, "intent");
        match intent {
            Intent::ExpandChunk => self.expand_chunk(),
            Intent::Collapse => self.collapse(),
            Intent::ExpandAll => self.expand_all(),
        }
    }

    pub fn expand_chunk(&mut self) -> ExpansionOutcome {
        self.guarded(|expansion, doc, store| expansion.expand_chunk(doc, store))
    }

    pub fn collapse(&mut self) -> ExpansionOutcome {
        self.guarded(|expansion, doc, store| expansion.collapse(doc, store))
    }

    pub fn expand_all(&mut self) -> ExpansionOutcome {
        self.guarded(|expansion, doc, store| expansion.expand_all(doc, store))
    }

    /// Current status.
    pub fn status(&self) -> StatusReport {
        let canvas_open = is_canvas_open(&self.doc);
        StatusReport {
            archived: self.store.len(),
            expanded: regions::expanded_count(&self.doc),
            keep: self.config.keep_for(canvas_open),
            canvas_open,
            aggressive_when_canvas: self.config.aggressive_when_canvas,
        }
    }

    /// Push the current status to the sink.
    pub fn refresh_status(&mut self) {
        self.publish_status();
    }

    fn guarded<F>(&mut self, op: F) -> ExpansionOutcome
    where
        F: FnOnce(&ExpansionController, &mut D, &mut SnapshotStore) -> ExpansionOutcome,
    {
        let outcome = op(&self.expansion, &mut self.doc, &mut self.store);

        self.publish_status();
        outcome
    }

    fn install_page_glue(&mut self) {
        if self.config.disable_animations {
            if let Err(e) = self
                .doc
                .ensure_stylesheet(reserved::STYLE_ID, reserved::NO_ANIMATIONS_CSS)
            {
                warn!(error = %e, "could not install stylesheet");
            }
        }
        if let Err(e) = regions::ensure_spacer(&mut self.doc, self.config.bar_spacer_px) {
            warn!(error = %e, "could not place spacer");
        }
    }

    fn publish_status(&mut self) {
        let status = self.status();
        self.sink.publish(&status);
    }
}
