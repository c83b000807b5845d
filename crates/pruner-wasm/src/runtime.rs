//! Browser-side driver: timers, the mutation observer and intent routing.
//!
//! The session lives in a `RefCell` shared by every callback. All callbacks
//! run on the page's event loop, so a failed `try_borrow_mut` only happens
//! on re-entry; that borrow is the in-progress guard, and a caller that
//! cannot take it gets `Busy`.

use crate::bar::ControlBar;
use crate::dom::DomDocument;
use js_sys::{Array, Function};
use pruner_core::{
    is_engine_owned, main_region, ExpansionOutcome, Intent, PruneOutcome, PrunerSession, Schedule,
    StatusReport,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, trace, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Element, IdleRequestOptions, MutationObserver, MutationObserverInit, MutationRecord, Window,
};

pub type Session = PrunerSession<DomDocument, ControlBar>;

type RecordsCallback = Closure<dyn FnMut(Array, MutationObserver)>;

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

/// Timer delay in the range `setTimeout` accepts; longer delays saturate
/// instead of wrapping negative and firing at once.
fn timer_ms(ms: u64) -> i32 {
    ms.min(i32::MAX as u64) as i32
}

pub struct Runtime {
    session: RefCell<Session>,
    window: Window,
    idle_callbacks: bool,
    busy_retry_ms: u64,
    stopped: Cell<bool>,
    observer: RefCell<Option<(MutationObserver, RecordsCallback)>>,
    refresh: RefCell<Option<(i32, Closure<dyn FnMut()>)>>,
}

impl Runtime {
    pub fn new(window: Window, session: Session) -> Rc<Self> {
        let idle_callbacks =
            js_sys::Reflect::has(&window, &JsValue::from_str("requestIdleCallback"))
                .unwrap_or(false);
        let busy_retry_ms = session.config().fallback_delay_ms;
        let runtime = Rc::new(Runtime {
            session: RefCell::new(session.with_idle_callbacks(idle_callbacks)),
            window,
            idle_callbacks,
            busy_retry_ms,
            stopped: Cell::new(false),
            observer: RefCell::new(None),
            refresh: RefCell::new(None),
        });

        let weak = Rc::downgrade(&runtime);
        runtime
            .session
            .borrow_mut()
            .sink_mut()
            .set_dispatch(Rc::new(move |intent| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.dispatch(intent);
                }
            }));
        runtime
    }

    /// Begin observing after `delay_ms`, giving the host time to render.
    pub fn start(self: &Rc<Self>) -> Result<(), JsValue> {
        let delay_ms = self.session.borrow().config().start_delay_ms;
        let weak = Rc::downgrade(self);
        let begin = Closure::once_into_js(move || {
            if let Some(runtime) = weak.upgrade() {
                if let Err(e) = runtime.begin() {
                    warn!(error = ?e, "pruner failed to start");
                }
            }
        });
        self.window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                begin.unchecked_ref(),
                timer_ms(delay_ms),
            )
            .map(|_| ())
    }

    pub fn stop(&self) {
        if self.stopped.replace(true) {
            return;
        }
        if let Some((observer, _)) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        if let Some((handle, _)) = self.refresh.borrow_mut().take() {
            self.window.clear_interval_with_handle(handle);
        }
        if let Ok(mut session) = self.session.try_borrow_mut() {
            session.sink_mut().unmount();
        }
        info!("pruner stopped");
    }

    pub fn is_running(&self) -> bool {
        self.observer.borrow().is_some()
    }

    /// Run a pass immediately, outside the debouncer.
    pub fn prune_now(&self) -> PruneOutcome {
        let Ok(mut session) = self.session.try_borrow_mut() else {
            return PruneOutcome::Busy;
        };
        ensure_bar(&mut session);
        session.prune_now(now_ms())
    }

    pub fn dispatch(&self, intent: Intent) -> ExpansionOutcome {
        let Ok(mut session) = self.session.try_borrow_mut() else {
            debug!(%intent, "session busy, intent dropped");
            return ExpansionOutcome::Busy;
        };
        let outcome = session.handle(intent);
        match &outcome {
            ExpansionOutcome::Moved(report) => info!(
                %intent,
                moved = report.moved,
                expanded = report.expanded_after,
                "history moved"
            ),
            ExpansionOutcome::Nothing => debug!(%intent, "nothing to move"),
            ExpansionOutcome::Busy => debug!(%intent, "operation in progress"),
        }
        outcome
    }

    pub fn status(&self) -> Option<StatusReport> {
        self.session.try_borrow().ok().map(|s| s.status())
    }

    fn begin(self: &Rc<Self>) -> Result<(), JsValue> {
        if self.stopped.get() {
            return Ok(());
        }
        {
            let mut session = self
                .session
                .try_borrow_mut()
                .map_err(|_| JsValue::from_str("session busy"))?;
            ensure_bar(&mut session);
            session.refresh_status();
        }
        self.observe()?;
        self.start_refresh()?;

        let schedule = self
            .session
            .try_borrow_mut()
            .ok()
            .and_then(|mut s| s.request_prune());
        if let Some(schedule) = schedule {
            self.arm(schedule);
        }
        info!(idle_callbacks = self.idle_callbacks, "pruner started");
        Ok(())
    }

    fn observe(self: &Rc<Self>) -> Result<(), JsValue> {
        let main = {
            let session = self
                .session
                .try_borrow()
                .map_err(|_| JsValue::from_str("session busy"))?;
            main_region(session.document())
        };

        let weak = Rc::downgrade(self);
        let callback: RecordsCallback =
            Closure::new(move |records: Array, _observer: MutationObserver| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.on_records(&records);
                }
            });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer.observe_with_options(&main, &init)?;

        *self.observer.borrow_mut() = Some((observer, callback));
        Ok(())
    }

    fn start_refresh(self: &Rc<Self>) -> Result<(), JsValue> {
        let interval_ms = self.session.borrow().config().status_refresh_ms;
        let weak = Rc::downgrade(self);
        let tick = Closure::<dyn FnMut()>::new(move || {
            let Some(runtime) = weak.upgrade() else { return };
            let Ok(mut session) = runtime.session.try_borrow_mut() else {
                return;
            };
            if session.sink().is_mounted() {
                session.refresh_status();
            }
        });
        let handle = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                tick.as_ref().unchecked_ref(),
                timer_ms(interval_ms),
            )?;
        *self.refresh.borrow_mut() = Some((handle, tick));
        Ok(())
    }

    fn on_records(self: &Rc<Self>, records: &Array) {
        if self.stopped.get() {
            return;
        }
        let schedule = {
            let Ok(mut session) = self.session.try_borrow_mut() else {
                return;
            };
            if only_engine_mutations(session.document(), records) {
                trace!("ignoring mutations inside engine-owned nodes");
                return;
            }
            session.on_mutation()
        };
        if let Some(schedule) = schedule {
            self.arm(schedule);
        }
    }

    fn arm(self: &Rc<Self>, schedule: Schedule) {
        let weak = Rc::downgrade(self);
        let callback = Closure::once_into_js(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.run_scheduled();
            }
        });
        let function: &Function = callback.unchecked_ref();

        let armed = match schedule {
            Schedule::Idle { timeout_ms } if self.idle_callbacks => {
                let options = IdleRequestOptions::new();
                options.set_timeout(timer_ms(timeout_ms) as u32);
                self.window
                    .request_idle_callback_with_options(function, &options)
                    .map(|_| ())
            }
            Schedule::Idle {
                timeout_ms: delay_ms,
            }
            | Schedule::Delay { delay_ms } => self
                .window
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    function,
                    timer_ms(delay_ms),
                )
                .map(|_| ()),
        };
        trace!(?schedule, "pass armed");

        if let Err(e) = armed {
            warn!(error = ?e, "could not arm timer, running pass now");
            self.run_scheduled();
        }
    }

    fn run_scheduled(self: &Rc<Self>) {
        if self.stopped.get() {
            return;
        }
        let retry = {
            let Ok(mut session) = self.session.try_borrow_mut() else {
                debug!("session busy, deferring scheduled pass");
                self.arm(Schedule::Delay {
                    delay_ms: self.busy_retry_ms,
                });
                return;
            };
            ensure_bar(&mut session);
            let outcome = session.on_scheduled(now_ms());
            match outcome {
                PruneOutcome::Pruned(report) => {
                    info!(
                        archived = report.archived,
                        live = report.live_after,
                        stored = session.store().len(),
                        "pruned"
                    );
                    None
                }
                PruneOutcome::Throttled { retry_in_ms } => session.retry_after(retry_in_ms),
                PruneOutcome::Unchanged { .. } | PruneOutcome::Busy => None,
            }
        };
        if let Some(schedule) = retry {
            self.arm(schedule);
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ensure_bar(session: &mut Session) {
    let main = main_region(session.document());
    if let Err(e) = session.sink_mut().ensure(&main) {
        warn!(error = ?e, "could not mount control bar");
    }
}

/// Whether every record targets a node inside the bar, window or markers.
fn only_engine_mutations(doc: &DomDocument, records: &Array) -> bool {
    records.iter().all(|record| {
        let Ok(record) = record.dyn_into::<MutationRecord>() else {
            return false;
        };
        let Some(target) = record.target() else {
            return false;
        };
        let element = match target.dyn_into::<Element>() {
            Ok(element) => element,
            Err(node) => match node.parent_element() {
                Some(parent) => parent,
                None => return false,
            },
        };
        is_engine_owned(doc, &element)
    })
}
