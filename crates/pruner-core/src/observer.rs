//! Debounces host mutations into deferred prune passes.
//!
//! Two states: `Idle` and `Scheduled`. A mutation seen while idle schedules
//! exactly one pass; further mutations are absorbed until that pass fires.
//! The host owns the actual timer; this type only says when and how to arm
//! it.

/// Debouncer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverState {
    Idle,
    Scheduled,
}

/// How the host should defer the pending pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Run when the host is idle, but no later than `timeout_ms`.
    Idle { timeout_ms: u64 },
    /// Run after a fixed delay.
    Delay { delay_ms: u64 },
}

#[derive(Clone, Debug)]
pub struct ChangeObserver {
    state: ObserverState,
    idle_timeout_ms: u64,
    fallback_delay_ms: u64,
    idle_callbacks: bool,
}

impl ChangeObserver {
    pub fn new(idle_timeout_ms: u64, fallback_delay_ms: u64) -> Self {
        ChangeObserver {
            state: ObserverState::Idle,
            idle_timeout_ms,
            fallback_delay_ms,
            idle_callbacks: true,
        }
    }

    /// Declare whether the host supports idle callbacks.
    pub fn with_idle_callbacks(mut self, available: bool) -> Self {
        self.idle_callbacks = available;
        self
    }

    pub fn state(&self) -> ObserverState {
        self.state
    }

    /// A host mutation was observed.
    pub fn notify(&mut self) -> Option<Schedule> {
        self.arm(self.preferred())
    }

    /// Schedule a pass after `delay_ms` regardless of idle support. Used for
    /// the trailing pass after a throttled one.
    pub fn retry_after(&mut self, delay_ms: u64) -> Option<Schedule> {
        self.arm(Schedule::Delay { delay_ms })
    }

    /// The deferred pass is starting. Returns false if nothing was pending.
    pub fn fire(&mut self) -> bool {
        let pending = self.state == ObserverState::Scheduled;
        self.state = ObserverState::Idle;
        pending
    }

    fn arm(&mut self, schedule: Schedule) -> Option<Schedule> {
        match self.state {
            ObserverState::Scheduled => None,
            ObserverState::Idle => {
                self.state = ObserverState::Scheduled;
                Some(schedule)
            }
        }
    }

    fn preferred(&self) -> Schedule {
        if self.idle_callbacks {
            Schedule::Idle {
                timeout_ms: self.idle_timeout_ms,
            }
        } else {
            Schedule::Delay {
                delay_ms: self.fallback_delay_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_schedules_once() {
        let mut observer = ChangeObserver::new(1200, 250);

        assert_eq!(observer.notify(), Some(Schedule::Idle { timeout_ms: 1200 }));
        assert_eq!(observer.state(), ObserverState::Scheduled);
        for _ in 0..50 {
            assert_eq!(observer.notify(), None);
        }

        assert!(observer.fire());
        assert_eq!(observer.state(), ObserverState::Idle);
        assert!(observer.notify().is_some());
    }

    #[test]
    fn test_fallback_delay() {
        let mut observer = ChangeObserver::new(1200, 250).with_idle_callbacks(false);
        assert_eq!(observer.notify(), Some(Schedule::Delay { delay_ms: 250 }));
    }

    #[test]
    fn test_retry_respects_pending_pass() {
        let mut observer = ChangeObserver::new(1200, 250);
        observer.notify();
        assert_eq!(observer.retry_after(100), None);

        observer.fire();
        assert_eq!(observer.retry_after(100), Some(Schedule::Delay { delay_ms: 100 }));
    }

    #[test]
    fn test_stale_fire() {
        let mut observer = ChangeObserver::new(1200, 250);
        assert!(!observer.fire());
    }
}
