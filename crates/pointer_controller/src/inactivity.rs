//! Inactivity timer
//!
//! A single deferred fade-out. Every reset issues a fresh token, so a timer
//! that was already in flight when it got replaced is recognized as stale
//! and ignored when it fires.

use pointer_platform::{ClockSource, ListenerId, Nanos, TimerToken};
use tracing::{trace, warn};

use crate::state::{StateGuard, Transition};

/// How long the pointer may stay idle before it fades
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InactivityTimeout {
    #[default]
    Normal,
    Short,
}

#[derive(Debug, Default)]
pub struct InactivityTimer {
    timeout: InactivityTimeout,
    pending: Option<TimerToken>,
    next_token: u64,
}

impl InactivityTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(&self) -> InactivityTimeout {
        self.timeout
    }

    /// Returns true if the preset changed
    pub fn set_timeout(&mut self, timeout: InactivityTimeout) -> bool {
        let changed = self.timeout != timeout;
        self.timeout = timeout;
        changed
    }

    /// The token of the outstanding timer, if any
    pub fn pending(&self) -> Option<TimerToken> {
        self.pending
    }

    /// Cancel the outstanding timer and schedule a new one after `delay`
    pub fn reset(&mut self, clock: &dyn ClockSource, listener: Option<ListenerId>, delay: Nanos) {
        self.cancel(clock, listener);
        let Some(id) = listener else {
            return;
        };

        self.next_token += 1;
        let token = TimerToken(self.next_token);
        match clock.schedule_delayed(id, token, delay) {
            Ok(()) => self.pending = Some(token),
            Err(err) => warn!("InactivityTimer: failed to schedule timeout: {err}"),
        }
    }

    pub fn cancel(&mut self, clock: &dyn ClockSource, listener: Option<ListenerId>) {
        if let (Some(token), Some(id)) = (self.pending.take(), listener) {
            clock.cancel(id, token);
        }
    }

    /// Consume a fired timer; false if `token` is not the outstanding one
    pub fn take_fired(&mut self, token: TimerToken) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl StateGuard<'_> {
    pub fn reset_inactivity_timeout(&mut self) {
        let ctx = self.ctx;
        let delay = ctx.config.inactivity_delay(self.state.inactivity.timeout());
        self.state
            .inactivity
            .reset(&*ctx.clock, ctx.listener(), delay);
    }

    pub fn remove_inactivity_timeout(&mut self) {
        let ctx = self.ctx;
        self.state.inactivity.cancel(&*ctx.clock, ctx.listener());
    }

    /// Handle a timer fire from the clock
    pub fn on_inactivity_timeout(&mut self, token: TimerToken) {
        if !self.state.inactivity.take_fired(token) {
            trace!("InactivityTimer: ignoring stale timer {}", token.0);
            return;
        }
        self.fade(Transition::Gradual);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointer_platform::headless::ManualClock;
    use pointer_platform::{ClockListener, DisplayEvent, ListenerStatus};
    use std::sync::Arc;

    struct Quiet;

    impl ClockListener for Quiet {
        fn on_display_events(&self, _: &[DisplayEvent]) -> ListenerStatus {
            ListenerStatus::Keep
        }

        fn on_timer(&self, _: TimerToken) -> ListenerStatus {
            ListenerStatus::Keep
        }
    }

    #[test]
    fn test_reset_replaces_pending_timer() {
        let clock = ManualClock::new();
        let id = clock.register(Arc::new(Quiet)).unwrap();
        let mut timer = InactivityTimer::new();

        timer.reset(&clock, Some(id), 100);
        let first = timer.pending().unwrap();
        timer.reset(&clock, Some(id), 50);
        let second = timer.pending().unwrap();

        assert_ne!(first, second);
        assert_eq!(clock.pending_timers(), vec![(second, 50)]);
        assert!(!timer.take_fired(first));
        assert!(timer.take_fired(second));
        assert_eq!(timer.pending(), None);
    }

    #[test]
    fn test_cancel_clears_clock_timer() {
        let clock = ManualClock::new();
        let id = clock.register(Arc::new(Quiet)).unwrap();
        let mut timer = InactivityTimer::new();

        timer.reset(&clock, Some(id), 100);
        timer.cancel(&clock, Some(id));
        assert_eq!(timer.pending(), None);
        assert!(clock.pending_timers().is_empty());
    }

    #[test]
    fn test_without_listener_nothing_is_scheduled() {
        let clock = ManualClock::new();
        let mut timer = InactivityTimer::new();
        timer.reset(&clock, None, 100);
        assert_eq!(timer.pending(), None);
    }

    #[test]
    fn test_set_timeout_reports_change() {
        let mut timer = InactivityTimer::new();
        assert_eq!(timer.timeout(), InactivityTimeout::Normal);
        assert!(!timer.set_timeout(InactivityTimeout::Normal));
        assert!(timer.set_timeout(InactivityTimeout::Short));
        assert_eq!(timer.timeout(), InactivityTimeout::Short);
    }
}
