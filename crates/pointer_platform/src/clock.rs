//! Clock and display event source contract
//!
//! The clock delivers single-shot vsync ticks and delayed timers to registered
//! listeners on its own event thread. Callers of [`ClockSource`] methods may be
//! holding locks, so an implementation must never invoke a listener from
//! inside one of these methods; callbacks are only ever made from the event
//! thread (or, for test clocks, from an explicit delivery call).

use std::sync::Arc;

use crate::display::DisplayId;
use crate::error::Result;

/// Monotonic timestamp or duration in nanoseconds
pub type Nanos = i64;

pub const NANOS_PER_MILLI: Nanos = 1_000_000;
pub const NANOS_PER_SECOND: Nanos = 1_000_000_000;

/// Convert milliseconds to [`Nanos`], saturating on overflow
pub fn millis_to_nanos(millis: u64) -> Nanos {
    Nanos::try_from(millis)
        .unwrap_or(Nanos::MAX)
        .saturating_mul(NANOS_PER_MILLI)
}

/// Handle to a listener registered with a [`ClockSource`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Identifies one scheduled timer of a listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

/// An event read from the display event connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    /// A refresh of the display happened at `timestamp`
    Vsync {
        display_id: DisplayId,
        timestamp: Nanos,
        count: u32,
    },
    /// A display was connected or disconnected
    Hotplug {
        display_id: DisplayId,
        connected: bool,
    },
}

/// What the clock should do with a listener after a callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerStatus {
    /// Keep delivering to this listener
    Keep,
    /// Drop the listener; no further callbacks
    Deregister,
}

/// Receives ticks and timers from a [`ClockSource`]
pub trait ClockListener: Send + Sync {
    /// All display events read since the last delivery, oldest first
    fn on_display_events(&self, events: &[DisplayEvent]) -> ListenerStatus;

    /// A timer scheduled with [`ClockSource::schedule_delayed`] elapsed
    fn on_timer(&self, token: TimerToken) -> ListenerStatus;

    /// The event connection broke or hung up
    fn on_error(&self) -> ListenerStatus {
        ListenerStatus::Deregister
    }
}

/// Source of vsync ticks and delayed timers
pub trait ClockSource: Send + Sync {
    /// Current monotonic time on the same base as vsync timestamps
    fn now(&self) -> Nanos;

    /// Register a listener
    ///
    /// Fails when the underlying display event connection is unavailable.
    fn register(&self, listener: Arc<dyn ClockListener>) -> Result<ListenerId>;

    /// Remove a listener and everything it has outstanding
    fn unregister(&self, id: ListenerId);

    /// Ask for exactly one future vsync delivery to `id`
    ///
    /// Repeated requests before the tick is delivered collapse into one.
    fn request_next_tick(&self, id: ListenerId) -> Result<()>;

    /// Deliver `token` to `id` after `delay`
    fn schedule_delayed(&self, id: ListenerId, token: TimerToken, delay: Nanos) -> Result<()>;

    /// Cancel a pending timer; unknown tokens are ignored
    fn cancel(&self, id: ListenerId, token: TimerToken);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_to_nanos() {
        assert_eq!(millis_to_nanos(0), 0);
        assert_eq!(millis_to_nanos(500), 500 * NANOS_PER_MILLI);
    }

    #[test]
    fn test_millis_to_nanos_saturates_instead_of_wrapping() {
        assert_eq!(millis_to_nanos(u64::MAX), Nanos::MAX);
        assert_eq!(millis_to_nanos(i64::MAX as u64 + 1), Nanos::MAX);
        assert_eq!(millis_to_nanos(i64::MAX as u64 / 1000), Nanos::MAX);
    }
}
