//! Event bridge
//!
//! The clock's listener. It owns nothing but a weak handle to the state
//! store, so the controller can be dropped while the clock thread is in the
//! middle of a delivery: the callback either fails to upgrade, or upgrades
//! and then finds the torn-down flag set under the lock. Either way it does
//! nothing and asks the clock to forget it.

use std::sync::Weak;

use pointer_platform::{ClockListener, DisplayEvent, ListenerStatus, Nanos, TimerToken};
use smallvec::SmallVec;
use tracing::{error, trace};

use crate::state::StateStore;

pub(crate) struct EventBridge {
    store: Weak<StateStore>,
}

impl EventBridge {
    pub fn new(store: Weak<StateStore>) -> Self {
        Self { store }
    }

    /// Timestamp of the newest vsync in a burst
    pub fn latest_vsync(events: &[DisplayEvent]) -> Option<Nanos> {
        let vsyncs: SmallVec<[Nanos; 4]> = events
            .iter()
            .filter_map(|event| match *event {
                DisplayEvent::Vsync { timestamp, .. } => Some(timestamp),
                DisplayEvent::Hotplug { .. } => None,
            })
            .collect();
        if vsyncs.len() > 1 {
            trace!("EventBridge: collapsing {} vsync events", vsyncs.len());
        }
        vsyncs.last().copied()
    }
}

impl ClockListener for EventBridge {
    fn on_display_events(&self, events: &[DisplayEvent]) -> ListenerStatus {
        let Some(store) = self.store.upgrade() else {
            trace!("EventBridge: controller gone, dropping display events");
            return ListenerStatus::Deregister;
        };
        let Some(timestamp) = Self::latest_vsync(events) else {
            return ListenerStatus::Keep;
        };

        let mut guard = store.lock();
        if guard.is_torn_down() {
            return ListenerStatus::Deregister;
        }
        guard.animate(timestamp);
        ListenerStatus::Keep
    }

    fn on_timer(&self, token: TimerToken) -> ListenerStatus {
        let Some(store) = self.store.upgrade() else {
            trace!("EventBridge: controller gone, dropping timer {}", token.0);
            return ListenerStatus::Deregister;
        };

        let mut guard = store.lock();
        if guard.is_torn_down() {
            return ListenerStatus::Deregister;
        }
        guard.on_inactivity_timeout(token);
        ListenerStatus::Keep
    }

    fn on_error(&self) -> ListenerStatus {
        error!("EventBridge: display event connection failed, no more animation ticks");
        ListenerStatus::Deregister
    }
}
