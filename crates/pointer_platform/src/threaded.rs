//! Threaded clock
//!
//! A [`ClockSource`] that runs its own event thread, emulating a display's
//! vsync signal at a fixed refresh rate and firing delayed timers. Ticks are
//! only delivered to listeners that asked for one, so an idle controller
//! costs nothing.
//!
//! ```ignore
//! let clock = Arc::new(ThreadedClock::new(60));
//! let controller = PointerController::new(resources, clock.clone(), backend);
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::clock::{
    ClockListener, ClockSource, DisplayEvent, ListenerId, ListenerStatus, Nanos, TimerToken,
    NANOS_PER_SECOND,
};
use crate::display::DisplayId;
use crate::error::{PlatformError, Result};
use crate::sync::lock;

struct Timer {
    listener: ListenerId,
    token: TimerToken,
    deadline: Nanos,
}

enum Delivery {
    Vsync(ListenerId, Arc<dyn ClockListener>, Nanos),
    Timer(ListenerId, Arc<dyn ClockListener>, TimerToken),
}

#[derive(Default)]
struct ClockState {
    listeners: FxHashMap<ListenerId, Arc<dyn ClockListener>>,
    tick_requests: FxHashSet<ListenerId>,
    /// Vsync boundary the outstanding tick requests will be delivered at
    vsync_deadline: Option<Nanos>,
    timers: Vec<Timer>,
    next_id: u64,
    vsync_count: u32,
    stopped: bool,
}

impl ClockState {
    fn forget(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
        self.tick_requests.remove(&id);
        if self.tick_requests.is_empty() {
            self.vsync_deadline = None;
        }
        self.timers.retain(|timer| timer.listener != id);
    }
}

struct ClockShared {
    state: Mutex<ClockState>,
    wake: Condvar,
    epoch: Instant,
    period: Nanos,
}

impl ClockShared {
    fn now(&self) -> Nanos {
        self.epoch.elapsed().as_nanos() as Nanos
    }

    /// First vsync boundary strictly after `now`
    fn next_vsync_after(&self, now: Nanos) -> Nanos {
        (now / self.period + 1) * self.period
    }
}

/// A vsync and timer source backed by a dedicated thread
pub struct ThreadedClock {
    shared: Arc<ClockShared>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ThreadedClock {
    /// Start the event thread with the given refresh rate (clamped to 1..=1000 Hz)
    pub fn new(refresh_hz: u32) -> Self {
        let period = NANOS_PER_SECOND / refresh_hz.clamp(1, 1000) as Nanos;
        let shared = Arc::new(ClockShared {
            state: Mutex::new(ClockState::default()),
            wake: Condvar::new(),
            epoch: Instant::now(),
            period,
        });

        let thread_shared = Arc::clone(&shared);
        let thread_handle = thread::Builder::new()
            .name("pointer-vsync".to_string())
            .spawn(move || run_event_thread(&thread_shared))
            .map_err(|err| tracing::error!("ThreadedClock: failed to spawn event thread: {err}"))
            .ok();

        if thread_handle.is_none() {
            lock(&shared.state).stopped = true;
        }

        Self {
            shared,
            thread_handle,
        }
    }

    /// Interval between emulated vsync events
    pub fn frame_period(&self) -> Nanos {
        self.shared.period
    }

    /// Check if the event thread is running
    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some() && !lock(&self.shared.state).stopped
    }

    /// Stop the event thread; further registrations fail
    ///
    /// Called from the event thread itself (a listener dropping the last
    /// handle), the thread is only told to exit and is not joined.
    pub fn stop(&mut self) {
        lock(&self.shared.state).stopped = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for ThreadedClock {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ClockSource for ThreadedClock {
    fn now(&self) -> Nanos {
        self.shared.now()
    }

    fn register(&self, listener: Arc<dyn ClockListener>) -> Result<ListenerId> {
        let mut state = lock(&self.shared.state);
        if state.stopped {
            return Err(PlatformError::ClockStopped);
        }
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.listeners.insert(id, listener);
        Ok(id)
    }

    fn unregister(&self, id: ListenerId) {
        lock(&self.shared.state).forget(id);
    }

    fn request_next_tick(&self, id: ListenerId) -> Result<()> {
        let mut state = lock(&self.shared.state);
        if state.stopped {
            return Err(PlatformError::ClockStopped);
        }
        if !state.listeners.contains_key(&id) {
            return Err(PlatformError::UnknownListener(id));
        }
        state.tick_requests.insert(id);
        if state.vsync_deadline.is_none() {
            state.vsync_deadline = Some(self.shared.next_vsync_after(self.shared.now()));
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    fn schedule_delayed(&self, id: ListenerId, token: TimerToken, delay: Nanos) -> Result<()> {
        let deadline = self.shared.now() + delay.max(0);
        let mut state = lock(&self.shared.state);
        if state.stopped {
            return Err(PlatformError::ClockStopped);
        }
        if !state.listeners.contains_key(&id) {
            return Err(PlatformError::UnknownListener(id));
        }
        state.timers.push(Timer {
            listener: id,
            token,
            deadline,
        });
        self.shared.wake.notify_one();
        Ok(())
    }

    fn cancel(&self, id: ListenerId, token: TimerToken) {
        lock(&self.shared.state)
            .timers
            .retain(|timer| !(timer.listener == id && timer.token == token));
    }
}

fn wait<'a>(
    shared: &'a ClockShared,
    state: MutexGuard<'a, ClockState>,
    timeout: Option<Nanos>,
) -> MutexGuard<'a, ClockState> {
    match timeout {
        Some(nanos) => {
            let duration = Duration::from_nanos(nanos.max(0) as u64);
            match shared.wake.wait_timeout(state, duration) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            }
        }
        None => shared
            .wake
            .wait(state)
            .unwrap_or_else(std::sync::PoisonError::into_inner),
    }
}

fn run_event_thread(shared: &ClockShared) {
    let mut state = lock(&shared.state);
    loop {
        if state.stopped {
            break;
        }

        let now = shared.now();
        let next_vsync = state.vsync_deadline;
        let next_timer = state.timers.iter().map(|timer| timer.deadline).min();
        let deadline = match (next_vsync, next_timer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match deadline {
            None => {
                state = wait(shared, state, None);
                continue;
            }
            Some(deadline) if deadline > now => {
                state = wait(shared, state, Some(deadline - now));
                continue;
            }
            Some(_) => {}
        }

        let now = shared.now();
        let mut deliveries: SmallVec<[Delivery; 8]> = SmallVec::new();

        if let Some(timestamp) = next_vsync.filter(|vsync| *vsync <= now) {
            state.vsync_deadline = None;
            state.vsync_count = state.vsync_count.wrapping_add(1);
            let requests: Vec<ListenerId> = state.tick_requests.drain().collect();
            for id in requests {
                if let Some(listener) = state.listeners.get(&id) {
                    deliveries.push(Delivery::Vsync(id, Arc::clone(listener), timestamp));
                }
            }
        }

        let mut index = 0;
        while index < state.timers.len() {
            if state.timers[index].deadline <= now {
                let timer = state.timers.swap_remove(index);
                if let Some(listener) = state.listeners.get(&timer.listener) {
                    deliveries.push(Delivery::Timer(
                        timer.listener,
                        Arc::clone(listener),
                        timer.token,
                    ));
                }
            } else {
                index += 1;
            }
        }

        let vsync_count = state.vsync_count;
        drop(state);

        let mut gone: SmallVec<[ListenerId; 4]> = SmallVec::new();
        for delivery in deliveries {
            let (id, status) = match delivery {
                Delivery::Vsync(id, listener, timestamp) => {
                    let event = DisplayEvent::Vsync {
                        display_id: DisplayId::DEFAULT,
                        timestamp,
                        count: vsync_count,
                    };
                    (id, listener.on_display_events(&[event]))
                }
                Delivery::Timer(id, listener, token) => (id, listener.on_timer(token)),
            };
            if status == ListenerStatus::Deregister {
                gone.push(id);
            }
        }

        state = lock(&shared.state);
        for id in gone {
            tracing::debug!("ThreadedClock: listener {:?} deregistered", id);
            state.forget(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct ChannelListener {
        sender: Mutex<mpsc::Sender<&'static str>>,
    }

    impl ClockListener for ChannelListener {
        fn on_display_events(&self, _events: &[DisplayEvent]) -> ListenerStatus {
            let _ = self.sender.lock().unwrap().send("vsync");
            ListenerStatus::Keep
        }

        fn on_timer(&self, _token: TimerToken) -> ListenerStatus {
            let _ = self.sender.lock().unwrap().send("timer");
            ListenerStatus::Deregister
        }
    }

    #[test]
    fn test_threaded_clock_delivers_tick_and_timer() {
        let clock = ThreadedClock::new(240);
        let (sender, receiver) = mpsc::channel();
        let id = clock
            .register(Arc::new(ChannelListener {
                sender: Mutex::new(sender),
            }))
            .unwrap();

        clock.request_next_tick(id).unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(2)).unwrap(),
            "vsync"
        );

        clock.schedule_delayed(id, TimerToken(7), 1_000_000).unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(2)).unwrap(),
            "timer"
        );

        // The timer callback asked to be deregistered
        let deadline = Instant::now() + Duration::from_secs(2);
        while clock.request_next_tick(id).is_ok() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            clock.request_next_tick(id),
            Err(PlatformError::UnknownListener(id))
        );
    }

    #[test]
    fn test_stopped_clock_rejects_registration() {
        let mut clock = ThreadedClock::new(60);
        clock.stop();
        assert!(!clock.is_running());
        let (sender, _receiver) = mpsc::channel();
        let result = clock.register(Arc::new(ChannelListener {
            sender: Mutex::new(sender),
        }));
        assert_eq!(result.err(), Some(PlatformError::ClockStopped));
    }

    struct TickRecorder {
        sender: Mutex<mpsc::Sender<Nanos>>,
    }

    impl ClockListener for TickRecorder {
        fn on_display_events(&self, events: &[DisplayEvent]) -> ListenerStatus {
            for event in events {
                if let DisplayEvent::Vsync { timestamp, .. } = *event {
                    let _ = self.sender.lock().unwrap().send(timestamp);
                }
            }
            ListenerStatus::Keep
        }

        fn on_timer(&self, _token: TimerToken) -> ListenerStatus {
            ListenerStatus::Keep
        }
    }

    #[test]
    fn test_repeated_tick_requests_land_on_vsync_boundaries() {
        let clock = ThreadedClock::new(60);
        let period = clock.frame_period();
        let (sender, receiver) = mpsc::channel();
        let id = clock
            .register(Arc::new(TickRecorder {
                sender: Mutex::new(sender),
            }))
            .unwrap();

        let mut previous = -1;
        for _ in 0..5 {
            let requested_at = clock.now();
            clock.request_next_tick(id).unwrap();
            let timestamp = receiver.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(timestamp % period, 0);
            assert!(timestamp > requested_at);
            assert!(timestamp > previous);
            previous = timestamp;
        }

        // Nothing more arrives without another request
        assert!(receiver.recv_timeout(Duration::from_millis(100)).is_err());
    }

    struct ClockOwner {
        clock: Mutex<Option<Arc<ThreadedClock>>>,
        sender: Mutex<mpsc::Sender<&'static str>>,
    }

    impl ClockListener for ClockOwner {
        fn on_display_events(&self, _events: &[DisplayEvent]) -> ListenerStatus {
            ListenerStatus::Keep
        }

        fn on_timer(&self, _token: TimerToken) -> ListenerStatus {
            let last_handle = self.clock.lock().unwrap().take();
            drop(last_handle);
            let _ = self.sender.lock().unwrap().send("released");
            ListenerStatus::Deregister
        }
    }

    #[test]
    fn test_last_handle_dropped_on_event_thread() {
        let clock = Arc::new(ThreadedClock::new(60));
        let (sender, receiver) = mpsc::channel();
        let owner = Arc::new(ClockOwner {
            clock: Mutex::new(None),
            sender: Mutex::new(sender),
        });
        let id = clock.register(Arc::clone(&owner) as Arc<dyn ClockListener>).unwrap();

        // Hand the only strong handle to the listener
        let weak = Arc::downgrade(&clock);
        *owner.clock.lock().unwrap() = Some(clock);
        if let Some(clock) = weak.upgrade() {
            clock.schedule_delayed(id, TimerToken(1), 50_000_000).unwrap();
        }

        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(2)).unwrap(),
            "released"
        );
        assert!(weak.upgrade().is_none());
    }
}
