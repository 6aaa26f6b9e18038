//! Headless collaborators
//!
//! In-memory implementations of [`RenderBackend`], [`ClockSource`] and
//! [`ResourceProvider`] that record what the controller does. They drive the
//! controller's tests and the `pointerctl` demo, and are useful anywhere a
//! real display is not available.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::clock::{
    ClockListener, ClockSource, DisplayEvent, ListenerId, ListenerStatus, Nanos, TimerToken,
};
use crate::display::DisplayId;
use crate::error::{PlatformError, Result};
use crate::resources::{AnimationResource, IconId, MouseResources, ResourceProvider, SpotIcons};
use crate::sprite::{
    Bitmap, RenderBackend, Sprite, SpriteIcon, SpriteTransform, BASE_LAYER_POINTER,
    BASE_LAYER_SPOT,
};
use crate::sync::lock;

// ============================================================================
// Recording render backend
// ============================================================================

new_key_type! {
    /// Key of a sprite created by a [`RecordingBackend`]
    pub struct SpriteKey;
}

/// Last state written to a recorded sprite
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteRecord {
    pub layer: i32,
    pub x: f32,
    pub y: f32,
    pub alpha: f32,
    pub visible: bool,
    pub icon: Option<SpriteIcon>,
    pub display_id: DisplayId,
    pub transform: SpriteTransform,
}

impl Default for SpriteRecord {
    fn default() -> Self {
        Self {
            layer: 0,
            x: 0.0,
            y: 0.0,
            alpha: 1.0,
            visible: false,
            icon: None,
            display_id: DisplayId::NONE,
            transform: SpriteTransform::IDENTITY,
        }
    }
}

impl SpriteRecord {
    /// Whether the sprite would actually put pixels on screen
    pub fn is_drawn(&self) -> bool {
        self.visible && self.alpha > 0.0 && self.icon.is_some()
    }

    pub fn is_spot(&self) -> bool {
        (BASE_LAYER_SPOT..BASE_LAYER_POINTER).contains(&self.layer)
    }
}

#[derive(Default)]
struct RecordingInner {
    sprites: SlotMap<SpriteKey, SpriteRecord>,
    created: usize,
    released: usize,
    depth: u32,
    frames: usize,
    mutations: usize,
    mutations_outside: usize,
}

/// A [`RenderBackend`] that keeps every sprite's state in memory
#[derive(Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Mutex<RecordingInner>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sprites currently alive (created and not yet dropped)
    pub fn sprite_count(&self) -> usize {
        lock(&self.inner).sprites.len()
    }

    /// Total sprites ever allocated
    pub fn created_count(&self) -> usize {
        lock(&self.inner).created
    }

    /// Total sprites dropped by their owner
    pub fn released_count(&self) -> usize {
        lock(&self.inner).released
    }

    /// Number of outermost transactions closed so far
    pub fn frames_committed(&self) -> usize {
        lock(&self.inner).frames
    }

    /// Total sprite mutations
    pub fn mutation_count(&self) -> usize {
        lock(&self.inner).mutations
    }

    /// Sprite mutations made while no transaction was open
    pub fn mutations_outside_transaction(&self) -> usize {
        lock(&self.inner).mutations_outside
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> bool {
        lock(&self.inner).depth > 0
    }

    pub fn sprite(&self, key: SpriteKey) -> Option<SpriteRecord> {
        lock(&self.inner).sprites.get(key).cloned()
    }

    /// The pointer sprite, if one has been placed on the pointer layer
    pub fn pointer(&self) -> Option<SpriteRecord> {
        lock(&self.inner)
            .sprites
            .values()
            .find(|record| record.layer == BASE_LAYER_POINTER)
            .cloned()
    }

    /// Spot sprites that currently carry an icon, ordered by layer
    pub fn spots(&self) -> Vec<SpriteRecord> {
        let mut spots: Vec<SpriteRecord> = lock(&self.inner)
            .sprites
            .values()
            .filter(|record| record.is_spot() && record.icon.is_some())
            .cloned()
            .collect();
        spots.sort_by_key(|record| record.layer);
        spots
    }
}

impl RenderBackend for RecordingBackend {
    fn create_sprite(&self) -> Box<dyn Sprite> {
        let mut inner = lock(&self.inner);
        inner.created += 1;
        let key = inner.sprites.insert(SpriteRecord::default());
        Box::new(RecordedSprite {
            key,
            inner: Arc::clone(&self.inner),
        })
    }

    fn open_transaction(&self) {
        lock(&self.inner).depth += 1;
    }

    fn close_transaction(&self) {
        let mut inner = lock(&self.inner);
        match inner.depth {
            0 => tracing::warn!("RecordingBackend: close_transaction without open"),
            1 => {
                inner.depth = 0;
                inner.frames += 1;
            }
            _ => inner.depth -= 1,
        }
    }
}

struct RecordedSprite {
    key: SpriteKey,
    inner: Arc<Mutex<RecordingInner>>,
}

impl RecordedSprite {
    fn update(&mut self, f: impl FnOnce(&mut SpriteRecord)) {
        let mut inner = lock(&self.inner);
        inner.mutations += 1;
        if inner.depth == 0 {
            inner.mutations_outside += 1;
        }
        if let Some(record) = inner.sprites.get_mut(self.key) {
            f(record);
        }
    }
}

impl Sprite for RecordedSprite {
    fn set_layer(&mut self, layer: i32) {
        self.update(|r| r.layer = layer);
    }

    fn set_position(&mut self, x: f32, y: f32) {
        self.update(|r| {
            r.x = x;
            r.y = y;
        });
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.update(|r| r.alpha = alpha);
    }

    fn set_visible(&mut self, visible: bool) {
        self.update(|r| r.visible = visible);
    }

    fn set_icon(&mut self, icon: &SpriteIcon) {
        let icon = icon.clone();
        self.update(|r| r.icon = Some(icon));
    }

    fn clear_icon(&mut self) {
        self.update(|r| r.icon = None);
    }

    fn set_display_id(&mut self, display_id: DisplayId) {
        self.update(|r| r.display_id = display_id);
    }

    fn set_transform(&mut self, transform: SpriteTransform) {
        self.update(|r| r.transform = transform);
    }
}

impl Drop for RecordedSprite {
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        if inner.sprites.remove(self.key).is_some() {
            inner.released += 1;
        }
    }
}

// ============================================================================
// Manual clock
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingTimer {
    listener: ListenerId,
    token: TimerToken,
    deadline: Nanos,
}

#[derive(Default)]
struct ManualInner {
    now: Nanos,
    unavailable: bool,
    next_id: u64,
    listeners: FxHashMap<ListenerId, Arc<dyn ClockListener>>,
    tick_requests: Vec<ListenerId>,
    tick_request_total: usize,
    timers: Vec<PendingTimer>,
}

impl ManualInner {
    fn forget(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
        self.tick_requests.retain(|other| *other != id);
        self.timers.retain(|timer| timer.listener != id);
    }
}

/// A [`ClockSource`] that only moves when told to
///
/// Nothing is delivered until the owner calls [`ManualClock::vsync`],
/// [`ManualClock::vsync_burst`] or [`ManualClock::advance`], which makes
/// animation and timer behavior fully deterministic.
#[derive(Default)]
pub struct ManualClock {
    inner: Mutex<ManualInner>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock whose display event connection cannot be opened
    pub fn unavailable() -> Self {
        let clock = Self::default();
        lock(&clock.inner).unavailable = true;
        clock
    }

    pub fn set_now(&self, now: Nanos) {
        lock(&self.inner).now = now;
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// Whether `id` is still registered
    pub fn is_registered(&self, id: ListenerId) -> bool {
        lock(&self.inner).listeners.contains_key(&id)
    }

    /// Listeners waiting for a vsync
    pub fn pending_tick_requests(&self) -> usize {
        lock(&self.inner).tick_requests.len()
    }

    /// Every accepted `request_next_tick` call, including collapsed ones
    pub fn tick_request_total(&self) -> usize {
        lock(&self.inner).tick_request_total
    }

    /// Outstanding timers as `(token, deadline)`, earliest first
    pub fn pending_timers(&self) -> Vec<(TimerToken, Nanos)> {
        let mut timers: Vec<(TimerToken, Nanos)> = lock(&self.inner)
            .timers
            .iter()
            .map(|timer| (timer.token, timer.deadline))
            .collect();
        timers.sort_by_key(|(_, deadline)| *deadline);
        timers
    }

    /// Deliver one vsync at `timestamp` to every listener waiting for a tick
    ///
    /// Returns the number of listeners called.
    pub fn vsync(&self, timestamp: Nanos) -> usize {
        self.vsync_burst(&[timestamp])
    }

    /// Deliver several queued vsync events in one callback, as happens when
    /// the event thread falls behind
    pub fn vsync_burst(&self, timestamps: &[Nanos]) -> usize {
        let Some(&last) = timestamps.last() else {
            return 0;
        };
        let events: Vec<DisplayEvent> = timestamps
            .iter()
            .enumerate()
            .map(|(index, &timestamp)| DisplayEvent::Vsync {
                display_id: DisplayId::DEFAULT,
                timestamp,
                count: index as u32 + 1,
            })
            .collect();

        let targets: Vec<(ListenerId, Arc<dyn ClockListener>)> = {
            let mut inner = lock(&self.inner);
            inner.now = inner.now.max(last);
            let requests = std::mem::take(&mut inner.tick_requests);
            requests
                .into_iter()
                .filter_map(|id| inner.listeners.get(&id).map(|l| (id, Arc::clone(l))))
                .collect()
        };

        let delivered = targets.len();
        for (id, listener) in targets {
            if listener.on_display_events(&events) == ListenerStatus::Deregister {
                lock(&self.inner).forget(id);
            }
        }
        delivered
    }

    /// Deliver display events (e.g. a hotplug) to every registered listener,
    /// whether or not it asked for a tick
    pub fn broadcast(&self, events: &[DisplayEvent]) -> usize {
        let targets: Vec<(ListenerId, Arc<dyn ClockListener>)> = lock(&self.inner)
            .listeners
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();
        let delivered = targets.len();
        for (id, listener) in targets {
            if listener.on_display_events(events) == ListenerStatus::Deregister {
                lock(&self.inner).forget(id);
            }
        }
        delivered
    }

    /// Move time forward by `delta`, firing due timers in deadline order
    ///
    /// Returns the number of timers fired.
    pub fn advance(&self, delta: Nanos) -> usize {
        let target = lock(&self.inner).now + delta;
        let mut fired = 0;
        loop {
            let due = {
                let mut inner = lock(&self.inner);
                let next = inner
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.deadline <= target)
                    .min_by_key(|(_, timer)| timer.deadline)
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let timer = inner.timers.remove(index);
                        inner.now = inner.now.max(timer.deadline);
                        inner
                            .listeners
                            .get(&timer.listener)
                            .map(|l| (timer, Arc::clone(l)))
                    }
                    None => {
                        inner.now = target;
                        break;
                    }
                }
            };
            if let Some((timer, listener)) = due {
                fired += 1;
                if listener.on_timer(timer.token) == ListenerStatus::Deregister {
                    lock(&self.inner).forget(timer.listener);
                }
            }
        }
        fired
    }

    /// Keep delivering vsyncs `frame` apart until nobody asks for another
    /// tick, or `max_frames` have been delivered
    pub fn run_frames(&self, frame: Nanos, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.pending_tick_requests() > 0 {
            let timestamp = lock(&self.inner).now + frame;
            self.vsync(timestamp);
            frames += 1;
        }
        frames
    }

    /// Simulate the event connection breaking
    pub fn fail_connection(&self) {
        let targets: Vec<(ListenerId, Arc<dyn ClockListener>)> = lock(&self.inner)
            .listeners
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();
        for (id, listener) in targets {
            if listener.on_error() == ListenerStatus::Deregister {
                lock(&self.inner).forget(id);
            }
        }
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Nanos {
        lock(&self.inner).now
    }

    fn register(&self, listener: Arc<dyn ClockListener>) -> Result<ListenerId> {
        let mut inner = lock(&self.inner);
        if inner.unavailable {
            return Err(PlatformError::ClockUnavailable(
                "manual clock built without a display connection".to_string(),
            ));
        }
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.listeners.insert(id, listener);
        Ok(id)
    }

    fn unregister(&self, id: ListenerId) {
        lock(&self.inner).forget(id);
    }

    fn request_next_tick(&self, id: ListenerId) -> Result<()> {
        let mut inner = lock(&self.inner);
        if !inner.listeners.contains_key(&id) {
            return Err(PlatformError::UnknownListener(id));
        }
        inner.tick_request_total += 1;
        if !inner.tick_requests.contains(&id) {
            inner.tick_requests.push(id);
        }
        Ok(())
    }

    fn schedule_delayed(&self, id: ListenerId, token: TimerToken, delay: Nanos) -> Result<()> {
        let mut inner = lock(&self.inner);
        if !inner.listeners.contains_key(&id) {
            return Err(PlatformError::UnknownListener(id));
        }
        let deadline = inner.now + delay.max(0);
        inner.timers.push(PendingTimer {
            listener: id,
            token,
            deadline,
        });
        Ok(())
    }

    fn cancel(&self, id: ListenerId, token: TimerToken) {
        lock(&self.inner)
            .timers
            .retain(|timer| !(timer.listener == id && timer.token == token));
    }
}

// ============================================================================
// Static resources
// ============================================================================

/// A [`ResourceProvider`] serving a fixed set of in-memory icons
pub struct StaticResources {
    default_icon_id: IconId,
    custom_icon_id: IconId,
    pointer: SpriteIcon,
    spots: SpotIcons,
    extra: MouseResources,
    pointer_loads: AtomicUsize,
    mouse_loads: AtomicUsize,
}

impl StaticResources {
    /// Solid-color icons: white pointer, blue hover, red touch, green anchor
    pub fn new() -> Self {
        Self {
            default_icon_id: IconId::ARROW,
            custom_icon_id: IconId::CUSTOM,
            pointer: Self::icon([255, 255, 255, 255]),
            spots: SpotIcons {
                hover: Self::icon([0, 0, 255, 255]),
                touch: Self::icon([255, 0, 0, 255]),
                anchor: Self::icon([0, 255, 0, 255]),
            },
            extra: MouseResources::default(),
            pointer_loads: AtomicUsize::new(0),
            mouse_loads: AtomicUsize::new(0),
        }
    }

    /// A 16x16 solid icon with its hot spot in the top-left corner
    pub fn icon(rgba: [u8; 4]) -> SpriteIcon {
        SpriteIcon::new(Bitmap::solid(16, 16, rgba), 0.0, 0.0)
    }

    /// Serve `icon` for `id` from `load_additional_mouse_resources`
    pub fn with_icon(mut self, id: IconId, icon: SpriteIcon) -> Self {
        self.extra.icons.insert(id, icon);
        self
    }

    /// Serve an animated icon; the first frame doubles as the static icon
    pub fn with_animation(mut self, id: IconId, animation: AnimationResource) -> Self {
        if let Some(first) = animation.frames.first() {
            self.extra.icons.insert(id, first.clone());
        }
        self.extra.animations.insert(id, animation);
        self
    }

    pub fn pointer_icon(&self) -> &SpriteIcon {
        &self.pointer
    }

    pub fn spot_icons(&self) -> &SpotIcons {
        &self.spots
    }

    /// How many times the per-display resource set was loaded
    pub fn pointer_load_count(&self) -> usize {
        self.pointer_loads.load(Ordering::Relaxed)
    }

    /// How many times additional mouse resources were loaded
    pub fn mouse_load_count(&self) -> usize {
        self.mouse_loads.load(Ordering::Relaxed)
    }
}

impl Default for StaticResources {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProvider for StaticResources {
    fn default_pointer_icon_id(&self) -> IconId {
        self.default_icon_id
    }

    fn custom_pointer_icon_id(&self) -> IconId {
        self.custom_icon_id
    }

    fn load_pointer_resources(&self, _display_id: DisplayId) -> SpotIcons {
        self.pointer_loads.fetch_add(1, Ordering::Relaxed);
        self.spots.clone()
    }

    fn load_pointer_icon(&self, _display_id: DisplayId) -> SpriteIcon {
        self.pointer.clone()
    }

    fn load_additional_mouse_resources(&self, _display_id: DisplayId) -> MouseResources {
        self.mouse_loads.fetch_add(1, Ordering::Relaxed);
        self.extra.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingListener {
        ticks: Mutex<Vec<Nanos>>,
        timers: Mutex<Vec<TimerToken>>,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                ticks: Mutex::new(Vec::new()),
                timers: Mutex::new(Vec::new()),
            })
        }
    }

    impl ClockListener for CountingListener {
        fn on_display_events(&self, events: &[DisplayEvent]) -> ListenerStatus {
            for event in events {
                if let DisplayEvent::Vsync { timestamp, .. } = event {
                    self.ticks.lock().unwrap().push(*timestamp);
                }
            }
            ListenerStatus::Keep
        }

        fn on_timer(&self, token: TimerToken) -> ListenerStatus {
            self.timers.lock().unwrap().push(token);
            ListenerStatus::Keep
        }
    }

    #[test]
    fn test_recording_backend_tracks_transactions() {
        let backend = RecordingBackend::new();
        let mut sprite = backend.create_sprite();

        sprite.set_alpha(0.5);
        assert_eq!(backend.mutations_outside_transaction(), 1);

        backend.open_transaction();
        backend.open_transaction();
        sprite.set_layer(BASE_LAYER_POINTER);
        backend.close_transaction();
        assert_eq!(backend.frames_committed(), 0);
        backend.close_transaction();
        assert_eq!(backend.frames_committed(), 1);
        assert_eq!(backend.mutations_outside_transaction(), 1);

        assert_eq!(backend.pointer().unwrap().alpha, 0.5);
        drop(sprite);
        assert_eq!(backend.sprite_count(), 0);
        assert_eq!(backend.released_count(), 1);
    }

    #[test]
    fn test_manual_clock_ticks_only_on_request() {
        let clock = ManualClock::new();
        let listener = CountingListener::new();
        let id = clock.register(listener.clone()).unwrap();

        assert_eq!(clock.vsync(10), 0);
        clock.request_next_tick(id).unwrap();
        clock.request_next_tick(id).unwrap();
        assert_eq!(clock.pending_tick_requests(), 1);
        assert_eq!(clock.vsync(20), 1);
        assert_eq!(*listener.ticks.lock().unwrap(), vec![20]);
        assert_eq!(clock.vsync(30), 0);
    }

    #[test]
    fn test_manual_clock_fires_timers_in_order() {
        let clock = ManualClock::new();
        let listener = CountingListener::new();
        let id = clock.register(listener.clone()).unwrap();

        clock.schedule_delayed(id, TimerToken(2), 200).unwrap();
        clock.schedule_delayed(id, TimerToken(1), 100).unwrap();
        clock.schedule_delayed(id, TimerToken(3), 300).unwrap();
        clock.cancel(id, TimerToken(3));

        assert_eq!(clock.advance(250), 2);
        assert_eq!(
            *listener.timers.lock().unwrap(),
            vec![TimerToken(1), TimerToken(2)]
        );
        assert_eq!(clock.now(), 250);
        assert!(clock.pending_timers().is_empty());
    }

    #[test]
    fn test_unavailable_clock_refuses_registration() {
        let clock = ManualClock::unavailable();
        let listener = CountingListener::new();
        assert!(matches!(
            clock.register(listener),
            Err(PlatformError::ClockUnavailable(_))
        ));
    }
}
