//! Pointer controller
//!
//! The public face of the crate. A [`PointerController`] owns the state
//! store and registers an [`EventBridge`](crate::bridge::EventBridge) with
//! the clock; every method takes the state lock for its whole duration and
//! pushes at most one frame to the render backend.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pointer_controller::{PointerController, Transition};
//! use pointer_platform::headless::{ManualClock, RecordingBackend, StaticResources};
//! use pointer_platform::{DisplayId, Viewport};
//!
//! let controller = PointerController::new(
//!     Arc::new(StaticResources::new()),
//!     Arc::new(ManualClock::new()),
//!     Arc::new(RecordingBackend::new()),
//! );
//! controller.set_display_viewport(Viewport::new(DisplayId::DEFAULT, 1080, 1920));
//! controller.move_by(12.0, -4.0);
//! controller.unfade(Transition::Immediate);
//! ```

use std::sync::Arc;

use pointer_platform::{
    Bounds, ButtonState, ClockSource, Contact, DisplayId, IconId, ListenerId, RenderBackend,
    ResourceProvider, SpriteIcon, Viewport,
};
use tracing::{debug, error};

use crate::bridge::EventBridge;
use crate::config::ControllerConfig;
use crate::inactivity::InactivityTimeout;
use crate::spots::SpotSnapshot;
use crate::state::{PointerState, Presentation, StateGuard, StateStore, Transition};

/// Renders and animates the pointer and touch spots
///
/// Safe to share between threads; the clock's event thread drives
/// animations through the same lock callers use.
pub struct PointerController {
    store: Arc<StateStore>,
}

impl PointerController {
    /// Create a controller with the default configuration
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        clock: Arc<dyn ClockSource>,
        backend: Arc<dyn RenderBackend>,
    ) -> Self {
        Self::with_config(provider, clock, backend, ControllerConfig::default())
    }

    /// Create a controller
    ///
    /// If the clock refuses the registration the controller still works,
    /// but gradual fades, spot fade-outs, animated icons and the
    /// inactivity timeout never progress.
    pub fn with_config(
        provider: Arc<dyn ResourceProvider>,
        clock: Arc<dyn ClockSource>,
        backend: Arc<dyn RenderBackend>,
        config: ControllerConfig,
    ) -> Self {
        let store = Arc::new(StateStore::new(provider, clock, backend, config));

        let bridge = Arc::new(EventBridge::new(Arc::downgrade(&store)));
        match store.ctx.clock.register(bridge) {
            Ok(id) => {
                debug!("PointerController: registered with clock as {}", id.0);
                let _ = store.ctx.listener.set(id);
            }
            Err(err) => {
                error!("PointerController: failed to register with clock, animations disabled: {err}");
            }
        }

        Self { store }
    }

    fn lock(&self) -> StateGuard<'_> {
        self.store.lock()
    }

    /// Move the pointer by a delta, clamped to the display bounds
    pub fn move_by(&self, dx: f32, dy: f32) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        let mut guard = self.lock();
        let (x, y) = (guard.state.pointer.x, guard.state.pointer.y);
        guard.set_position(x + dx, y + dy);
    }

    /// Place the pointer, clamped to the display bounds
    pub fn set_position(&self, x: f32, y: f32) {
        self.lock().set_position(x, y);
    }

    pub fn position(&self) -> (f32, f32) {
        let guard = self.lock();
        (guard.state.pointer.x, guard.state.pointer.y)
    }

    /// Store the pressed mouse buttons
    pub fn set_button_state(&self, button_state: ButtonState) {
        let mut guard = self.lock();
        guard.state.button_state = button_state;
    }

    pub fn button_state(&self) -> ButtonState {
        self.lock().state.button_state
    }

    /// Hide the pointer
    pub fn fade(&self, transition: Transition) {
        self.lock().fade(transition);
    }

    /// Show the pointer and restart the inactivity timeout
    pub fn unfade(&self, transition: Transition) {
        self.lock().unfade(transition);
    }

    /// Switch between mouse cursor and touch spot presentation
    pub fn set_presentation(&self, presentation: Presentation) {
        let mut guard = self.lock();
        if guard.state.pointer.presentation == presentation {
            return;
        }
        guard.state.pointer.presentation = presentation;
        guard.state.presentation_changed = true;

        if presentation == Presentation::Pointer {
            let ctx = guard.ctx;
            let state = &mut *guard.state;
            if state.mouse.is_empty() && state.viewport.is_valid() {
                state.mouse = ctx
                    .provider
                    .load_additional_mouse_resources(state.viewport.display_id);
            }
            guard.fade_out_all_spots();
        }

        guard.update_pointer();
    }

    /// Show one spot per contact on `display_id`; spots of lifted contacts
    /// fade out
    pub fn set_spots(&self, contacts: &[Contact], display_id: DisplayId) {
        self.lock().set_spots(contacts, display_id);
    }

    /// Fade out every spot on every display
    pub fn clear_spots(&self) {
        let mut guard = self.lock();
        if !guard.state.viewport.is_valid() {
            return;
        }
        guard.fade_out_all_spots();
    }

    pub fn set_inactivity_timeout(&self, timeout: InactivityTimeout) {
        let mut guard = self.lock();
        if guard.state.inactivity.set_timeout(timeout) {
            guard.reset_inactivity_timeout();
        }
    }

    /// Move to a new display geometry, carrying the pointer across
    pub fn set_display_viewport(&self, viewport: Viewport) {
        self.lock().apply_viewport(viewport);
    }

    /// Select the pointer icon
    ///
    /// Unknown ids fall back to the default pointer icon.
    pub fn update_pointer_icon(&self, icon_id: IconId) {
        let mut guard = self.lock();
        if guard.state.pointer.requested_icon == icon_id {
            return;
        }
        guard.state.pointer.requested_icon = icon_id;
        guard.state.icon_changed = true;
        guard.update_pointer();
    }

    /// Install and select an application-supplied pointer icon
    pub fn set_custom_pointer_icon(&self, icon: SpriteIcon) {
        let mut guard = self.lock();
        let icon_id = guard.ctx.provider.custom_pointer_icon_id();
        let state = &mut *guard.state;
        state.mouse.animations.remove(&icon_id);
        state.mouse.icons.insert(icon_id, icon);
        state.pointer.requested_icon = icon_id;
        state.icon_changed = true;
        guard.update_pointer();
    }

    /// Reload icons for the current display, e.g. after a density change
    pub fn reload_pointer_resources(&self) {
        let mut guard = self.lock();
        guard.load_resources();
        guard.update_pointer();
    }

    /// Pointer bounds, or `None` without a valid viewport
    pub fn bounds(&self) -> Option<Bounds> {
        self.lock().state.viewport.bounds()
    }

    pub fn display_id(&self) -> DisplayId {
        self.lock().state.viewport.display_id
    }

    /// Snapshot of the pointer state
    pub fn pointer_state(&self) -> PointerState {
        self.lock().state.pointer.clone()
    }

    pub fn presentation(&self) -> Presentation {
        self.lock().state.pointer.presentation
    }

    pub fn inactivity_timeout(&self) -> InactivityTimeout {
        self.lock().state.inactivity.timeout()
    }

    /// Spots on `display_id`, oldest first
    pub fn spots(&self, display_id: DisplayId) -> Vec<SpotSnapshot> {
        self.lock().state.spots.spots(display_id)
    }

    /// Spots on `display_id`, fading ones included
    pub fn spot_count(&self, display_id: DisplayId) -> usize {
        self.lock().state.spots.live_count(display_id)
    }

    pub fn recycled_sprite_count(&self) -> usize {
        self.lock().state.spots.recycled_count()
    }

    /// Whether an inactivity timeout is scheduled
    pub fn is_inactivity_timeout_pending(&self) -> bool {
        self.lock().state.inactivity.pending().is_some()
    }

    /// Whether a tick is outstanding
    pub fn is_animation_pending(&self) -> bool {
        self.lock().state.scheduler.is_pending()
    }

    /// The clock registration; `None` when running degraded
    pub fn listener_id(&self) -> Option<ListenerId> {
        self.store.ctx.listener()
    }
}

impl Drop for PointerController {
    fn drop(&mut self) {
        self.lock().teardown();
        if let Some(id) = self.store.ctx.listener() {
            self.store.ctx.clock.unregister(id);
        }
    }
}
