//! State store
//!
//! All pointer and spot state lives in one [`Locked`] aggregate behind a
//! single mutex. Every operation, whether it comes from a caller thread or
//! from the clock's event thread, goes through a [`StateGuard`], which holds
//! the lock for its whole lifetime and releases it on every exit path.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use pointer_platform::{
    ButtonState, ClockSource, IconId, ListenerId, MouseResources, Nanos, RenderBackend,
    ResourceProvider, Sprite, SpotIcons, SpriteIcon, Viewport, BASE_LAYER_POINTER,
};
use tracing::{debug, warn};

use crate::config::ControllerConfig;
use crate::inactivity::InactivityTimer;
use crate::scheduler::AnimationScheduler;
use crate::spots::SpotPool;

/// What the pointer sprite shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Presentation {
    /// A mouse cursor using the requested pointer icon
    #[default]
    Pointer,
    /// Touch spots only; the pointer sprite shows the spot anchor
    Spot,
}

/// How a fade is applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Jump to the final alpha right away
    Immediate,
    /// Animate over the configured fade duration
    Gradual,
}

/// Direction the pointer alpha is animating in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FadeDirection {
    /// Alpha decreasing toward 0
    Out,
    /// Not animating
    #[default]
    Idle,
    /// Alpha increasing toward 1
    In,
}

impl FadeDirection {
    /// -1, 0 or +1
    pub fn signum(self) -> i8 {
        match self {
            FadeDirection::Out => -1,
            FadeDirection::Idle => 0,
            FadeDirection::In => 1,
        }
    }
}

/// Snapshot of the pointer
#[derive(Clone, Debug, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    /// Always within [0, 1]
    pub alpha: f32,
    pub fade: FadeDirection,
    pub requested_icon: IconId,
    pub presentation: Presentation,
    /// Current frame of an animated icon
    pub frame_index: usize,
    /// When `frame_index` last advanced
    pub last_frame_time: Nanos,
}

/// Icons for the current display
#[derive(Clone, Debug)]
pub(crate) struct ResourceSet {
    pub pointer: SpriteIcon,
    pub spot: SpotIcons,
}

/// The collaborators and settings shared by every lock holder
pub(crate) struct Collaborators {
    pub backend: Arc<dyn RenderBackend>,
    pub provider: Arc<dyn ResourceProvider>,
    pub clock: Arc<dyn ClockSource>,
    /// Set once the event bridge is registered; empty in degraded mode
    pub listener: OnceLock<ListenerId>,
    pub config: ControllerConfig,
}

impl Collaborators {
    pub fn listener(&self) -> Option<ListenerId> {
        self.listener.get().copied()
    }
}

/// Everything guarded by the state mutex
pub(crate) struct Locked {
    pub pointer: PointerState,
    pub viewport: Viewport,
    pub button_state: ButtonState,
    pub resources: Option<ResourceSet>,
    pub mouse: MouseResources,
    pub icon_changed: bool,
    pub presentation_changed: bool,
    /// `None` once torn down
    pub pointer_sprite: Option<Box<dyn Sprite>>,
    pub spots: SpotPool,
    pub scheduler: AnimationScheduler,
    pub inactivity: InactivityTimer,
    pub torn_down: bool,
}

/// The single mutex-guarded aggregate
pub(crate) struct StateStore {
    locked: Mutex<Locked>,
    pub ctx: Collaborators,
}

impl StateStore {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        clock: Arc<dyn ClockSource>,
        backend: Arc<dyn RenderBackend>,
        config: ControllerConfig,
    ) -> Self {
        let pointer = PointerState {
            x: 0.0,
            y: 0.0,
            // The pointer starts out faded
            alpha: 0.0,
            fade: FadeDirection::Idle,
            requested_icon: provider.default_pointer_icon_id(),
            presentation: Presentation::Pointer,
            frame_index: 0,
            last_frame_time: 0,
        };
        let spots = SpotPool::new(
            config.spots.max_spots,
            config.spots.max_recycled_sprites,
            config.spots.scale,
        );
        let locked = Locked {
            pointer,
            viewport: Viewport::default(),
            button_state: ButtonState::NONE,
            resources: None,
            mouse: MouseResources::default(),
            icon_changed: false,
            presentation_changed: false,
            pointer_sprite: Some(backend.create_sprite()),
            spots,
            scheduler: AnimationScheduler::new(),
            inactivity: InactivityTimer::new(),
            torn_down: false,
        };

        Self {
            locked: Mutex::new(locked),
            ctx: Collaborators {
                backend,
                provider,
                clock,
                listener: OnceLock::new(),
                config,
            },
        }
    }

    /// Acquire the state lock
    ///
    /// A panic on another thread while holding the lock leaves the state as
    /// it was at the panic; it is still internally consistent per field, so
    /// the poison flag is ignored rather than propagated to callers.
    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            state: self.locked.lock().unwrap_or_else(PoisonError::into_inner),
            ctx: &self.ctx,
        }
    }
}

/// Scoped access to the locked state
pub(crate) struct StateGuard<'a> {
    pub state: MutexGuard<'a, Locked>,
    pub ctx: &'a Collaborators,
}

/// A backend transaction, closed on drop
pub(crate) struct Transaction<'a> {
    backend: &'a dyn RenderBackend,
}

impl<'a> Transaction<'a> {
    pub fn open(backend: &'a dyn RenderBackend) -> Self {
        backend.open_transaction();
        Self { backend }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.backend.close_transaction();
    }
}

impl StateGuard<'_> {
    pub fn is_torn_down(&self) -> bool {
        self.state.torn_down
    }

    /// Clamp and store a new pointer position, then push a frame
    ///
    /// No-op without a valid viewport.
    pub fn set_position(&mut self, x: f32, y: f32) {
        let Some(bounds) = self.state.viewport.bounds() else {
            return;
        };
        let (x, y) = bounds.clamp(x, y);
        self.state.pointer.x = x;
        self.state.pointer.y = y;
        self.update_pointer();
    }

    /// Arm the animation scheduler
    pub fn start_animation(&mut self) {
        let clock = &*self.ctx.clock;
        self.state.scheduler.start(clock, self.ctx.listener());
    }

    /// Turn every live spot into a fading one, arming the scheduler if any
    /// spot started fading
    pub fn fade_out_all_spots(&mut self) {
        if self.state.spots.fade_all() {
            self.start_animation();
        }
    }

    /// Fade the pointer out and drop any pending inactivity timeout
    pub fn fade(&mut self, transition: Transition) {
        self.remove_inactivity_timeout();
        match transition {
            Transition::Immediate => {
                self.state.pointer.fade = FadeDirection::Idle;
                self.state.pointer.alpha = 0.0;
                self.update_pointer();
            }
            Transition::Gradual => {
                self.state.pointer.fade = FadeDirection::Out;
                self.start_animation();
            }
        }
    }

    /// Fade the pointer in and restart the inactivity timeout
    pub fn unfade(&mut self, transition: Transition) {
        self.reset_inactivity_timeout();
        match transition {
            Transition::Immediate => {
                self.state.pointer.fade = FadeDirection::Idle;
                self.state.pointer.alpha = 1.0;
                self.update_pointer();
            }
            Transition::Gradual => {
                self.state.pointer.fade = FadeDirection::In;
                self.start_animation();
            }
        }
    }

    /// Reload icons for the current display
    pub fn load_resources(&mut self) {
        let state = &mut *self.state;
        if !state.viewport.is_valid() {
            return;
        }
        let provider = &*self.ctx.provider;
        let display_id = state.viewport.display_id;

        state.resources = Some(ResourceSet {
            pointer: provider.load_pointer_icon(display_id),
            spot: provider.load_pointer_resources(display_id),
        });

        state.mouse.clear();
        if state.pointer.presentation == Presentation::Pointer {
            state.mouse = provider.load_additional_mouse_resources(display_id);
        }

        state.icon_changed = true;
    }

    /// Push the pointer sprite's state to the backend in one transaction
    pub fn update_pointer(&mut self) {
        let state = &mut *self.state;
        if !state.viewport.is_valid() {
            return;
        }
        let Some(sprite) = state.pointer_sprite.as_mut() else {
            return;
        };

        let pointer = &mut state.pointer;
        debug!(
            "PointerController: update pointer x={:.3} y={:.3} alpha={:.3}",
            pointer.x, pointer.y, pointer.alpha
        );

        let mut animate_icon = false;
        {
            let _transaction = Transaction::open(&*self.ctx.backend);

            sprite.set_layer(BASE_LAYER_POINTER);
            sprite.set_position(pointer.x, pointer.y);
            sprite.set_display_id(state.viewport.display_id);

            if pointer.alpha > 0.0 {
                sprite.set_alpha(pointer.alpha);
                sprite.set_visible(true);
            } else {
                sprite.set_visible(false);
            }

            if state.icon_changed || state.presentation_changed {
                match pointer.presentation {
                    Presentation::Pointer => {
                        let requested = pointer.requested_icon;
                        if requested == self.ctx.provider.default_pointer_icon_id() {
                            if let Some(resources) = &state.resources {
                                sprite.set_icon(&resources.pointer);
                            }
                        } else if let Some(icon) = state.mouse.icons.get(&requested) {
                            if state.mouse.animations.contains_key(&requested) {
                                pointer.frame_index = 0;
                                pointer.last_frame_time = self.ctx.clock.now();
                                animate_icon = true;
                            }
                            sprite.set_icon(icon);
                        } else {
                            warn!(
                                "PointerController: can't find the resource for icon id {}",
                                requested.0
                            );
                            if let Some(resources) = &state.resources {
                                sprite.set_icon(&resources.pointer);
                            }
                        }
                    }
                    Presentation::Spot => {
                        if let Some(resources) = &state.resources {
                            sprite.set_icon(&resources.spot.anchor);
                        }
                    }
                }
                state.icon_changed = false;
                state.presentation_changed = false;
            }
        }

        if animate_icon {
            self.start_animation();
        }
    }

    /// Release every sprite and outstanding registration
    ///
    /// After this, the guard's state is inert: all entry points check
    /// [`StateGuard::is_torn_down`] before touching it.
    pub fn teardown(&mut self) {
        let listener = self.ctx.listener();
        let clock = &*self.ctx.clock;
        let state = &mut *self.state;

        state.inactivity.cancel(clock, listener);
        state.scheduler.reset();
        state.pointer_sprite = None;
        state.spots.release_all();
        state.mouse.clear();
        state.resources = None;
        state.torn_down = true;
    }
}
