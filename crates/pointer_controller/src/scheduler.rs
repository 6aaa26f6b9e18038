//! Animation scheduler
//!
//! Drives pointer fades, spot fade-outs and animated pointer icons from the
//! clock's vsync ticks. The scheduler is a two-state machine:
//!
//! - **idle** - no tick requested
//! - **pending** - exactly one tick requested from the clock
//!
//! [`AnimationScheduler::start`] moves idle to pending and asks the clock for
//! one tick; while pending it does nothing, so at most one tick request is
//! ever outstanding. When the tick arrives the scheduler goes back to idle,
//! runs every animation step, and re-arms itself if any step wants another
//! frame.

use pointer_platform::{ClockSource, ListenerId, Nanos};
use tracing::{debug, warn};

use crate::state::{FadeDirection, Presentation, StateGuard, Transaction};

/// Tick bookkeeping; lives inside the locked state
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    pending: bool,
    /// Time the outstanding tick was requested at
    reference_time: Nanos,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tick is outstanding
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Request one tick unless one is already outstanding
    ///
    /// Without a listener (the clock refused registration) the scheduler
    /// parks in `pending` and animations never progress.
    pub fn start(&mut self, clock: &dyn ClockSource, listener: Option<ListenerId>) {
        if self.pending {
            return;
        }
        self.pending = true;
        self.reference_time = clock.now();

        if let Some(id) = listener {
            if let Err(err) = clock.request_next_tick(id) {
                warn!("AnimationScheduler: failed to request next tick: {err}");
                self.pending = false;
            }
        }
    }

    /// Consume the outstanding tick, returning the time elapsed since it was
    /// requested
    pub fn begin_tick(&mut self, timestamp: Nanos) -> Nanos {
        self.pending = false;
        (timestamp - self.reference_time).max(0)
    }

    /// Forget any outstanding tick
    pub fn reset(&mut self) {
        self.pending = false;
    }
}

/// One fade step of the pointer alpha
///
/// Returns the new alpha and direction, and whether the fade continues.
pub fn step_fade(
    alpha: f32,
    direction: FadeDirection,
    elapsed: Nanos,
    duration: Nanos,
) -> (f32, FadeDirection, bool) {
    let delta = elapsed as f32 / duration.max(1) as f32;
    match direction {
        FadeDirection::Out => {
            let alpha = alpha - delta;
            if alpha <= 0.0 {
                (0.0, FadeDirection::Idle, false)
            } else {
                (alpha, direction, true)
            }
        }
        FadeDirection::In => {
            let alpha = alpha + delta;
            if alpha >= 1.0 {
                (1.0, FadeDirection::Idle, false)
            } else {
                (alpha, direction, true)
            }
        }
        FadeDirection::Idle => (alpha, direction, false),
    }
}

impl StateGuard<'_> {
    /// Handle a vsync tick at `timestamp`
    pub fn animate(&mut self, timestamp: Nanos) {
        let elapsed = self.state.scheduler.begin_tick(timestamp);

        let (keep_fading, keep_flipping) = {
            let ctx = self.ctx;
            let _transaction = Transaction::open(&*ctx.backend);
            (self.fading_step(elapsed), self.bitmap_step(timestamp))
        };

        if keep_fading || keep_flipping {
            self.start_animation();
        }
    }

    fn fading_step(&mut self, elapsed: Nanos) -> bool {
        let mut keep_animating = false;

        let pointer = &self.state.pointer;
        if pointer.fade != FadeDirection::Idle {
            let (alpha, fade, keep) = step_fade(
                pointer.alpha,
                pointer.fade,
                elapsed,
                self.ctx.config.pointer_fade_duration(),
            );
            self.state.pointer.alpha = alpha;
            self.state.pointer.fade = fade;
            keep_animating |= keep;
            self.update_pointer();
        }

        let spot_delta = elapsed as f32 / self.ctx.config.spot_fade_duration().max(1) as f32;
        keep_animating |= self.state.spots.advance_fades(spot_delta);

        keep_animating
    }

    fn bitmap_step(&mut self, timestamp: Nanos) -> bool {
        let state = &mut *self.state;
        if state.pointer.presentation != Presentation::Pointer {
            return false;
        }
        let Some(animation) = state.mouse.animations.get(&state.pointer.requested_icon) else {
            return false;
        };
        if !animation.is_playable() {
            return false;
        }

        let pointer = &mut state.pointer;
        let duration = animation.duration_per_frame;
        let since = timestamp - pointer.last_frame_time;
        if since > duration {
            let increment = since / duration;
            let frame_count = animation.frames.len();
            pointer.frame_index =
                (pointer.frame_index + increment as usize % frame_count) % frame_count;
            pointer.last_frame_time += duration * increment;

            debug!(
                "AnimationScheduler: icon {} frame {}",
                pointer.requested_icon.0, pointer.frame_index
            );
            if let Some(sprite) = state.pointer_sprite.as_mut() {
                sprite.set_icon(&animation.frames[pointer.frame_index]);
            }
        }

        // Animated icons loop for as long as they stay selected
        true
    }
}
