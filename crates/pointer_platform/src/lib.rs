//! Pointer Platform Layer
//!
//! Contracts between the pointer controller and the outside world, plus
//! reference implementations of them.
//!
//! # Architecture
//!
//! The controller consumes three collaborators:
//!
//! - [`RenderBackend`] / [`Sprite`] - draws sprites, batched in transactions
//! - [`ResourceProvider`] - supplies pointer, spot and animated icons
//! - [`ClockSource`] - delivers single-shot vsync ticks and delayed timers
//!   to a registered [`ClockListener`]
//!
//! # Implementations
//!
//! - [`headless`] - recording backend, manual clock and static resources
//! - [`threaded`] - a clock with its own event thread emulating vsync

mod clock;
mod display;
mod error;
mod input;
mod resources;
mod sprite;
mod sync;

pub mod headless;
pub mod threaded;

// Re-export all public types
pub use clock::{
    millis_to_nanos, ClockListener, ClockSource, DisplayEvent, ListenerId, ListenerStatus, Nanos,
    TimerToken, NANOS_PER_MILLI, NANOS_PER_SECOND,
};
pub use display::{Bounds, DisplayId, Rotation, Viewport};
pub use error::{PlatformError, Result};
pub use input::{ButtonState, Contact, ContactId, PointerCoords};
pub use resources::{AnimationResource, IconId, MouseResources, ResourceProvider, SpotIcons};
pub use sprite::{
    Bitmap, RenderBackend, Sprite, SpriteIcon, SpriteTransform, BASE_LAYER_POINTER,
    BASE_LAYER_SPOT,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{ClockListener, ClockSource, ListenerStatus, Nanos};
    pub use crate::display::{Bounds, DisplayId, Rotation, Viewport};
    pub use crate::error::{PlatformError, Result};
    pub use crate::input::{ButtonState, Contact, ContactId, PointerCoords};
    pub use crate::resources::{IconId, ResourceProvider};
    pub use crate::sprite::{RenderBackend, Sprite, SpriteIcon};
}
