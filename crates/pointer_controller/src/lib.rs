//! Pointer Controller
//!
//! Renders and animates a screen pointer and per-touch spot indicators on a
//! multi-display surface, driven by a vsync clock.
//!
//! # Features
//!
//! - **Fades**: immediate or vsync-driven pointer fade in and out, plus an
//!   inactivity timeout with normal and short presets
//! - **Touch spots**: one spot per contact, bounded per display, fading out
//!   on lift with sprite recycling
//! - **Animated icons**: frame-accurate icon animation from the resource
//!   provider
//! - **Rotation**: the pointer keeps its physical position across display
//!   rotation
//!
//! # Threading
//!
//! All state sits behind one mutex shared by caller threads and the clock's
//! event thread. Every call pushes at most one frame, inside a single
//! backend transaction.

mod bridge;
mod config;
mod controller;
mod error;
mod inactivity;
mod scheduler;
mod spots;
mod state;
mod viewport;

pub use config::{ControllerConfig, FadeConfig, InactivityConfig, SpotConfig};
pub use controller::PointerController;
pub use error::{ConfigError, Result};
pub use inactivity::InactivityTimeout;
pub use scheduler::step_fade;
pub use spots::{
    SpotIconKind, SpotSnapshot, SpotState, MAX_RECYCLED_SPRITES, MAX_SPOTS, SPOT_SCALE,
};
pub use state::{FadeDirection, PointerState, Presentation, Transition};
pub use viewport::{ViewportChange, ViewportTransform};
