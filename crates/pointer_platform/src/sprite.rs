//! Sprite and render backend contracts
//!
//! A sprite is an opaque, backend-managed drawable with a position, alpha,
//! icon and visibility. Mutations made between [`RenderBackend::open_transaction`]
//! and [`RenderBackend::close_transaction`] become visible together.

use std::sync::Arc;

/// Layer of the pointer sprite; always above every spot
pub const BASE_LAYER_POINTER: i32 = 1 << 30;

/// Base layer for spot sprites; each spot adds its contact id
pub const BASE_LAYER_SPOT: i32 = 1 << 29;

/// Raw RGBA pixels of an icon
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// A bitmap of a single repeated RGBA color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An icon that can be attached to a sprite
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteIcon {
    pub bitmap: Bitmap,
    /// Offset of the hot spot from the bitmap's top-left corner
    pub hot_spot_x: f32,
    pub hot_spot_y: f32,
}

impl SpriteIcon {
    pub fn new(bitmap: Bitmap, hot_spot_x: f32, hot_spot_y: f32) -> Self {
        Self {
            bitmap,
            hot_spot_x,
            hot_spot_y,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.bitmap.is_empty()
    }
}

/// 2x2 transformation applied to a sprite around its hot spot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteTransform {
    pub dsdx: f32,
    pub dtdx: f32,
    pub dsdy: f32,
    pub dtdy: f32,
}

impl SpriteTransform {
    pub const IDENTITY: SpriteTransform = SpriteTransform::scale(1.0);

    /// Uniform scale
    pub const fn scale(scale: f32) -> Self {
        Self {
            dsdx: scale,
            dtdx: 0.0,
            dsdy: 0.0,
            dtdy: scale,
        }
    }
}

impl Default for SpriteTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A drawable owned by the controller
///
/// Dropping the handle releases the sprite in the backend.
pub trait Sprite: Send {
    fn set_layer(&mut self, layer: i32);

    fn set_position(&mut self, x: f32, y: f32);

    fn set_alpha(&mut self, alpha: f32);

    fn set_visible(&mut self, visible: bool);

    fn set_icon(&mut self, icon: &SpriteIcon);

    /// Detach the icon; the sprite draws nothing until a new icon is set
    fn clear_icon(&mut self);

    fn set_display_id(&mut self, display_id: crate::DisplayId);

    fn set_transform(&mut self, transform: SpriteTransform);
}

/// The rendering backend that actually draws sprites
pub trait RenderBackend: Send + Sync {
    /// Allocate a new, invisible sprite
    fn create_sprite(&self) -> Box<dyn Sprite>;

    /// Start a batch of sprite mutations
    ///
    /// Transactions nest; only the outermost close publishes the batch.
    fn open_transaction(&self);

    /// Publish the batch started by the matching `open_transaction`
    fn close_transaction(&self);
}
