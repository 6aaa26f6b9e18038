//! Icon resources supplied by the pointer policy

use rustc_hash::FxHashMap;

use crate::clock::Nanos;
use crate::display::DisplayId;
use crate::sprite::SpriteIcon;

/// Identifier of a pointer icon style
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IconId(pub i32);

impl IconId {
    pub const ARROW: IconId = IconId(1000);
    pub const CUSTOM: IconId = IconId(-1);
    pub const WAIT: IconId = IconId(1004);
}

/// Icons used to draw touch spots on one display
#[derive(Clone, Debug, PartialEq)]
pub struct SpotIcons {
    /// Contact hovering (pressure == 0)
    pub hover: SpriteIcon,
    /// Contact pressed (pressure > 0)
    pub touch: SpriteIcon,
    /// Shown on the pointer sprite in spot presentation
    pub anchor: SpriteIcon,
}

/// Frames of an animated pointer icon
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationResource {
    pub frames: Vec<SpriteIcon>,
    pub duration_per_frame: Nanos,
}

impl AnimationResource {
    pub fn new(frames: Vec<SpriteIcon>, duration_per_frame: Nanos) -> Self {
        Self {
            frames,
            duration_per_frame,
        }
    }

    /// Whether the resource can actually be played
    pub fn is_playable(&self) -> bool {
        !self.frames.is_empty() && self.duration_per_frame > 0
    }
}

/// Additional pointer icons keyed by icon id
#[derive(Clone, Debug, Default)]
pub struct MouseResources {
    pub icons: FxHashMap<IconId, SpriteIcon>,
    pub animations: FxHashMap<IconId, AnimationResource>,
}

impl MouseResources {
    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn clear(&mut self) {
        self.icons.clear();
        self.animations.clear();
    }
}

/// Supplies icon bitmaps and animation frame sets
///
/// Loads happen while the controller holds its state lock, so implementations
/// should return cached resources rather than decode on every call.
pub trait ResourceProvider: Send + Sync {
    /// Icon id that selects the default pointer icon
    fn default_pointer_icon_id(&self) -> IconId;

    /// Icon id under which a caller-supplied icon is stored
    fn custom_pointer_icon_id(&self) -> IconId;

    fn load_pointer_resources(&self, display_id: DisplayId) -> SpotIcons;

    fn load_pointer_icon(&self, display_id: DisplayId) -> SpriteIcon;

    fn load_additional_mouse_resources(&self, display_id: DisplayId) -> MouseResources;
}
