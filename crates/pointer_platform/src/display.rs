//! Display geometry

/// Identifier of a logical display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayId(pub i32);

impl DisplayId {
    /// No display; the id carried by a viewport that was never set
    pub const NONE: DisplayId = DisplayId(-1);
    /// The built-in display
    pub const DEFAULT: DisplayId = DisplayId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl Default for DisplayId {
    fn default() -> Self {
        Self::NONE
    }
}

/// Display rotation, clockwise
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    /// Whether width and height are swapped relative to the natural orientation
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Rotation90 | Rotation::Rotation270)
    }

    /// Rotation in degrees
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Rotation0 => 0,
            Rotation::Rotation90 => 90,
            Rotation::Rotation180 => 180,
            Rotation::Rotation270 => 270,
        }
    }

    /// Parse a rotation from degrees (only multiples of 90 in [0, 360))
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Rotation0),
            90 => Some(Rotation::Rotation90),
            180 => Some(Rotation::Rotation180),
            270 => Some(Rotation::Rotation270),
            _ => None,
        }
    }

    /// The next rotation, clockwise
    pub fn next(self) -> Self {
        match self {
            Rotation::Rotation0 => Rotation::Rotation90,
            Rotation::Rotation90 => Rotation::Rotation180,
            Rotation::Rotation180 => Rotation::Rotation270,
            Rotation::Rotation270 => Rotation::Rotation0,
        }
    }
}

/// A display's logical and physical geometry
///
/// `device_width` / `device_height` are already adjusted for `rotation`, so a
/// 1080x1920 panel rotated by 90 degrees reports 1920x1080.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub display_id: DisplayId,
    pub rotation: Rotation,
    pub logical_left: i32,
    pub logical_top: i32,
    pub logical_right: i32,
    pub logical_bottom: i32,
    pub device_width: i32,
    pub device_height: i32,
}

impl Viewport {
    /// A viewport covering the whole device in its natural orientation
    pub fn new(display_id: DisplayId, width: i32, height: i32) -> Self {
        Self {
            display_id,
            rotation: Rotation::Rotation0,
            logical_left: 0,
            logical_top: 0,
            logical_right: width,
            logical_bottom: height,
            device_width: width,
            device_height: height,
        }
    }

    /// The same panel rotated to `rotation`, with logical and device size
    /// transposed as needed
    pub fn rotated(&self, rotation: Rotation) -> Self {
        let (width, height) = self.non_rotated_size();
        let (width, height) = if rotation.is_transposed() {
            (height, width)
        } else {
            (width, height)
        };
        Self {
            rotation,
            logical_left: 0,
            logical_top: 0,
            logical_right: width,
            logical_bottom: height,
            device_width: width,
            device_height: height,
            ..*self
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.display_id.is_none()
    }

    /// Device size in the natural (unrotated) orientation
    pub fn non_rotated_size(&self) -> (i32, i32) {
        if self.rotation.is_transposed() {
            (self.device_height, self.device_width)
        } else {
            (self.device_width, self.device_height)
        }
    }

    /// Inclusive pixel bounds, or `None` for an invalid viewport
    pub fn bounds(&self) -> Option<Bounds> {
        if !self.is_valid() {
            return None;
        }
        Some(Bounds {
            min_x: self.logical_left as f32,
            min_y: self.logical_top as f32,
            max_x: (self.logical_right - 1) as f32,
            max_y: (self.logical_bottom - 1) as f32,
        })
    }
}

/// Inclusive pointer bounds in display pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    /// Clamp a point into the bounds
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.max(self.min_x).min(self.max_x),
            y.max(self.min_y).min(self.max_y),
        )
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport_is_invalid() {
        let viewport = Viewport::default();
        assert!(!viewport.is_valid());
        assert_eq!(viewport.bounds(), None);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let bounds = Viewport::new(DisplayId::DEFAULT, 800, 480).bounds().unwrap();
        assert_eq!(bounds.max_x, 799.0);
        assert_eq!(bounds.max_y, 479.0);
        assert_eq!(bounds.clamp(-4.0, 900.0), (0.0, 479.0));
    }

    #[test]
    fn test_rotated_keeps_natural_size() {
        let natural = Viewport::new(DisplayId::DEFAULT, 1080, 1920);
        let turned = natural.rotated(Rotation::Rotation90);
        assert_eq!((turned.device_width, turned.device_height), (1920, 1080));
        assert_eq!(turned.non_rotated_size(), natural.non_rotated_size());
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::Rotation270));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(360), None);
        for rotation in [Rotation::Rotation0, Rotation::Rotation90, Rotation::Rotation180] {
            assert_eq!(Rotation::from_degrees(rotation.degrees()), Some(rotation));
        }
    }
}
