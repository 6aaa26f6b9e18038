//! Pointer input types

/// Identifier of a touch contact (finger or stylus tip)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u32);

/// Axis values reported for one contact
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerCoords {
    pub x: f32,
    pub y: f32,
    /// Normalized pressure; zero while hovering
    pub pressure: f32,
}

impl PointerCoords {
    pub fn new(x: f32, y: f32, pressure: f32) -> Self {
        Self { x, y, pressure }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressure > 0.0
    }
}

/// One currently active contact
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub id: ContactId,
    pub coords: PointerCoords,
}

impl Contact {
    pub fn new(id: u32, x: f32, y: f32, pressure: f32) -> Self {
        Self {
            id: ContactId(id),
            coords: PointerCoords::new(x, y, pressure),
        }
    }
}

/// Bitmask of pressed mouse buttons
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ButtonState(pub u32);

impl ButtonState {
    pub const NONE: ButtonState = ButtonState(0);
    pub const PRIMARY: ButtonState = ButtonState(1 << 0);
    pub const SECONDARY: ButtonState = ButtonState(1 << 1);
    pub const TERTIARY: ButtonState = ButtonState(1 << 2);
    pub const BACK: ButtonState = ButtonState(1 << 3);
    pub const FORWARD: ButtonState = ButtonState(1 << 4);

    pub fn contains(self, other: ButtonState) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ButtonState {
    type Output = ButtonState;

    fn bitor(self, rhs: ButtonState) -> ButtonState {
        ButtonState(self.0 | rhs.0)
    }
}
