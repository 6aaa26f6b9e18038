//! Viewport transform
//!
//! Keeps the pointer at the same physical spot when the display rotates,
//! and recenters it when the display itself or its size changes.

use pointer_platform::{Rotation, Viewport};
use tracing::debug;

use crate::state::StateGuard;

/// How a viewport update affects the pointer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewportChange {
    /// Different display or panel size: recenter, reload icons, fade spots
    Reset,
    /// Same panel, new rotation: remap the pointer position
    Reorient,
    /// Nothing that moves the pointer
    Unchanged,
}

/// A transition from one viewport to another
#[derive(Clone, Copy, Debug)]
pub struct ViewportTransform {
    pub old: Viewport,
    pub new: Viewport,
}

impl ViewportTransform {
    pub fn new(old: Viewport, new: Viewport) -> Self {
        Self { old, new }
    }

    pub fn change(&self) -> ViewportChange {
        if self.old.display_id != self.new.display_id
            || self.old.non_rotated_size() != self.new.non_rotated_size()
        {
            ViewportChange::Reset
        } else if self.old.rotation != self.new.rotation {
            ViewportChange::Reorient
        } else {
            ViewportChange::Unchanged
        }
    }

    /// Map a pointer position from the old rotation to the new one
    ///
    /// Positions are pixel top-left corners; the rotation is done about
    /// pixel centers so fractional positions survive a full turn.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let (x, y) = (x + 0.5, y + 0.5);

        let old_w = self.old.device_width as f32;
        let old_h = self.old.device_height as f32;
        let (x, y) = match self.old.rotation {
            Rotation::Rotation0 => (x, y),
            Rotation::Rotation90 => (old_h - y, x),
            Rotation::Rotation180 => (old_w - x, old_h - y),
            Rotation::Rotation270 => (y, old_w - x),
        };

        let new_w = self.new.device_width as f32;
        let new_h = self.new.device_height as f32;
        let (x, y) = match self.new.rotation {
            Rotation::Rotation0 => (x, y),
            Rotation::Rotation90 => (y, new_h - x),
            Rotation::Rotation180 => (new_w - x, new_h - y),
            Rotation::Rotation270 => (new_w - y, x),
        };

        (x - 0.5, y - 0.5)
    }
}

impl StateGuard<'_> {
    /// Install a new viewport and carry the pointer across
    ///
    /// Returns false if the viewport was identical and nothing happened.
    pub fn apply_viewport(&mut self, viewport: Viewport) -> bool {
        if self.state.viewport == viewport {
            return false;
        }

        let transform = ViewportTransform::new(self.state.viewport, viewport);
        self.state.viewport = viewport;

        let change = transform.change();
        debug!(
            "PointerController: viewport display={} rotation={} change={:?}",
            viewport.display_id.0,
            viewport.rotation.degrees(),
            change
        );

        match change {
            ViewportChange::Reset => {
                match viewport.bounds() {
                    Some(bounds) => {
                        let (x, y) = bounds.center();
                        self.state.pointer.x = x;
                        self.state.pointer.y = y;
                        self.load_resources();
                    }
                    None => {
                        self.state.pointer.x = 0.0;
                        self.state.pointer.y = 0.0;
                    }
                }
                self.fade_out_all_spots();
            }
            ViewportChange::Reorient => {
                let pointer = &mut self.state.pointer;
                let (x, y) = transform.map_point(pointer.x, pointer.y);
                pointer.x = x;
                pointer.y = y;
            }
            ViewportChange::Unchanged => {}
        }

        self.update_pointer();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointer_platform::DisplayId;

    fn panel() -> Viewport {
        Viewport::new(DisplayId::DEFAULT, 1080, 1920)
    }

    #[test]
    fn test_full_turn_returns_to_start() {
        let mut viewport = panel();
        let (mut x, mut y) = (100.0, 200.0);
        let mut seen = Vec::new();

        for _ in 0..4 {
            let next = viewport.rotated(viewport.rotation.next());
            let transform = ViewportTransform::new(viewport, next);
            assert_eq!(transform.change(), ViewportChange::Reorient);
            (x, y) = transform.map_point(x, y);
            seen.push((x, y));
            viewport = next;
        }

        assert_eq!(
            seen,
            vec![
                (200.0, 979.0),
                (979.0, 1719.0),
                (1719.0, 100.0),
                (100.0, 200.0),
            ]
        );
    }

    #[test]
    fn test_half_turn_and_back() {
        let upright = panel();
        let flipped = upright.rotated(Rotation::Rotation180);

        let there = ViewportTransform::new(upright, flipped).map_point(10.25, 20.75);
        assert_eq!(there, (1068.75, 1898.25));
        let back = ViewportTransform::new(flipped, upright).map_point(there.0, there.1);
        assert_eq!(back, (10.25, 20.75));
    }

    #[test]
    fn test_change_classification() {
        let upright = panel();

        let other_display = Viewport::new(DisplayId(2), 1080, 1920);
        assert_eq!(
            ViewportTransform::new(upright, other_display).change(),
            ViewportChange::Reset
        );

        let resized = Viewport::new(DisplayId::DEFAULT, 720, 1280);
        assert_eq!(
            ViewportTransform::new(upright, resized).change(),
            ViewportChange::Reset
        );

        let mut shifted = upright;
        shifted.logical_left = 10;
        assert_eq!(
            ViewportTransform::new(upright, shifted).change(),
            ViewportChange::Unchanged
        );

        assert_eq!(
            ViewportTransform::new(Viewport::default(), upright).change(),
            ViewportChange::Reset
        );
    }
}
