//! Touch spots
//!
//! Each display keeps its spots in insertion order. A spot is `Active` while
//! its contact is down and `Fading` after it lifts; fading spots are only
//! deleted by the animation tick once their alpha reaches zero. When a
//! display is at capacity, creating a spot evicts the first fading spot, or
//! failing that the oldest spot. Released sprites go onto a bounded stack and
//! are reused before the backend is asked for new ones.

use pointer_platform::{
    Contact, ContactId, DisplayId, RenderBackend, Sprite, SpotIcons, SpriteIcon, SpriteTransform,
    BASE_LAYER_POINTER, BASE_LAYER_SPOT,
};
use rustc_hash::FxHashMap;

use crate::state::{StateGuard, Transaction};

/// Live spots allowed per display
pub const MAX_SPOTS: usize = 12;

/// Released spot sprites kept for reuse
pub const MAX_RECYCLED_SPRITES: usize = 12;

/// Default spot sprite scale
pub const SPOT_SCALE: f32 = 1.0;

/// Lifecycle of a spot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpotState {
    /// Tracking a contact that is down
    Active(ContactId),
    /// Contact lifted; fading out toward removal
    Fading,
}

/// Which spot icon a sprite currently shows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpotIconKind {
    Hover,
    Touch,
}

/// Snapshot of one spot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotSnapshot {
    pub state: SpotState,
    pub x: f32,
    pub y: f32,
    pub alpha: f32,
    pub icon: Option<SpotIconKind>,
}

struct Spot {
    state: SpotState,
    x: f32,
    y: f32,
    alpha: f32,
    scale: f32,
    sprite: Box<dyn Sprite>,
    last_icon: Option<SpotIconKind>,
}

/// Layer for a contact's spot; spots always stay below the pointer
fn spot_layer(id: ContactId) -> i32 {
    let headroom = (BASE_LAYER_POINTER - BASE_LAYER_SPOT - 1) as u32;
    BASE_LAYER_SPOT + id.0.min(headroom) as i32
}

impl Spot {
    fn new(id: ContactId, sprite: Box<dyn Sprite>, scale: f32) -> Self {
        Self {
            state: SpotState::Active(id),
            x: 0.0,
            y: 0.0,
            alpha: 1.0,
            scale,
            sprite,
            last_icon: None,
        }
    }

    fn is_fading(&self) -> bool {
        self.state == SpotState::Fading
    }

    fn update_sprite(
        &mut self,
        id: ContactId,
        kind: SpotIconKind,
        icon: &SpriteIcon,
        x: f32,
        y: f32,
        display_id: DisplayId,
    ) {
        self.sprite.set_layer(spot_layer(id));
        self.sprite.set_alpha(self.alpha);
        self.sprite.set_transform(SpriteTransform::scale(self.scale));
        self.sprite.set_position(x, y);
        self.sprite.set_display_id(display_id);
        self.x = x;
        self.y = y;

        if self.last_icon != Some(kind) {
            self.last_icon = Some(kind);
            self.sprite.set_icon(icon);
            self.sprite.set_visible(true);
        }
    }

    /// Returns true if the spot was active
    fn begin_fade(&mut self) -> bool {
        let was_active = !self.is_fading();
        self.state = SpotState::Fading;
        was_active
    }

    fn snapshot(&self) -> SpotSnapshot {
        SpotSnapshot {
            state: self.state,
            x: self.x,
            y: self.y,
            alpha: self.alpha,
            icon: self.last_icon,
        }
    }
}

/// Per-display spot collections plus the sprite recycle stack
pub struct SpotPool {
    by_display: FxHashMap<DisplayId, Vec<Spot>>,
    recycled: Vec<Box<dyn Sprite>>,
    max_spots: usize,
    max_recycled: usize,
    scale: f32,
}

impl SpotPool {
    pub fn new(max_spots: usize, max_recycled: usize, scale: f32) -> Self {
        Self {
            by_display: FxHashMap::default(),
            recycled: Vec::with_capacity(max_recycled),
            max_spots: max_spots.max(1),
            max_recycled,
            scale,
        }
    }

    /// Add or move spots for `contacts` on `display_id`, and start fading
    /// every other active spot on that display
    ///
    /// Returns true if any spot started fading.
    pub fn update_spots(
        &mut self,
        contacts: &[Contact],
        display_id: DisplayId,
        icons: &SpotIcons,
        backend: &dyn RenderBackend,
    ) -> bool {
        let spots = self.by_display.entry(display_id).or_default();

        for contact in contacts {
            let (kind, icon) = if contact.coords.is_pressed() {
                (SpotIconKind::Touch, &icons.touch)
            } else {
                (SpotIconKind::Hover, &icons.hover)
            };

            let index = match spots
                .iter()
                .position(|spot| spot.state == SpotState::Active(contact.id))
            {
                Some(index) => index,
                None => {
                    while spots.len() >= self.max_spots {
                        let victim = spots.iter().position(Spot::is_fading).unwrap_or(0);
                        let spot = spots.remove(victim);
                        recycle(&mut self.recycled, self.max_recycled, spot);
                    }
                    let sprite = self.recycled.pop().unwrap_or_else(|| backend.create_sprite());
                    spots.push(Spot::new(contact.id, sprite, self.scale));
                    spots.len() - 1
                }
            };

            spots[index].update_sprite(
                contact.id,
                kind,
                icon,
                contact.coords.x,
                contact.coords.y,
                display_id,
            );
        }

        let mut started_fading = false;
        for spot in spots.iter_mut() {
            if let SpotState::Active(id) = spot.state {
                if !contacts.iter().any(|contact| contact.id == id) {
                    started_fading |= spot.begin_fade();
                }
            }
        }

        if spots.is_empty() {
            self.by_display.remove(&display_id);
        }
        started_fading
    }

    /// Start fading every spot on every display
    ///
    /// Returns true if any spot started fading.
    pub fn fade_all(&mut self) -> bool {
        let mut started_fading = false;
        for spot in self.by_display.values_mut().flatten() {
            started_fading |= spot.begin_fade();
        }
        started_fading
    }

    /// Lower the alpha of every fading spot by `delta`, removing and
    /// recycling spots that reach zero
    ///
    /// Returns true while any spot is still fading.
    pub fn advance_fades(&mut self, delta: f32) -> bool {
        let recycled = &mut self.recycled;
        let max_recycled = self.max_recycled;
        let mut keep_animating = false;

        self.by_display.retain(|_, spots| {
            let mut index = 0;
            while index < spots.len() {
                let spot = &mut spots[index];
                if spot.is_fading() {
                    spot.alpha -= delta;
                    if spot.alpha <= 0.0 {
                        let spot = spots.remove(index);
                        recycle(recycled, max_recycled, spot);
                        continue;
                    }
                    spot.sprite.set_alpha(spot.alpha);
                    keep_animating = true;
                }
                index += 1;
            }
            !spots.is_empty()
        });

        keep_animating
    }

    /// Spots on `display_id` in insertion order
    pub fn spots(&self, display_id: DisplayId) -> Vec<SpotSnapshot> {
        self.by_display
            .get(&display_id)
            .map(|spots| spots.iter().map(Spot::snapshot).collect())
            .unwrap_or_default()
    }

    /// Spots on `display_id`, fading ones included
    pub fn live_count(&self, display_id: DisplayId) -> usize {
        self.by_display.get(&display_id).map_or(0, Vec::len)
    }

    pub fn recycled_count(&self) -> usize {
        self.recycled.len()
    }

    /// Drop every spot and recycled sprite
    pub fn release_all(&mut self) {
        self.by_display.clear();
        self.recycled.clear();
    }
}

fn recycle(recycled: &mut Vec<Box<dyn Sprite>>, max_recycled: usize, spot: Spot) {
    let mut sprite = spot.sprite;
    sprite.clear_icon();
    if recycled.len() < max_recycled {
        recycled.push(sprite);
    }
}

impl StateGuard<'_> {
    /// Update the spots of `display_id` from the current contacts
    pub fn set_spots(&mut self, contacts: &[Contact], display_id: DisplayId) {
        let ctx = self.ctx;
        let state = &mut *self.state;
        if !state.viewport.is_valid() {
            return;
        }
        let Some(resources) = state.resources.as_ref() else {
            return;
        };

        let started_fading = {
            let _transaction = Transaction::open(&*ctx.backend);
            state
                .spots
                .update_spots(contacts, display_id, &resources.spot, &*ctx.backend)
        };

        if started_fading {
            self.start_animation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointer_platform::headless::{RecordingBackend, StaticResources};
    use pointer_platform::ResourceProvider;

    fn icons() -> SpotIcons {
        StaticResources::new().load_pointer_resources(DisplayId::DEFAULT)
    }

    fn touch(id: u32, x: f32) -> Contact {
        Contact::new(id, x, 10.0, 1.0)
    }

    #[test]
    fn test_lifted_contact_starts_fading() {
        let backend = RecordingBackend::new();
        let mut pool = SpotPool::new(MAX_SPOTS, MAX_RECYCLED_SPRITES, SPOT_SCALE);
        let icons = icons();

        assert!(!pool.update_spots(
            &[touch(1, 1.0), touch(2, 2.0)],
            DisplayId::DEFAULT,
            &icons,
            &backend
        ));
        assert!(pool.update_spots(&[touch(2, 5.0)], DisplayId::DEFAULT, &icons, &backend));

        let spots = pool.spots(DisplayId::DEFAULT);
        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].state, SpotState::Fading);
        assert_eq!(spots[1].state, SpotState::Active(ContactId(2)));
        assert_eq!(spots[1].x, 5.0);
    }

    #[test]
    fn test_pressure_selects_icon() {
        let backend = RecordingBackend::new();
        let mut pool = SpotPool::new(MAX_SPOTS, MAX_RECYCLED_SPRITES, SPOT_SCALE);
        let icons = icons();

        pool.update_spots(
            &[Contact::new(3, 0.0, 0.0, 0.0)],
            DisplayId::DEFAULT,
            &icons,
            &backend,
        );
        assert_eq!(backend.spots()[0].icon.as_ref(), Some(&icons.hover));

        pool.update_spots(
            &[Contact::new(3, 0.0, 0.0, 0.4)],
            DisplayId::DEFAULT,
            &icons,
            &backend,
        );
        assert_eq!(backend.spots()[0].icon.as_ref(), Some(&icons.touch));
        assert_eq!(
            pool.spots(DisplayId::DEFAULT)[0].icon,
            Some(SpotIconKind::Touch)
        );
    }

    #[test]
    fn test_capacity_evicts_fading_before_active() {
        let backend = RecordingBackend::new();
        let mut pool = SpotPool::new(3, MAX_RECYCLED_SPRITES, SPOT_SCALE);
        let icons = icons();
        let display = DisplayId::DEFAULT;

        pool.update_spots(&[touch(1, 1.0), touch(2, 2.0), touch(3, 3.0)], display, &icons, &backend);
        // Contact 2 lifts; 1 and 3 stay down
        pool.update_spots(&[touch(1, 1.0), touch(3, 3.0)], display, &icons, &backend);
        pool.update_spots(&[touch(1, 1.0), touch(3, 3.0), touch(4, 4.0)], display, &icons, &backend);

        let states: Vec<SpotState> = pool.spots(display).iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                SpotState::Active(ContactId(1)),
                SpotState::Active(ContactId(3)),
                SpotState::Active(ContactId(4)),
            ]
        );
    }

    #[test]
    fn test_capacity_evicts_oldest_when_none_fading() {
        let backend = RecordingBackend::new();
        let mut pool = SpotPool::new(MAX_SPOTS, MAX_RECYCLED_SPRITES, SPOT_SCALE);
        let icons = icons();
        let display = DisplayId::DEFAULT;

        let contacts: Vec<Contact> = (0..=MAX_SPOTS as u32).map(|id| touch(id, id as f32)).collect();
        pool.update_spots(&contacts, display, &icons, &backend);

        let spots = pool.spots(display);
        assert_eq!(spots.len(), MAX_SPOTS);
        assert_eq!(spots[0].state, SpotState::Active(ContactId(1)));
        assert_eq!(
            spots[MAX_SPOTS - 1].state,
            SpotState::Active(ContactId(MAX_SPOTS as u32))
        );
        // The evicted sprite was recycled and immediately reused
        assert_eq!(backend.created_count(), MAX_SPOTS);
        assert_eq!(pool.recycled_count(), 0);
    }

    #[test]
    fn test_advance_fades_removes_and_recycles() {
        let backend = RecordingBackend::new();
        let mut pool = SpotPool::new(MAX_SPOTS, 1, SPOT_SCALE);
        let icons = icons();
        let display = DisplayId::DEFAULT;

        pool.update_spots(&[touch(1, 1.0), touch(2, 2.0)], display, &icons, &backend);
        assert!(pool.fade_all());
        assert!(!pool.fade_all());

        assert!(pool.advance_fades(0.5));
        assert_eq!(pool.spots(display)[0].alpha, 0.5);
        assert!(!pool.advance_fades(0.5));

        assert_eq!(pool.live_count(display), 0);
        // Only one sprite fits in the recycle stack; the other was released
        assert_eq!(pool.recycled_count(), 1);
        assert_eq!(backend.sprite_count(), 1);
        assert!(backend.spots().is_empty());
    }

    #[test]
    fn test_displays_are_independent() {
        let backend = RecordingBackend::new();
        let mut pool = SpotPool::new(MAX_SPOTS, MAX_RECYCLED_SPRITES, SPOT_SCALE);
        let icons = icons();

        pool.update_spots(&[touch(1, 1.0)], DisplayId(0), &icons, &backend);
        pool.update_spots(&[touch(1, 1.0)], DisplayId(1), &icons, &backend);
        assert!(pool.update_spots(&[], DisplayId(1), &icons, &backend));

        assert_eq!(pool.spots(DisplayId(0))[0].state, SpotState::Active(ContactId(1)));
        assert_eq!(pool.spots(DisplayId(1))[0].state, SpotState::Fading);
    }

    #[test]
    fn test_spot_layers_stay_below_pointer() {
        assert_eq!(spot_layer(ContactId(3)), BASE_LAYER_SPOT + 3);
        assert!(spot_layer(ContactId(u32::MAX)) < BASE_LAYER_POINTER);
    }
}
