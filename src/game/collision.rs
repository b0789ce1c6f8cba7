//! Collision Detection
//!
//! Every entity in the arena is an axis-aligned square anchored at its
//! top-left corner. Overlap is strict: boxes sharing only an edge do not
//! collide.

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::game::config::ArenaConfig;
use crate::game::state::{GameState, Obstacle, PlayerId, Terrain};

/// Axis-aligned bounding box, `min` inclusive, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Aabb {
    pub min: FixedVec2,
    pub max: FixedVec2,
}

impl Aabb {
    /// Box of a square with top-left corner `position` and side `size`.
    #[inline]
    pub fn square(position: FixedVec2, size: Fixed) -> Self {
        Self {
            min: position,
            max: FixedVec2::new(position.x + size, position.y + size),
        }
    }

    /// Do the two boxes share any interior area?
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Box grown by `margin` on every side.
    #[inline]
    pub fn expanded(&self, margin: Fixed) -> Self {
        Self {
            min: FixedVec2::new(self.min.x - margin, self.min.y - margin),
            max: FixedVec2::new(self.max.x + margin, self.max.y + margin),
        }
    }
}

/// Terrain under a box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TerrainContact {
    /// At least one wall intersected
    pub wall: bool,
    /// First intersecting ice or mud patch, in iteration order
    pub surface: Option<Terrain>,
}

/// Classify the terrain under `bounds`.
///
/// Later ice or mud patches are ignored once one was found.
pub fn terrain_contact(bounds: &Aabb, obstacles: &[Obstacle]) -> TerrainContact {
    let mut contact = TerrainContact::default();
    for obstacle in obstacles.iter().filter(|o| bounds.overlaps(&o.bounds())) {
        match obstacle.terrain {
            Terrain::Wall => contact.wall = true,
            terrain => {
                contact.surface.get_or_insert(terrain);
            }
        }
    }
    contact
}

/// Does `bounds` overlap any player other than `mover`?
pub fn overlaps_other_player(
    state: &GameState,
    mover: PlayerId,
    bounds: &Aabb,
    config: &ArenaConfig,
) -> bool {
    state
        .players
        .iter()
        .filter(|p| p.id != mover)
        .any(|p| bounds.overlaps(&p.bounds(config)))
}

/// Indices of active powerups touched by `bounds`, in vector order.
pub fn touched_powerups(state: &GameState, bounds: &Aabb) -> Vec<usize> {
    state
        .powerups
        .iter()
        .enumerate()
        .filter(|(_, p)| p.active && bounds.overlaps(&p.bounds(&state.config)))
        .map(|(idx, _)| idx)
        .collect()
}
