//! World Generator
//!
//! Builds the map of a round: obstacles first, then powerups scattered
//! around them. Every placement is rejection sampled with a hard attempt
//! cap, so an overcrowded configuration fails instead of spinning.
//!
//! ```text
//!   ┌────────────────────────────────────┐
//!   │ P1                              P4 │   spawns: fixed corners
//!   │        ▓▓        ░░                │   obstacles: keep clear of
//!   │   ░░         ·         ▓▓          │   spawns, orb and each other
//!   │           ·  ●  ·                  │   ● orb spawn (center)
//!   │     ▒▒  ·                ▒▒  ·     │   · powerups near obstacles
//!   │ P3                              P2 │
//!   └────────────────────────────────────┘
//! ```

use crate::core::fixed::from_int;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::collision::Aabb;
use crate::game::config::ArenaConfig;
use crate::game::state::{Obstacle, PlayerColor, PlayerId, Powerup, PowerupKind, Terrain};

/// Maximum players in one arena.
pub const MAX_PLAYERS: usize = 4;

/// Where a player starts the round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnPoint {
    /// Player this spawn belongs to
    pub player_id: PlayerId,
    /// Top-left corner of the player square
    pub position: FixedVec2,
    /// Color assigned with the spawn
    pub color: PlayerColor,
}

impl SpawnPoint {
    /// Footprint of a player standing on this spawn.
    #[inline]
    pub fn bounds(&self, config: &ArenaConfig) -> Aabb {
        Aabb::square(self.position, from_int(config.player_size))
    }
}

/// Generated map of a round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldLayout {
    pub obstacles: Vec<Obstacle>,
    pub powerups: Vec<Powerup>,
}

/// World generation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldGenError {
    /// No valid spot found within the attempt cap.
    #[error("could not place {entity} #{index} after {attempts} attempts")]
    PlacementExhausted {
        entity: &'static str,
        index: usize,
        attempts: u32,
    },
}

// =============================================================================
// SPAWNS
// =============================================================================

/// Spawn of a given player id (1..=4), if any.
///
/// Ids map to corners clockwise from the top-left in join order of the
/// classic game: red top-left, purple bottom-right, blue bottom-left,
/// green top-right.
pub fn spawn_for(config: &ArenaConfig, player_id: PlayerId) -> Option<SpawnPoint> {
    let near = config.spawn_inset;
    let far = config.arena_size - config.player_size - config.spawn_inset;

    let (x, y, color) = match player_id.get() {
        1 => (near, near, PlayerColor::Red),
        2 => (far, far, PlayerColor::Purple),
        3 => (near, far, PlayerColor::Blue),
        4 => (far, near, PlayerColor::Green),
        _ => return None,
    };

    Some(SpawnPoint {
        player_id,
        position: FixedVec2::from_ints(x, y),
        color,
    })
}

/// Spawns for players `1..=count`, capped at [`MAX_PLAYERS`].
pub fn default_spawns(config: &ArenaConfig, count: usize) -> Vec<SpawnPoint> {
    (1..=count.min(MAX_PLAYERS) as u8)
        .filter_map(|id| spawn_for(config, PlayerId::new(id)))
        .collect()
}

/// Where the orb starts: arena center minus half the orb.
pub fn object_spawn(config: &ArenaConfig) -> FixedVec2 {
    let offset = from_int(config.arena_size - config.object_size) / 2;
    FixedVec2::new(offset, offset)
}

// =============================================================================
// GENERATION
// =============================================================================

/// Generate obstacles and powerups for a round.
///
/// The layout depends only on `config`, `spawns` and the RNG state.
pub fn generate(
    config: &ArenaConfig,
    spawns: &[SpawnPoint],
    rng: &mut DeterministicRng,
) -> Result<WorldLayout, WorldGenError> {
    let obstacles = place_obstacles(config, spawns, rng)?;
    let powerups = place_powerups(config, spawns, &obstacles, rng)?;
    Ok(WorldLayout { obstacles, powerups })
}

fn place_obstacles(
    config: &ArenaConfig,
    spawns: &[SpawnPoint],
    rng: &mut DeterministicRng,
) -> Result<Vec<Obstacle>, WorldGenError> {
    let size = from_int(config.obstacle_size);
    let max = config.max_coord(config.obstacle_size);
    let spacing = from_int(config.obstacle_spacing);
    let spawn_clearance = from_int(config.spawn_clearance);
    let object_clearance = from_int(config.object_clearance);
    let object_box = Aabb::square(object_spawn(config), from_int(config.object_size));

    let mut obstacles: Vec<Obstacle> = Vec::with_capacity(config.obstacle_count as usize);

    for index in 0..config.obstacle_count as usize {
        let placed = sample(config.max_placement_attempts, || {
            let position = rng.next_point(0, max);
            let terrain = *rng.choose(&Terrain::ALL)?;
            let candidate = Aabb::square(position, size);

            let crowded = obstacles
                .iter()
                .any(|o| candidate.expanded(spacing).overlaps(&o.bounds()));
            let on_spawn = spawns
                .iter()
                .any(|s| candidate.expanded(spawn_clearance).overlaps(&s.bounds(config)));
            let on_object = candidate.expanded(object_clearance).overlaps(&object_box);

            (!crowded && !on_spawn && !on_object).then_some(Obstacle { position, size, terrain })
        });

        match placed {
            Some(obstacle) => obstacles.push(obstacle),
            None => {
                return Err(WorldGenError::PlacementExhausted {
                    entity: "obstacle",
                    index,
                    attempts: config.max_placement_attempts,
                })
            }
        }
    }

    Ok(obstacles)
}

fn place_powerups(
    config: &ArenaConfig,
    spawns: &[SpawnPoint],
    obstacles: &[Obstacle],
    rng: &mut DeterministicRng,
) -> Result<Vec<Powerup>, WorldGenError> {
    let size = from_int(config.powerup_size);
    let max = config.max_coord(config.powerup_size);
    let scatter = from_int(config.powerup_scatter);
    let spawn_clearance = from_int(config.powerup_spawn_clearance);
    let object_clearance = from_int(config.powerup_object_clearance);
    let spacing = from_int(config.powerup_spacing);
    let object_box = Aabb::square(object_spawn(config), from_int(config.object_size));

    let total = PowerupKind::ALL.len() * config.powerups_per_kind as usize;
    let mut powerups: Vec<Powerup> = Vec::with_capacity(total);

    for kind in PowerupKind::ALL {
        for _ in 0..config.powerups_per_kind {
            let index = powerups.len();
            let placed = sample(config.max_placement_attempts, || {
                let position = match rng.choose(obstacles) {
                    Some(anchor) => {
                        let area = anchor.bounds().expanded(scatter);
                        FixedVec2::new(
                            rng.next_fixed_range(area.min.x, area.max.x - size),
                            rng.next_fixed_range(area.min.y, area.max.y - size),
                        )
                        .clamp(0, max)
                    }
                    None => rng.next_point(0, max),
                };
                let candidate = Aabb::square(position, size);

                let near_spawn = spawns
                    .iter()
                    .any(|s| candidate.expanded(spawn_clearance).overlaps(&s.bounds(config)));
                let on_obstacle = obstacles.iter().any(|o| candidate.overlaps(&o.bounds()));
                let near_object = candidate.expanded(object_clearance).overlaps(&object_box);
                let crowded = powerups
                    .iter()
                    .any(|p| candidate.expanded(spacing).overlaps(&p.bounds(config)));

                (!near_spawn && !on_obstacle && !near_object && !crowded)
                    .then(|| Powerup::new(position, kind))
            });

            match placed {
                Some(powerup) => powerups.push(powerup),
                None => {
                    return Err(WorldGenError::PlacementExhausted {
                        entity: "powerup",
                        index,
                        attempts: config.max_placement_attempts,
                    })
                }
            }
        }
    }

    Ok(powerups)
}

/// Pick a new orb position clear of obstacles and active powerups.
///
/// Players are not considered. `None` once the attempt cap is spent.
pub fn relocate_object(
    config: &ArenaConfig,
    obstacles: &[Obstacle],
    powerups: &[Powerup],
    rng: &mut DeterministicRng,
) -> Option<FixedVec2> {
    let size = from_int(config.object_size);
    let max = config.max_coord(config.object_size);

    sample(config.max_placement_attempts, || {
        let position = rng.next_point(0, max);
        let candidate = Aabb::square(position, size);

        let blocked = obstacles.iter().any(|o| candidate.overlaps(&o.bounds()))
            || powerups
                .iter()
                .any(|p| p.active && candidate.overlaps(&p.bounds(config)));

        (!blocked).then_some(position)
    })
}

/// Run `attempt` until it yields a value or `max_attempts` is spent.
fn sample<T>(max_attempts: u32, mut attempt: impl FnMut() -> Option<T>) -> Option<T> {
    (0..max_attempts).find_map(|_| attempt())
}
