//! Arena Configuration
//!
//! Every gameplay constant and policy switch of a round. Sizes and speeds
//! are whole pixels, durations are milliseconds.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, from_int};
use crate::game::state::{GameTime, PowerupKind};

/// What happens to the orb when a player touches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectPolicy {
    /// Score, then the orb jumps to a fresh random spot and stays free.
    #[default]
    Relay,
    /// Score, then the orb sticks to the scorer for the rest of the round.
    Carry,
}

/// Who receives the effect of a `slow` or `freeze` powerup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebuffTarget {
    /// Every player except the collector.
    #[default]
    Opponents,
    /// The collector itself.
    Collector,
}

/// Gameplay configuration for one arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Side of the square arena (px)
    pub arena_size: i32,
    /// Side of a player square (px)
    pub player_size: i32,
    /// Side of the orb square (px)
    pub object_size: i32,
    /// Side of a powerup square (px)
    pub powerup_size: i32,
    /// Side of an obstacle square (px)
    pub obstacle_size: i32,
    /// Distance of the corner spawns from the arena edges (px)
    pub spawn_inset: i32,

    /// Base movement per input (px)
    pub base_speed: i32,
    /// Added to the base speed while a speed boost is active (px)
    pub speed_boost: i32,
    /// Speed while a speed penalty is active; overrides any boost (px)
    pub penalty_speed: i32,
    /// Displacement factor on mud, in percent
    pub mud_speed_percent: u32,
    /// Displacement factor on ice, in percent
    pub ice_speed_percent: u32,

    /// Round length in ticks (seconds at the default 1 Hz clock)
    pub round_duration_secs: u32,

    /// Speed boost duration (ms)
    pub boost_duration_ms: GameTime,
    /// Speed penalty duration (ms)
    pub penalty_duration_ms: GameTime,
    /// Freeze duration (ms)
    pub freeze_duration_ms: GameTime,
    /// Invincibility duration (ms)
    pub invincibility_duration_ms: GameTime,

    /// Obstacles placed per round
    pub obstacle_count: u32,
    /// Powerups placed per kind per round
    pub powerups_per_kind: u32,
    /// Minimum gap between two obstacles (px)
    pub obstacle_spacing: i32,
    /// Minimum gap between an obstacle and a player spawn (px)
    pub spawn_clearance: i32,
    /// Minimum gap between an obstacle and the orb spawn (px)
    pub object_clearance: i32,
    /// How far from an obstacle a powerup may be scattered (px)
    pub powerup_scatter: i32,
    /// Minimum gap between a powerup and a player spawn (px)
    pub powerup_spawn_clearance: i32,
    /// Minimum gap between a powerup and the orb spawn (px)
    pub powerup_object_clearance: i32,
    /// Minimum gap between two powerups (px)
    pub powerup_spacing: i32,
    /// Rejection-sampling cap per placed entity
    pub max_placement_attempts: u32,

    /// Orb behavior after a pickup
    pub object_policy: ObjectPolicy,
    /// Target of slow and freeze powerups
    pub debuff_target: DebuffTarget,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            arena_size: 800,
            player_size: 30,
            object_size: 20,
            powerup_size: 15,
            obstacle_size: 60,
            spawn_inset: 10,

            base_speed: 5,
            speed_boost: 3,
            penalty_speed: 2,
            mud_speed_percent: 50,
            ice_speed_percent: 150,

            round_duration_secs: 120,

            boost_duration_ms: 8_000,
            penalty_duration_ms: 10_000,
            freeze_duration_ms: 3_000,
            invincibility_duration_ms: 5_000,

            obstacle_count: 18,
            powerups_per_kind: 2,
            obstacle_spacing: 15,
            spawn_clearance: 60,
            object_clearance: 40,
            powerup_scatter: 40,
            powerup_spawn_clearance: 60,
            powerup_object_clearance: 50,
            powerup_spacing: 60,
            max_placement_attempts: 10_000,

            object_policy: ObjectPolicy::Relay,
            debuff_target: DebuffTarget::Opponents,
        }
    }
}

impl ArenaConfig {
    /// Largest coordinate a square of side `size` may take.
    #[inline]
    pub fn max_coord(&self, size: i32) -> Fixed {
        from_int(self.arena_size - size)
    }

    /// How long an effect granted by `kind` lasts.
    pub fn duration(&self, kind: PowerupKind) -> GameTime {
        match kind {
            PowerupKind::Speed => self.boost_duration_ms,
            PowerupKind::Slow => self.penalty_duration_ms,
            PowerupKind::Freeze => self.freeze_duration_ms,
            PowerupKind::Invincible => self.invincibility_duration_ms,
        }
    }

    /// Check the values for combinations the engine cannot honor.
    ///
    /// Feasibility of the placement counts is not checked here; an
    /// overcrowded arena surfaces as a placement error at round start.
    pub fn validate(&self) -> Result<(), ArenaConfigError> {
        if self.arena_size <= 0 || self.arena_size > MAX_ARENA_SIZE {
            return Err(ArenaConfigError::ArenaSize { max: MAX_ARENA_SIZE });
        }
        let sizes = [
            ("player_size", self.player_size),
            ("object_size", self.object_size),
            ("powerup_size", self.powerup_size),
            ("obstacle_size", self.obstacle_size),
        ];
        for (field, size) in sizes {
            if size <= 0 || size >= self.arena_size {
                return Err(ArenaConfigError::EntitySize { field });
            }
        }
        // A carried orb is centered on its holder and must fit inside it
        if self.object_size > self.player_size {
            return Err(ArenaConfigError::ObjectLargerThanPlayer);
        }
        if self.spawn_inset < 0 || self.spawn_inset + self.player_size > self.arena_size {
            return Err(ArenaConfigError::SpawnOutsideArena);
        }

        if self.base_speed <= 0 || self.penalty_speed < 0 || self.speed_boost < 0 {
            return Err(ArenaConfigError::Speed);
        }
        if self.mud_speed_percent > MAX_SPEED_PERCENT || self.ice_speed_percent > MAX_SPEED_PERCENT {
            return Err(ArenaConfigError::SpeedPercent { max: MAX_SPEED_PERCENT });
        }
        let fastest = (self.base_speed as i64 + self.speed_boost as i64).max(self.penalty_speed as i64);
        let factor = self.mud_speed_percent.max(self.ice_speed_percent).max(100) as i64;
        if fastest * factor / 100 > self.arena_size as i64 {
            return Err(ArenaConfigError::StepTooLong);
        }

        let clearances = [
            ("obstacle_spacing", self.obstacle_spacing),
            ("spawn_clearance", self.spawn_clearance),
            ("object_clearance", self.object_clearance),
            ("powerup_scatter", self.powerup_scatter),
            ("powerup_spawn_clearance", self.powerup_spawn_clearance),
            ("powerup_object_clearance", self.powerup_object_clearance),
            ("powerup_spacing", self.powerup_spacing),
        ];
        for (field, margin) in clearances {
            if margin < 0 || margin > self.arena_size {
                return Err(ArenaConfigError::Clearance { field });
            }
        }
        if self.spawn_clearance <= self.obstacle_spacing {
            return Err(ArenaConfigError::SpawnClearance);
        }

        if self.round_duration_secs == 0 {
            return Err(ArenaConfigError::RoundDuration);
        }
        if self.max_placement_attempts == 0 {
            return Err(ArenaConfigError::PlacementAttempts);
        }
        Ok(())
    }
}

/// Largest supported arena side (px). Keeps every coordinate sum inside Q16.16.
pub const MAX_ARENA_SIZE: i32 = 8_000;

/// Largest terrain speed factor (%).
pub const MAX_SPEED_PERCENT: u32 = 400;

/// Arena settings the engine cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaConfigError {
    #[error("arena_size must be between 1 and {max}")]
    ArenaSize { max: i32 },

    #[error("{field} must be positive and smaller than arena_size")]
    EntitySize { field: &'static str },

    #[error("object_size must not exceed player_size")]
    ObjectLargerThanPlayer,

    #[error("spawn_inset places spawns outside the arena")]
    SpawnOutsideArena,

    #[error("speeds must be non-negative and base_speed positive")]
    Speed,

    #[error("terrain speed percentages must not exceed {max}")]
    SpeedPercent { max: u32 },

    #[error("a single step at full speed must not exceed arena_size")]
    StepTooLong,

    #[error("{field} must be between 0 and arena_size")]
    Clearance { field: &'static str },

    #[error("spawn_clearance must exceed obstacle_spacing")]
    SpawnClearance,

    #[error("round_duration_secs must be positive")]
    RoundDuration,

    #[error("max_placement_attempts must be positive")]
    PlacementAttempts,
}
