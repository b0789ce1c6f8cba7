//! Game State Definitions
//!
//! The round state is a plain value: transitions clone it, change the
//! clone and hand it back, so any two states can be compared with `==`.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, from_int};
use crate::core::vec2::FixedVec2;
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::collision::Aabb;
use crate::game::config::ArenaConfig;
use crate::game::world::{SpawnPoint, object_spawn};

/// Time reference handed to the engine, in milliseconds.
///
/// The driver picks the epoch; the engine only compares values.
pub type GameTime = u64;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Stable small player identifier (1..=4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Create from a raw id.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw id.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Presentation color of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PlayerColor {
    Red = 0,
    Purple = 1,
    Blue = 2,
    Green = 3,
}

// =============================================================================
// POWERUP EFFECTS
// =============================================================================

/// Timed status a powerup grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    SpeedBoost,
    SpeedPenalty,
    Freeze,
    Invincibility,
}

/// Absolute expiry time of each effect; 0 means inactive.
///
/// An effect is active while `now < expiry`. Picking up the same kind
/// again overwrites the expiry instead of stacking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerupEffects {
    pub speed_boost: GameTime,
    pub speed_penalty: GameTime,
    pub freeze: GameTime,
    pub invincibility: GameTime,
}

impl PowerupEffects {
    /// Expiry of one effect.
    pub fn expiry(&self, kind: EffectKind) -> GameTime {
        match kind {
            EffectKind::SpeedBoost => self.speed_boost,
            EffectKind::SpeedPenalty => self.speed_penalty,
            EffectKind::Freeze => self.freeze,
            EffectKind::Invincibility => self.invincibility,
        }
    }

    /// Overwrite the expiry of one effect.
    pub fn set_expiry(&mut self, kind: EffectKind, expiry: GameTime) {
        let slot = match kind {
            EffectKind::SpeedBoost => &mut self.speed_boost,
            EffectKind::SpeedPenalty => &mut self.speed_penalty,
            EffectKind::Freeze => &mut self.freeze,
            EffectKind::Invincibility => &mut self.invincibility,
        };
        *slot = expiry;
    }

    /// Is the effect active at `now`?
    #[inline]
    pub fn is_active(&self, kind: EffectKind, now: GameTime) -> bool {
        now < self.expiry(kind)
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Player identifier
    pub id: PlayerId,

    /// Top-left corner of the player square
    pub position: FixedVec2,

    /// Speed without effects
    pub base_speed: Fixed,

    /// Orbs scored this round
    pub score: u32,

    /// Presentation color
    pub color: PlayerColor,

    /// Is this player carrying the orb?
    pub has_object: bool,

    /// Active powerup effects
    pub effects: PowerupEffects,
}

impl PlayerState {
    /// Create a new player at its spawn.
    pub fn new(id: PlayerId, position: FixedVec2, color: PlayerColor, base_speed: Fixed) -> Self {
        Self {
            id,
            position,
            base_speed,
            score: 0,
            color,
            has_object: false,
            effects: PowerupEffects::default(),
        }
    }

    /// Fresh player standing on `spawn`.
    pub fn at_spawn(spawn: &SpawnPoint, config: &ArenaConfig) -> Self {
        Self::new(spawn.player_id, spawn.position, spawn.color, from_int(config.base_speed))
    }

    /// Bounding box of this player.
    #[inline]
    pub fn bounds(&self, config: &ArenaConfig) -> Aabb {
        Aabb::square(self.position, from_int(config.player_size))
    }

    /// Movement per input at `now`.
    ///
    /// A boost adds `speed_boost` to the base speed. A penalty replaces the
    /// speed with `penalty_speed` and wins over a simultaneous boost.
    pub fn effective_speed(&self, config: &ArenaConfig, now: GameTime) -> Fixed {
        if self.effects.is_active(EffectKind::SpeedPenalty, now) {
            return from_int(config.penalty_speed);
        }
        let mut speed = self.base_speed;
        if self.effects.is_active(EffectKind::SpeedBoost, now) {
            speed = speed.saturating_add(from_int(config.speed_boost));
        }
        speed
    }

    /// Is the player frozen at `now`?
    #[inline]
    pub fn is_frozen(&self, now: GameTime) -> bool {
        self.effects.is_active(EffectKind::Freeze, now)
    }

    /// Is the player invincible at `now`?
    #[inline]
    pub fn is_invincible(&self, now: GameTime) -> bool {
        self.effects.is_active(EffectKind::Invincibility, now)
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.id.0);
        hasher.update_vec2(self.position);
        hasher.update_fixed(self.base_speed);
        hasher.update_u32(self.score);
        hasher.update_u8(self.color as u8);
        hasher.update_bool(self.has_object);
        hasher.update_u64(self.effects.speed_boost);
        hasher.update_u64(self.effects.speed_penalty);
        hasher.update_u64(self.effects.freeze);
        hasher.update_u64(self.effects.invincibility);
    }
}

// =============================================================================
// SHARED OBJECT
// =============================================================================

/// The orb every player races for.
///
/// `is_held()` is derived from `holder`, so the two can never disagree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedObject {
    /// Top-left corner of the orb square
    pub position: FixedVec2,

    /// Player carrying the orb
    pub holder: Option<PlayerId>,
}

impl SharedObject {
    /// Free orb at `position`.
    pub fn new(position: FixedVec2) -> Self {
        Self { position, holder: None }
    }

    /// Is someone carrying the orb?
    #[inline]
    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    /// Bounding box of the orb.
    #[inline]
    pub fn bounds(&self, config: &ArenaConfig) -> Aabb {
        Aabb::square(self.position, from_int(config.object_size))
    }
}

// =============================================================================
// OBSTACLES
// =============================================================================

/// Obstacle terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Terrain {
    /// Speeds movement up
    Ice = 0,
    /// Slows movement down
    Mud = 1,
    /// Blocks movement unless invincible
    Wall = 2,
}

impl Terrain {
    /// Every terrain, in generation order.
    pub const ALL: [Terrain; 3] = [Terrain::Ice, Terrain::Mud, Terrain::Wall];
}

/// Square terrain patch, immutable for the round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Top-left corner
    pub position: FixedVec2,
    /// Side length
    pub size: Fixed,
    /// Terrain type
    pub terrain: Terrain,
}

impl Obstacle {
    /// Bounding box of the obstacle.
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::square(self.position, self.size)
    }
}

// =============================================================================
// POWERUPS
// =============================================================================

/// Powerup kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PowerupKind {
    Speed = 0,
    Slow = 1,
    Freeze = 2,
    Invincible = 3,
}

impl PowerupKind {
    /// Every kind, in generation order.
    pub const ALL: [PowerupKind; 4] = [
        PowerupKind::Speed,
        PowerupKind::Slow,
        PowerupKind::Freeze,
        PowerupKind::Invincible,
    ];

    /// Effect this powerup grants.
    pub fn effect(self) -> EffectKind {
        match self {
            PowerupKind::Speed => EffectKind::SpeedBoost,
            PowerupKind::Slow => EffectKind::SpeedPenalty,
            PowerupKind::Freeze => EffectKind::Freeze,
            PowerupKind::Invincible => EffectKind::Invincibility,
        }
    }

    /// Does this powerup hurt whoever receives it?
    pub fn is_debuff(self) -> bool {
        matches!(self, PowerupKind::Slow | PowerupKind::Freeze)
    }
}

/// Single-use pickup. Collected powerups stay in place, inactive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Powerup {
    /// Top-left corner
    pub position: FixedVec2,
    /// Kind of powerup
    pub kind: PowerupKind,
    /// False once collected
    pub active: bool,
}

impl Powerup {
    /// Fresh, collectable powerup.
    pub fn new(position: FixedVec2, kind: PowerupKind) -> Self {
        Self { position, kind, active: true }
    }

    /// Bounding box of the powerup.
    #[inline]
    pub fn bounds(&self, config: &ArenaConfig) -> Aabb {
        Aabb::square(self.position, from_int(config.powerup_size))
    }
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Lifecycle of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Lobby, players gathering
    #[default]
    Waiting,
    /// Clock running, moves accepted
    Playing,
    /// Clock ran out, winner decided
    Ended,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete state of a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Gameplay constants for this round
    #[serde(skip)]
    pub config: ArenaConfig,

    /// Seed the round was generated from
    pub round_seed: u64,

    /// RNG for in-round randomness (orb relocation)
    #[serde(skip)]
    pub rng: DeterministicRng,

    /// Players, sorted by id
    pub players: Vec<PlayerState>,

    /// The orb
    pub object: SharedObject,

    /// Terrain obstacles
    pub obstacles: Vec<Obstacle>,

    /// Powerups, collected ones included
    pub powerups: Vec<Powerup>,

    /// Ticks left on the round clock
    pub time_remaining: u32,

    /// Current phase
    pub phase: RoundPhase,

    /// Winner, set once when the clock runs out
    pub winner: Option<PlayerId>,
}

impl GameState {
    /// Pre-round state: players on their spawns, empty map, clock full.
    pub fn lobby(config: &ArenaConfig, spawns: &[SpawnPoint]) -> Self {
        let mut state = Self {
            config: config.clone(),
            round_seed: 0,
            rng: DeterministicRng::default(),
            players: Vec::with_capacity(spawns.len()),
            object: SharedObject::new(object_spawn(config)),
            obstacles: Vec::new(),
            powerups: Vec::new(),
            time_remaining: config.round_duration_secs,
            phase: RoundPhase::Waiting,
            winner: None,
        };
        for spawn in spawns {
            state.insert_player(PlayerState::at_spawn(spawn, config));
        }
        state
    }

    /// Has the round started and not yet ended?
    #[inline]
    pub fn started(&self) -> bool {
        self.phase == RoundPhase::Playing
    }

    /// Has the round clock run out?
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.phase == RoundPhase::Ended
    }

    /// Index of a player in `players`.
    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.binary_search_by_key(&id, |p| p.id).ok()
    }

    /// Get a player by ID.
    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.player_index(id).map(|idx| &self.players[idx])
    }

    /// Insert a player, keeping id order. Replaces an existing entry.
    pub fn insert_player(&mut self, player: PlayerState) {
        match self.players.binary_search_by_key(&player.id, |p| p.id) {
            Ok(idx) => self.players[idx] = player,
            Err(idx) => self.players.insert(idx, player),
        }
    }

    /// Remove a player, releasing the orb if they carried it.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        let idx = self.player_index(id)?;
        if self.object.holder == Some(id) {
            self.object.holder = None;
        }
        Some(self.players.remove(idx))
    }

    /// Highest score, ties going to the lowest id.
    pub fn leader(&self) -> Option<PlayerId> {
        // Players are sorted by id; keep the first one seen at each score
        self.players
            .iter()
            .fold(None, |best: Option<&PlayerState>, p| match best {
                Some(b) if b.score >= p.score => Some(b),
                _ => Some(p),
            })
            .map(|p| p.id)
    }

    /// Compute hash of the current state for replay verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.round_seed, self.time_remaining, |hasher| {
            for player in &self.players {
                player.hash_into(hasher);
            }

            hasher.update_vec2(self.object.position);
            hasher.update_opt_u8(self.object.holder.map(PlayerId::get));

            for obstacle in &self.obstacles {
                hasher.update_vec2(obstacle.position);
                hasher.update_fixed(obstacle.size);
                hasher.update_u8(obstacle.terrain as u8);
            }

            for powerup in &self.powerups {
                hasher.update_vec2(powerup.position);
                hasher.update_u8(powerup.kind as u8);
                hasher.update_bool(powerup.active);
            }

            hasher.update_u8(self.phase as u8);
            hasher.update_opt_u8(self.winner.map(PlayerId::get));
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u8, score: u32) -> PlayerState {
        let mut p = PlayerState::new(
            PlayerId::new(id),
            FixedVec2::ZERO,
            PlayerColor::Red,
            from_int(5),
        );
        p.score = score;
        p
    }

    fn empty_state() -> GameState {
        GameState::lobby(&ArenaConfig::default(), &[])
    }

    #[test]
    fn test_effect_activity_is_absolute_deadline() {
        let mut effects = PowerupEffects::default();
        assert!(!effects.is_active(EffectKind::Freeze, 0));

        effects.set_expiry(EffectKind::Freeze, 3_000);
        assert!(effects.is_active(EffectKind::Freeze, 0));
        assert!(effects.is_active(EffectKind::Freeze, 2_999));
        assert!(!effects.is_active(EffectKind::Freeze, 3_000));
        assert!(!effects.is_active(EffectKind::SpeedBoost, 0));
    }

    #[test]
    fn test_new_pickup_overwrites_expiry() {
        let mut effects = PowerupEffects::default();
        effects.set_expiry(EffectKind::SpeedBoost, 10_000);
        effects.set_expiry(EffectKind::SpeedBoost, 4_000);
        assert_eq!(effects.expiry(EffectKind::SpeedBoost), 4_000);
    }

    #[test]
    fn test_penalty_takes_precedence_over_boost() {
        let config = ArenaConfig::default();
        let mut p = player(1, 0);

        assert_eq!(p.effective_speed(&config, 0), from_int(5));

        p.effects.set_expiry(EffectKind::SpeedBoost, 1_000);
        assert_eq!(p.effective_speed(&config, 0), from_int(8));

        p.effects.set_expiry(EffectKind::SpeedPenalty, 1_000);
        assert_eq!(p.effective_speed(&config, 0), from_int(2));

        // Both expired
        assert_eq!(p.effective_speed(&config, 1_000), from_int(5));
    }

    #[test]
    fn test_lobby_places_players_on_spawns() {
        let config = ArenaConfig::default();
        let spawns = crate::game::world::default_spawns(&config, 2);
        let state = GameState::lobby(&config, &spawns);

        assert_eq!(state.phase, RoundPhase::Waiting);
        assert!(!state.started());
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.players[1].position, spawns[1].position);
        assert_eq!(state.players[1].color, PlayerColor::Purple);
        assert_eq!(state.players[0].base_speed, from_int(5));
        assert_eq!(state.time_remaining, 120);
        assert!(state.obstacles.is_empty() && state.powerups.is_empty());
    }

    #[test]
    fn test_player_ordering_on_insert() {
        let mut state = empty_state();
        state.insert_player(player(3, 0));
        state.insert_player(player(1, 0));
        state.insert_player(player(2, 0));

        let ids: Vec<u8> = state.players.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(state.player_index(PlayerId::new(2)), Some(1));
        assert!(state.player(PlayerId::new(4)).is_none());
    }

    #[test]
    fn test_remove_player_releases_object() {
        let mut state = empty_state();
        state.insert_player(player(1, 0));
        state.insert_player(player(2, 0));
        state.object.holder = Some(PlayerId::new(2));

        let removed = state.remove_player(PlayerId::new(2));
        assert!(removed.is_some());
        assert!(!state.object.is_held());
        assert_eq!(state.players.len(), 1);
        assert!(state.remove_player(PlayerId::new(9)).is_none());
    }

    #[test]
    fn test_leader_tie_break_lowest_id() {
        let mut state = empty_state();
        assert_eq!(state.leader(), None);

        state.insert_player(player(1, 2));
        state.insert_player(player(2, 5));
        state.insert_player(player(3, 5));
        assert_eq!(state.leader(), Some(PlayerId::new(2)));

        state.players[2].score = 6;
        assert_eq!(state.leader(), Some(PlayerId::new(3)));
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut state = empty_state();
        state.insert_player(player(1, 0));
        let before = state.compute_hash();
        assert_eq!(before, state.clone().compute_hash());

        state.players[0].score = 1;
        assert_ne!(before, state.compute_hash());
    }

    #[test]
    fn test_powerup_effect_mapping() {
        assert_eq!(PowerupKind::Speed.effect(), EffectKind::SpeedBoost);
        assert_eq!(PowerupKind::Slow.effect(), EffectKind::SpeedPenalty);
        assert_eq!(PowerupKind::Freeze.effect(), EffectKind::Freeze);
        assert_eq!(PowerupKind::Invincible.effect(), EffectKind::Invincibility);
        assert!(PowerupKind::Slow.is_debuff());
        assert!(!PowerupKind::Invincible.is_debuff());
    }
}
