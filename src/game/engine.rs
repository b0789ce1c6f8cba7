//! Simulation Engine
//!
//! Pure transitions over [`GameState`]. Every function takes the state by
//! reference and returns a new one; the input is never touched, so a
//! caller can keep, compare or replay any intermediate state.
//!
//! ```text
//!   start_round ──► Playing ──apply_move──► Playing ──step──► ... ──► Ended
//!                     ▲  │                                             │
//!                     └──┘ (no-op when frozen)          (all no-ops) ◄─┘
//! ```

use tracing::{error, warn};
#[cfg(feature = "debug-tracing")]
use tracing::debug;

use crate::core::fixed::{from_int, scale_percent};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::collision::{Aabb, overlaps_other_player, terrain_contact};
use crate::game::config::{ArenaConfig, ObjectPolicy};
use crate::game::events::{BlockReason, GameEvent};
use crate::game::input::{Direction, RecordedInput};
use crate::game::powerup::collect_powerups;
use crate::game::state::{GameState, GameTime, PlayerId, PlayerState, RoundPhase, SharedObject, Terrain};
use crate::game::world::{self, SpawnPoint, WorldGenError};

/// New state plus the events the transition produced.
#[derive(Clone, Debug)]
pub struct Transition {
    /// State after the transition
    pub state: GameState,
    /// Events, in the order they happened
    pub events: Vec<GameEvent>,
}

impl Transition {
    fn unchanged(state: &GameState) -> Self {
        Self {
            state: state.clone(),
            events: Vec::new(),
        }
    }
}

// =============================================================================
// ROUND START
// =============================================================================

/// Build the initial state of a round.
///
/// Players start on `spawns` with score 0 and no effects. The map is
/// generated from `seed`; the same seed and spawns give the same round.
pub fn start_round(
    config: &ArenaConfig,
    spawns: &[SpawnPoint],
    seed: u64,
) -> Result<GameState, WorldGenError> {
    let mut rng = DeterministicRng::new(seed);
    let layout = world::generate(config, spawns, &mut rng)?;

    let mut state = GameState::lobby(config, spawns);
    state.round_seed = seed;
    state.rng = rng;
    state.obstacles = layout.obstacles;
    state.powerups = layout.powerups;
    state.phase = RoundPhase::Playing;

    Ok(state)
}

// =============================================================================
// MOVE
// =============================================================================

/// Apply one movement input.
///
/// Returns an identical state when the round is not running or the mover
/// is frozen.
///
/// # Panics
///
/// If `player_id` is not in the state. Drivers only forward moves of
/// joined players.
pub fn apply_move(
    state: &GameState,
    player_id: PlayerId,
    direction: Direction,
    now: GameTime,
) -> GameState {
    advance_move(state, player_id, direction, now).state
}

/// [`apply_move`] that also reports what happened.
pub fn advance_move(
    state: &GameState,
    player_id: PlayerId,
    direction: Direction,
    now: GameTime,
) -> Transition {
    if !state.started() {
        return Transition::unchanged(state);
    }

    let Some(index) = state.player_index(player_id) else {
        panic!("apply_move: player {player_id} is not part of the round");
    };
    let player = &state.players[index];
    if player.is_frozen(now) {
        return Transition::unchanged(state);
    }

    let config = &state.config;
    let origin = player.position;
    let (target, blocked) = resolve_movement(state, player, direction, now);

    #[cfg(feature = "debug-tracing")]
    debug!(
        player = %player_id,
        from = %origin,
        to = %target,
        ?blocked,
        "resolved move"
    );

    let mut next = state.clone();
    let mut events = Vec::new();

    if let Some(reason) = blocked {
        events.push(GameEvent::move_blocked(now, player_id, reason));
    } else if target != origin {
        next.players[index].position = target;
        events.push(GameEvent::player_moved(now, player_id, origin, target));
    }

    if next.object.holder == Some(player_id) {
        next.object.position = carried_position(config, next.players[index].position);
    }

    events.extend(collect_powerups(&mut next, player_id, now));
    events.extend(touch_object(&mut next, index, now));

    Transition { state: next, events }
}

/// Where the mover ends up, or why it stays put.
///
/// Displacement is `direction × speed` on each axis, clamped to the arena.
/// Walls block unless invincible. The first ice or mud patch under the
/// tentative box rescales the original displacement, and the rescaled
/// position is checked against walls again. Other players always block.
fn resolve_movement(
    state: &GameState,
    player: &PlayerState,
    direction: Direction,
    now: GameTime,
) -> (FixedVec2, Option<BlockReason>) {
    let config = &state.config;
    let size = from_int(config.player_size);
    let max = config.max_coord(config.player_size);
    let invincible = player.is_invincible(now);
    let origin = player.position;

    let speed = player.effective_speed(config, now);
    let displacement = FixedVec2::new(
        speed.saturating_mul(direction.dx() as i32),
        speed.saturating_mul(direction.dy() as i32),
    );

    let mut target = origin.add(displacement).clamp(0, max);

    let contact = terrain_contact(&Aabb::square(target, size), &state.obstacles);
    if contact.wall && !invincible {
        return (origin, Some(BlockReason::Wall));
    }

    if let Some(terrain) = contact.surface {
        let percent = match terrain {
            Terrain::Mud => config.mud_speed_percent,
            Terrain::Ice => config.ice_speed_percent,
            Terrain::Wall => 100,
        };
        target = origin
            .add(displacement.map(|c| scale_percent(c, percent)))
            .clamp(0, max);

        if !invincible && terrain_contact(&Aabb::square(target, size), &state.obstacles).wall {
            return (origin, Some(BlockReason::Wall));
        }
    }

    if overlaps_other_player(state, player.id, &Aabb::square(target, size), config) {
        return (origin, Some(BlockReason::Player));
    }

    (target, None)
}

/// Orb position centered on a holder standing at `holder`.
fn carried_position(config: &ArenaConfig, holder: FixedVec2) -> FixedVec2 {
    let offset = from_int(config.player_size - config.object_size) / 2;
    holder.add(FixedVec2::new(offset, offset))
}

/// Score the orb if the mover at `index` touches it while it is free.
fn touch_object(state: &mut GameState, index: usize, now: GameTime) -> Vec<GameEvent> {
    let player_bounds = state.players[index].bounds(&state.config);
    if state.object.is_held() || !player_bounds.overlaps(&state.object.bounds(&state.config)) {
        return Vec::new();
    }

    let player = &mut state.players[index];
    player.score = player.score.saturating_add(1);
    let player_id = player.id;
    let holder_position = player.position;
    let mut events = vec![GameEvent::object_scored(now, player_id, player.score)];

    match state.config.object_policy {
        ObjectPolicy::Relay => {
            let relocated = world::relocate_object(
                &state.config,
                &state.obstacles,
                &state.powerups,
                &mut state.rng,
            );
            let position = relocated.unwrap_or_else(|| {
                error!(
                    attempts = state.config.max_placement_attempts,
                    "no free spot for the orb, returning it to its spawn"
                );
                world::object_spawn(&state.config)
            });
            state.object = SharedObject::new(position);
            events.push(GameEvent::object_relocated(now, position));
        }
        ObjectPolicy::Carry => {
            state.players[index].has_object = true;
            state.object = SharedObject {
                position: carried_position(&state.config, holder_position),
                holder: Some(player_id),
            };
            events.push(GameEvent::object_carried(now, player_id));
        }
    }

    events
}

// =============================================================================
// CLOCK
// =============================================================================

/// Advance the round clock by one tick.
///
/// No-op unless the round is running. Effects are absolute deadlines, so
/// only the clock moves. Reaching zero ends the round.
pub fn step(state: &GameState, now: GameTime) -> GameState {
    advance_step(state, now).state
}

/// [`step`] that also reports the end of the round.
pub fn advance_step(state: &GameState, now: GameTime) -> Transition {
    if !state.started() {
        return Transition::unchanged(state);
    }

    let mut next = state.clone();
    let mut events = Vec::new();

    next.time_remaining = next.time_remaining.saturating_sub(1);
    if next.time_remaining == 0 {
        events.push(end_round(&mut next, now));
    }

    Transition { state: next, events }
}

/// Freeze the round and pick the winner: highest score, lowest id on ties.
fn end_round(state: &mut GameState, now: GameTime) -> GameEvent {
    state.phase = RoundPhase::Ended;
    state.object.holder = None;
    for player in &mut state.players {
        player.has_object = false;
    }
    state.winner = state.leader();

    if state.players.is_empty() {
        warn!("round ended without players");
    }

    let scores = state.players.iter().map(|p| (p.id, p.score)).collect();
    GameEvent::round_ended(now, state.winner, scores)
}

// =============================================================================
// REPLAY
// =============================================================================

/// Replay a round from its recorded input log.
///
/// Moves of players that are no longer part of the state are skipped.
pub fn replay_round(initial: &GameState, inputs: &[RecordedInput]) -> (GameState, Vec<GameEvent>) {
    let mut state = initial.clone();
    let mut all_events = Vec::new();

    for input in inputs {
        let transition = match *input {
            RecordedInput::Move(intent) => {
                if state.player(intent.player_id).is_none() {
                    continue;
                }
                advance_move(&state, intent.player_id, intent.direction, intent.at)
            }
            RecordedInput::Tick { at } => advance_step(&state, at),
        };
        state = transition.state;
        all_events.extend(transition.events);
    }

    (state, all_events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{to_fixed, Fixed};
    use crate::game::config::DebuffTarget;
    use crate::game::events::GameEventData;
    use crate::game::state::{EffectKind, Obstacle, Powerup, PowerupKind};
    use crate::game::world::default_spawns;

    fn p(id: u8) -> PlayerId {
        PlayerId::new(id)
    }

    /// Running round on an empty map.
    fn open_round(players: usize, config: ArenaConfig) -> GameState {
        let config = ArenaConfig {
            obstacle_count: 0,
            powerups_per_kind: 0,
            ..config
        };
        let spawns = default_spawns(&config, players);
        start_round(&config, &spawns, 42).unwrap()
    }

    fn place_player(state: &mut GameState, id: u8, x: i32, y: i32) {
        let idx = state.player_index(p(id)).unwrap();
        state.players[idx].position = FixedVec2::from_ints(x, y);
    }

    fn add_obstacle(state: &mut GameState, x: i32, y: i32, terrain: Terrain) {
        state.obstacles.push(Obstacle {
            position: FixedVec2::from_ints(x, y),
            size: from_int(60),
            terrain,
        });
    }

    fn position(state: &GameState, id: u8) -> FixedVec2 {
        state.player(p(id)).unwrap().position
    }

    fn x_of(state: &GameState, id: u8) -> Fixed {
        position(state, id).x
    }

    #[test]
    fn test_start_round() {
        let config = ArenaConfig::default();
        let spawns = default_spawns(&config, 4);
        let state = start_round(&config, &spawns, 7).unwrap();

        assert!(state.started());
        assert_eq!(state.round_seed, 7);
        assert_eq!(state.time_remaining, 120);
        assert_eq!(state.players.len(), 4);
        assert!(state.players.iter().all(|pl| pl.score == 0 && !pl.has_object));
        assert_eq!(state.obstacles.len(), 18);
        assert_eq!(state.powerups.len(), 8);
        assert_eq!(state.object.position, world::object_spawn(&config));
        assert!(!state.object.is_held());
        assert_eq!(state.winner, None);

        assert_eq!(start_round(&config, &spawns, 7).unwrap(), state);
    }

    #[test]
    fn test_boundary_clamp_at_corner() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 770, 770);

        let next = apply_move(&state, p(1), Direction::new(1, 1).unwrap(), 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(770, 770));
    }

    #[test]
    fn test_clamp_partial_step() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 2, 100);

        let next = apply_move(&state, p(1), Direction::LEFT, 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(0, 100));
    }

    #[test]
    fn test_diagonal_moves_full_speed_on_both_axes() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);

        let next = apply_move(&state, p(1), Direction::new(1, -1).unwrap(), 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(105, 95));
    }

    #[test]
    fn test_boost_advances_base_plus_boost() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        state.players[0].effects.set_expiry(EffectKind::SpeedBoost, 8_000);

        let next = apply_move(&state, p(1), Direction::RIGHT, 1_000);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(108, 100));

        // Past the deadline the boost is gone without any decay step
        let later = apply_move(&next, p(1), Direction::RIGHT, 8_000);
        assert_eq!(position(&later, 1), FixedVec2::from_ints(113, 100));
    }

    #[test]
    fn test_penalty_overrides_boost() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        state.players[0].effects.set_expiry(EffectKind::SpeedBoost, 5_000);
        state.players[0].effects.set_expiry(EffectKind::SpeedPenalty, 5_000);

        let next = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(102, 100));
    }

    #[test]
    fn test_frozen_move_is_noop() {
        let mut state = open_round(2, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        state.players[0].effects.set_expiry(EffectKind::Freeze, 3_000);

        assert_eq!(apply_move(&state, p(1), Direction::RIGHT, 2_999), state);
        assert_ne!(apply_move(&state, p(1), Direction::RIGHT, 3_000), state);
    }

    #[test]
    fn test_move_before_start_is_noop() {
        let config = ArenaConfig::default();
        let lobby = GameState::lobby(&config, &default_spawns(&config, 2));
        assert_eq!(apply_move(&lobby, p(1), Direction::RIGHT, 0), lobby);
        assert_eq!(step(&lobby, 0), lobby);
    }

    #[test]
    #[should_panic(expected = "not part of the round")]
    fn test_unknown_player_panics() {
        let state = open_round(2, ArenaConfig::default());
        apply_move(&state, p(4), Direction::UP, 0);
    }

    #[test]
    fn test_input_state_untouched() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        let before = state.clone();

        let next = apply_move(&state, p(1), Direction::DOWN, 0);
        assert_eq!(state, before);
        assert_ne!(next, before);
        assert_eq!(next.obstacles, before.obstacles);
        assert_eq!(next.time_remaining, before.time_remaining);
    }

    #[test]
    fn test_wall_blocks_movement() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        add_obstacle(&mut state, 133, 90, Terrain::Wall);

        let result = advance_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(position(&result.state, 1), FixedVec2::from_ints(100, 100));
        assert!(matches!(
            result.events[0].data,
            GameEventData::MoveBlocked { reason: BlockReason::Wall, .. }
        ));
    }

    #[test]
    fn test_invincible_passes_walls() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        add_obstacle(&mut state, 133, 90, Terrain::Wall);
        state.players[0].effects.set_expiry(EffectKind::Invincibility, 5_000);

        let next = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(105, 100));
    }

    #[test]
    fn test_mud_and_ice_scale_displacement() {
        let mut mud = open_round(1, ArenaConfig::default());
        place_player(&mut mud, 1, 100, 100);
        add_obstacle(&mut mud, 133, 90, Terrain::Mud);
        let next = apply_move(&mud, p(1), Direction::RIGHT, 0);
        assert_eq!(x_of(&next, 1), to_fixed(102.5));

        let mut ice = open_round(1, ArenaConfig::default());
        place_player(&mut ice, 1, 100, 100);
        add_obstacle(&mut ice, 133, 90, Terrain::Ice);
        let next = apply_move(&ice, p(1), Direction::RIGHT, 0);
        assert_eq!(x_of(&next, 1), to_fixed(107.5));
    }

    #[test]
    fn test_first_surface_in_order_decides() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        add_obstacle(&mut state, 133, 60, Terrain::Ice);
        add_obstacle(&mut state, 133, 110, Terrain::Mud);

        let next = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(x_of(&next, 1), to_fixed(107.5));
    }

    #[test]
    fn test_ice_into_wall_is_blocked() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        // Tentative box ends at 135: on the ice, short of the wall at 137
        add_obstacle(&mut state, 132, 50, Terrain::Ice);
        add_obstacle(&mut state, 137, 101, Terrain::Wall);

        let next = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(100, 100));
    }

    #[test]
    fn test_players_are_solid() {
        let mut state = open_round(2, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        place_player(&mut state, 2, 133, 100);

        let result = advance_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(position(&result.state, 1), FixedVec2::from_ints(100, 100));
        assert!(matches!(
            result.events[0].data,
            GameEventData::MoveBlocked { reason: BlockReason::Player, .. }
        ));

        // Stopping exactly edge to edge is allowed
        place_player(&mut state, 2, 135, 100);
        let next = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(105, 100));
    }

    #[test]
    fn test_invincible_players_are_still_solid() {
        let mut state = open_round(2, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        place_player(&mut state, 2, 133, 100);
        state.players[0].effects.set_expiry(EffectKind::Invincibility, 5_000);

        let next = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(position(&next, 1), FixedVec2::from_ints(100, 100));
    }

    #[test]
    fn test_slow_penalty_before_and_after_expiry() {
        let config = ArenaConfig {
            debuff_target: DebuffTarget::Collector,
            ..Default::default()
        };
        let mut state = open_round(1, config);
        place_player(&mut state, 1, 100, 100);
        state.powerups.push(Powerup::new(FixedVec2::from_ints(133, 110), PowerupKind::Slow));

        let picked = apply_move(&state, p(1), Direction::RIGHT, 1_000);
        assert!(!picked.powerups[0].active);
        assert_eq!(picked.players[0].effects.speed_penalty, 11_000);
        assert_eq!(x_of(&picked, 1), from_int(105));

        let slowed = apply_move(&picked, p(1), Direction::RIGHT, 10_999);
        assert_eq!(x_of(&slowed, 1), from_int(107));

        let recovered = apply_move(&slowed, p(1), Direction::RIGHT, 11_000);
        assert_eq!(x_of(&recovered, 1), from_int(112));
    }

    #[test]
    fn test_slow_targets_opponents_by_default() {
        let mut state = open_round(2, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        state.powerups.push(Powerup::new(FixedVec2::from_ints(133, 110), PowerupKind::Slow));

        let picked = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(picked.players[0].effects.speed_penalty, 0);
        assert_eq!(picked.players[1].effects.speed_penalty, 10_000);
    }

    #[test]
    fn test_powerup_single_use() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 100, 100);
        state.powerups.push(Powerup::new(FixedVec2::from_ints(110, 110), PowerupKind::Speed));

        let first = advance_move(&state, p(1), Direction::NONE, 0);
        assert!(!first.state.powerups[0].active);
        assert_eq!(first.state.players[0].effects.speed_boost, 8_000);

        let second = advance_move(&first.state, p(1), Direction::NONE, 5_000);
        assert!(!second.state.powerups[0].active);
        assert_eq!(second.state.players[0].effects.speed_boost, 8_000);
        assert!(second.events.is_empty());
    }

    #[test]
    fn test_relay_scores_and_relocates() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 360, 385);
        add_obstacle(&mut state, 600, 600, Terrain::Wall);

        let result = advance_move(&state, p(1), Direction::RIGHT, 0);
        let next = result.state;

        assert_eq!(next.players[0].score, 1);
        assert!(!next.object.is_held());
        assert!(!next.players[0].has_object);
        assert_ne!(next.object.position, state.object.position);
        assert!(!next.object.bounds(&next.config).overlaps(&next.obstacles[0].bounds()));
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::ObjectRelocated { .. })));
    }

    #[test]
    fn test_relay_exhaustion_returns_orb_to_spawn() {
        let config = ArenaConfig {
            max_placement_attempts: 20,
            ..Default::default()
        };
        let mut state = open_round(1, config);
        place_player(&mut state, 1, 365, 385);
        // Ice under the whole arena leaves the orb nowhere to go
        state.obstacles.push(Obstacle {
            position: FixedVec2::from_ints(0, 0),
            size: from_int(800),
            terrain: Terrain::Ice,
        });

        let next = apply_move(&state, p(1), Direction::NONE, 0);
        assert_eq!(next.players[0].score, 1);
        assert_eq!(next.object.position, world::object_spawn(&next.config));
        assert!(!next.object.is_held());
    }

    #[test]
    fn test_carry_holds_and_tracks_holder() {
        let config = ArenaConfig {
            object_policy: ObjectPolicy::Carry,
            ..Default::default()
        };
        let mut state = open_round(2, config);
        place_player(&mut state, 1, 360, 385);

        let carried = apply_move(&state, p(1), Direction::RIGHT, 0);
        assert_eq!(carried.players[0].score, 1);
        assert!(carried.players[0].has_object);
        assert_eq!(carried.object.holder, Some(p(1)));
        assert_eq!(carried.object.position, FixedVec2::from_ints(370, 390));

        let moved = apply_move(&carried, p(1), Direction::DOWN, 100);
        assert_eq!(moved.object.position, FixedVec2::from_ints(370, 395));
        // Held orb cannot be scored again
        assert_eq!(moved.players[0].score, 1);
    }

    #[test]
    fn test_score_is_monotonic_across_moves() {
        let mut state = open_round(1, ArenaConfig::default());
        place_player(&mut state, 1, 360, 385);
        let mut last = 0;
        for t in 0..200u64 {
            let dir = if t % 2 == 0 { Direction::RIGHT } else { Direction::LEFT };
            state = apply_move(&state, p(1), dir, t);
            assert!(state.players[0].score >= last);
            last = state.players[0].score;
        }
    }

    #[test]
    fn test_step_counts_down_and_ends_round() {
        let config = ArenaConfig {
            round_duration_secs: 3,
            ..Default::default()
        };
        let mut state = open_round(3, config);
        state.players[1].score = 4;
        state.players[2].score = 4;

        state = step(&state, 1_000);
        assert_eq!(state.time_remaining, 2);
        state = step(&state, 2_000);
        assert!(state.started());

        let result = advance_step(&state, 3_000);
        let ended = result.state;
        assert_eq!(ended.time_remaining, 0);
        assert!(ended.is_ended());
        assert_eq!(ended.winner, Some(p(2)));
        assert!(matches!(
            result.events[0].data,
            GameEventData::RoundEnded { winner_id: Some(id), .. } if id == p(2)
        ));

        // Terminal: every transition is an identity
        assert_eq!(step(&ended, 4_000), ended);
        assert_eq!(apply_move(&ended, p(1), Direction::RIGHT, 4_000), ended);
    }

    #[test]
    fn test_end_round_releases_carried_orb() {
        let config = ArenaConfig {
            round_duration_secs: 1,
            object_policy: ObjectPolicy::Carry,
            ..Default::default()
        };
        let mut state = open_round(1, config);
        place_player(&mut state, 1, 365, 385);
        state = apply_move(&state, p(1), Direction::NONE, 0);
        assert!(state.object.is_held());

        let ended = step(&state, 1_000);
        assert!(!ended.object.is_held());
        assert!(!ended.players[0].has_object);
        assert_eq!(ended.winner, Some(p(1)));
    }

    #[test]
    fn test_round_without_players_has_no_winner() {
        let config = ArenaConfig {
            round_duration_secs: 1,
            ..Default::default()
        };
        let mut state = open_round(1, config);
        state.remove_player(p(1));

        let ended = step(&state, 0);
        assert!(ended.is_ended());
        assert_eq!(ended.winner, None);
    }

    #[test]
    fn test_replay_determinism() {
        let config = ArenaConfig::default();
        let spawns = default_spawns(&config, 4);
        let initial = start_round(&config, &spawns, 99_999).unwrap();

        let mut inputs = Vec::new();
        for t in 0..300u64 {
            let id = (t % 4) as u8 + 1;
            let dir = Direction::new((t % 3) as i8 - 1, ((t / 3) % 3) as i8 - 1).unwrap();
            inputs.push(RecordedInput::movement(p(id), dir, t * 50));
            if t % 20 == 19 {
                inputs.push(RecordedInput::tick(t * 50));
            }
        }

        let (final1, events1) = replay_round(&initial, &inputs);
        let (final2, events2) = replay_round(&initial, &inputs);

        assert_eq!(final1.compute_hash(), final2.compute_hash());
        assert_eq!(final1, final2);
        assert_eq!(events1, events2);
        assert_ne!(final1.compute_hash(), initial.compute_hash());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn direction() -> impl Strategy<Value = Direction> {
            (-1i8..=1, -1i8..=1).prop_map(|(dx, dy)| Direction::new(dx, dy).unwrap())
        }

        proptest! {
            #[test]
            fn positions_stay_in_bounds_and_players_stay_apart(
                seed in 0u64..200,
                moves in proptest::collection::vec((1u8..=4, direction()), 1..200)
            ) {
                let config = ArenaConfig::default();
                let spawns = default_spawns(&config, 4);
                let mut state = start_round(&config, &spawns, seed).unwrap();
                let max = config.max_coord(config.player_size);
                let mut scores: Vec<u32> = vec![0; 4];

                for (t, (id, dir)) in moves.into_iter().enumerate() {
                    state = apply_move(&state, PlayerId::new(id), dir, t as u64 * 100);

                    for (i, player) in state.players.iter().enumerate() {
                        prop_assert!(player.position.x >= 0 && player.position.x <= max);
                        prop_assert!(player.position.y >= 0 && player.position.y <= max);
                        prop_assert!(player.score >= scores[i]);
                        scores[i] = player.score;
                    }

                    for (i, a) in state.players.iter().enumerate() {
                        for b in &state.players[i + 1..] {
                            prop_assert!(!a.bounds(&config).overlaps(&b.bounds(&config)));
                        }
                    }
                }
            }

            #[test]
            fn frozen_players_never_change_state(
                seed in 0u64..100,
                dir in direction(),
                now in 0u64..3_000
            ) {
                let config = ArenaConfig::default();
                let spawns = default_spawns(&config, 2);
                let mut state = start_round(&config, &spawns, seed).unwrap();
                state.players[0].effects.set_expiry(EffectKind::Freeze, 3_000);

                prop_assert_eq!(apply_move(&state, PlayerId::new(1), dir, now), state);
            }
        }
    }
}
