//! Arena Session Management
//!
//! One arena, up to four players, one round at a time. The session owns
//! the [`GameState`] and is the only place transitions are applied, so
//! moves and clock ticks never interleave.

use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::core::rng::derive_round_seed;
use crate::game::config::ArenaConfig;
use crate::game::engine::{self, advance_move, advance_step};
use crate::game::events::GameEvent;
use crate::game::input::RecordedInput;
use crate::game::state::{GameState, GameTime, PlayerId, RoundPhase};
use crate::game::world::{self, MAX_PLAYERS, SpawnPoint, WorldGenError};
use crate::network::protocol::{ErrorCode, GameSnapshot, MoveRequest, ServerMessage};

/// Unique round identifier.
pub type RoundId = [u8; 16];

/// Configuration for an arena session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum players in the arena.
    pub max_players: usize,
    /// Gameplay configuration of every round.
    pub arena: ArenaConfig,
    /// Keep the input log and check the replay hash when a round ends.
    pub verify_replay: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS,
            arena: ArenaConfig::default(),
            verify_replay: true,
        }
    }
}

/// A player connected to the session.
#[derive(Debug)]
pub struct SessionPlayer {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Where the player starts each round.
    pub spawn: SpawnPoint,
    /// Message channel to this player.
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Result of a clock tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Did the clock move?
    pub advanced: bool,
    /// Did the round end on this tick?
    pub round_ended: bool,
    /// Winner, when the round ended.
    pub winner: Option<PlayerId>,
    /// Events of the tick.
    pub events: Vec<GameEvent>,
}

/// The arena session.
pub struct ArenaSession {
    /// Session configuration.
    pub config: SessionConfig,
    /// Connected players.
    players: BTreeMap<PlayerId, SessionPlayer>,
    /// Current game state.
    state: GameState,
    /// Current round identifier.
    round_id: Option<RoundId>,
    /// State the current round started from.
    round_start: Option<GameState>,
    /// Inputs applied since the round started.
    input_log: Vec<RecordedInput>,
    /// Time origin of `now()`.
    epoch: Instant,
}

impl ArenaSession {
    /// Create a new session with an empty lobby.
    pub fn new(config: SessionConfig) -> Self {
        let state = GameState::lobby(&config.arena, &[]);
        Self {
            config,
            players: BTreeMap::new(),
            state,
            round_id: None,
            round_start: None,
            input_log: Vec::new(),
            epoch: Instant::now(),
        }
    }

    /// Milliseconds since the session was created.
    pub fn now(&self) -> GameTime {
        self.epoch.elapsed().as_millis() as GameTime
    }

    /// Current game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Current round identifier.
    pub fn round_id(&self) -> Option<RoundId> {
        self.round_id
    }

    /// Number of connected players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Is every seat taken?
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players.min(MAX_PLAYERS)
    }

    /// The player allowed to start rounds: lowest connected id.
    pub fn host(&self) -> Option<PlayerId> {
        self.players.keys().next().copied()
    }

    /// Inputs applied in the current round.
    pub fn input_log(&self) -> &[RecordedInput] {
        &self.input_log
    }

    /// Add a player, taking the lowest free id and its spawn.
    pub fn join(&mut self, sender: mpsc::Sender<ServerMessage>) -> Result<PlayerId, SessionError> {
        if self.is_full() {
            return Err(SessionError::SessionFull);
        }
        if self.state.started() {
            return Err(SessionError::RoundInProgress);
        }

        let limit = self.config.max_players.min(MAX_PLAYERS) as u8;
        let player_id = (1..=limit)
            .map(PlayerId::new)
            .find(|id| !self.players.contains_key(id))
            .ok_or(SessionError::SessionFull)?;
        let spawn = world::spawn_for(&self.config.arena, player_id)
            .ok_or(SessionError::SessionFull)?;

        self.players.insert(player_id, SessionPlayer { player_id, spawn, sender });

        // A finished round keeps its board; new players only show up in the lobby
        if self.state.phase == RoundPhase::Waiting {
            self.reset_lobby();
        }

        info!(player = %player_id, players = self.players.len(), "player joined");
        Ok(player_id)
    }

    /// Remove a player. Returns false if they were not connected.
    ///
    /// Their carried orb is released. With nobody left the arena goes
    /// back to an empty lobby.
    pub fn leave(&mut self, player_id: PlayerId) -> bool {
        if self.players.remove(&player_id).is_none() {
            return false;
        }
        self.state.remove_player(player_id);
        info!(player = %player_id, players = self.players.len(), "player left");

        // Departures are not part of the input log
        if self.state.started() {
            self.round_start = None;
        }

        if self.players.is_empty() {
            if self.state.started() {
                info!("all players left, round abandoned");
            }
            self.round_id = None;
            self.round_start = None;
            self.input_log.clear();
            self.reset_lobby();
        }
        true
    }

    fn spawns(&self) -> Vec<SpawnPoint> {
        self.players.values().map(|p| p.spawn).collect()
    }

    fn reset_lobby(&mut self) {
        self.state = GameState::lobby(&self.config.arena, &self.spawns());
    }

    /// Start a new round on behalf of `requester`.
    ///
    /// Only the host may start, and not while a round is running. An
    /// ended round can be restarted.
    pub fn start_round(&mut self, requester: PlayerId) -> Result<GameEvent, SessionError> {
        if self.host() != Some(requester) {
            return Err(SessionError::NotHost);
        }
        if self.state.started() {
            return Err(SessionError::RoundInProgress);
        }

        let round_id = uuid::Uuid::new_v4().into_bytes();
        let player_ids: Vec<u8> = self.players.keys().map(|id| id.get()).collect();
        let seed = derive_round_seed(&round_id, &player_ids);

        let state = engine::start_round(&self.config.arena, &self.spawns(), seed)?;

        info!(
            round = %uuid::Uuid::from_bytes(round_id),
            seed,
            players = player_ids.len(),
            "round started"
        );

        self.round_id = Some(round_id);
        if self.config.verify_replay {
            self.round_start = Some(state.clone());
        }
        self.input_log.clear();
        self.state = state;

        let players = self.players.keys().copied().collect();
        Ok(GameEvent::round_started(self.now(), seed, players))
    }

    /// Apply a move sent by the connection owning `sender_id`.
    pub fn handle_move(
        &mut self,
        sender_id: PlayerId,
        request: &MoveRequest,
        now: GameTime,
    ) -> Result<Vec<GameEvent>, SessionError> {
        if request.player_id != sender_id.get() {
            return Err(SessionError::Unauthorized {
                sender: sender_id,
                target: request.player_id,
            });
        }
        let direction = request.direction().ok_or(SessionError::InvalidDirection)?;
        if self.state.player(sender_id).is_none() {
            return Err(SessionError::PlayerNotFound);
        }

        let transition = advance_move(&self.state, sender_id, direction, now);
        if self.state.started() && self.config.verify_replay {
            self.input_log.push(RecordedInput::movement(sender_id, direction, now));
        }
        self.state = transition.state;

        for event in &transition.events {
            debug!(?event, "move event");
        }
        Ok(transition.events)
    }

    /// Advance the round clock.
    pub fn tick(&mut self, now: GameTime) -> TickOutcome {
        if !self.state.started() {
            return TickOutcome::default();
        }

        let transition = advance_step(&self.state, now);
        if self.config.verify_replay {
            self.input_log.push(RecordedInput::tick(now));
        }
        self.state = transition.state;

        let round_ended = self.state.is_ended();
        if round_ended {
            info!(
                winner = ?self.state.winner.map(|id| id.get()),
                hash = %hex::encode(self.state.compute_hash()),
                "round ended"
            );
            self.verify_round();
        }

        TickOutcome {
            advanced: true,
            round_ended,
            winner: self.state.winner,
            events: transition.events,
        }
    }

    /// Replay the round from its input log and compare final hashes.
    ///
    /// Returns `None` when no log was kept.
    pub fn verify_round(&self) -> Option<bool> {
        let start = self.round_start.as_ref()?;
        let (replayed, _) = engine::replay_round(start, &self.input_log);
        let matches = replayed.compute_hash() == self.state.compute_hash();
        if !matches {
            warn!(inputs = self.input_log.len(), "round replay diverged from live state");
        }
        Some(matches)
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self, now: GameTime) -> GameSnapshot {
        GameSnapshot::from_state(&self.state, now)
    }

    /// Queue a message for every connected player without waiting.
    ///
    /// A player whose queue is full misses this message; a closed queue
    /// belongs to a connection that is already shutting down.
    pub fn broadcast(&self, message: ServerMessage) {
        for player in self.players.values() {
            match player.sender.try_send(message.clone()) {
                Ok(()) | Err(TrySendError::Closed(_)) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(player = %player.player_id, "send queue full, dropping message");
                }
            }
        }
    }

    /// Broadcast the current state.
    pub fn broadcast_state(&self) {
        self.broadcast(ServerMessage::update(&self.state, self.now()));
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Every seat is taken.
    #[error("Game is full")]
    SessionFull,

    /// Only the host may start rounds.
    #[error("Only the host can start the game")]
    NotHost,

    /// A round is running.
    #[error("Round in progress")]
    RoundInProgress,

    /// Tried to move another player.
    #[error("Player {sender} may not move player {target}")]
    Unauthorized { sender: PlayerId, target: u8 },

    /// dx/dy outside {-1, 0, 1} or unknown direction name.
    #[error("Invalid direction")]
    InvalidDirection,

    /// Player is not part of the game state.
    #[error("Player not found")]
    PlayerNotFound,

    /// Map generation failed.
    #[error("World generation failed: {0}")]
    WorldGen(#[from] WorldGenError),
}

impl SessionError {
    /// Wire error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::SessionFull => ErrorCode::SessionFull,
            SessionError::NotHost => ErrorCode::NotHost,
            SessionError::RoundInProgress => ErrorCode::RoundInProgress,
            SessionError::Unauthorized { .. } => ErrorCode::Unauthorized,
            SessionError::InvalidDirection | SessionError::PlayerNotFound => ErrorCode::InvalidInput,
            SessionError::WorldGen(_) => ErrorCode::InternalError,
        }
    }

    /// Error message for the client.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Direction;

    fn create_test_session() -> ArenaSession {
        ArenaSession::new(SessionConfig::default())
    }

    fn join(session: &mut ArenaSession) -> (PlayerId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(64);
        (session.join(tx).unwrap(), rx)
    }

    #[tokio::test]
    async fn test_join_takes_lowest_free_id() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        let (p2, _r2) = join(&mut session);
        let (p3, _r3) = join(&mut session);
        assert_eq!((p1.get(), p2.get(), p3.get()), (1, 2, 3));

        assert!(session.leave(p2));
        let (again, _r) = join(&mut session);
        assert_eq!(again, PlayerId::new(2));
        assert_eq!(session.state().players.len(), 3);
    }

    #[tokio::test]
    async fn test_session_full() {
        let mut session = create_test_session();
        let _receivers: Vec<_> = (0..4).map(|_| join(&mut session).1).collect();

        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(session.join(tx), Err(SessionError::SessionFull));
        assert_eq!(SessionError::SessionFull.to_string(), "Game is full");
    }

    #[tokio::test]
    async fn test_only_host_starts() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        let (p2, _r2) = join(&mut session);

        assert_eq!(session.host(), Some(p1));
        assert_eq!(session.start_round(p2), Err(SessionError::NotHost));

        let event = session.start_round(p1).unwrap();
        assert!(session.state().started());
        assert!(session.round_id().is_some());
        assert_eq!(event.player_id(), None);

        assert_eq!(session.start_round(p1), Err(SessionError::RoundInProgress));
    }

    #[tokio::test]
    async fn test_host_passes_to_lowest_remaining() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        let (p2, _r2) = join(&mut session);

        session.leave(p1);
        assert_eq!(session.host(), Some(p2));
        assert!(session.start_round(p2).is_ok());
    }

    #[tokio::test]
    async fn test_move_authorization() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        let (_p2, _r2) = join(&mut session);
        session.start_round(p1).unwrap();

        let err = session.handle_move(p1, &MoveRequest::new(2, 1, 0), 0).unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized { target: 2, .. }));
        assert_eq!(err.code(), ErrorCode::Unauthorized);

        let err = session.handle_move(p1, &MoveRequest::new(1, 3, 0), 0).unwrap_err();
        assert_eq!(err, SessionError::InvalidDirection);
    }

    #[tokio::test]
    async fn test_move_updates_state_and_log() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        session.start_round(p1).unwrap();

        let before = session.state().player(p1).unwrap().position;
        session.handle_move(p1, &MoveRequest::new(1, 1, 0), 10).unwrap();
        let after = session.state().player(p1).unwrap().position;

        // Spawns are kept clear, so the first step is never blocked
        assert!(after.x > before.x);
        assert_eq!(
            session.input_log(),
            &[RecordedInput::movement(p1, Direction::RIGHT, 10)]
        );
    }

    #[tokio::test]
    async fn test_moves_ignored_before_start() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);

        let before = session.state().clone();
        let events = session.handle_move(p1, &MoveRequest::new(1, 1, 0), 0).unwrap();
        assert!(events.is_empty());
        assert_eq!(session.state(), &before);
        assert!(session.input_log().is_empty());
    }

    #[tokio::test]
    async fn test_tick_runs_round_to_end_and_verifies() {
        let config = SessionConfig {
            arena: ArenaConfig {
                round_duration_secs: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut session = ArenaSession::new(config);
        let (p1, _r1) = join(&mut session);
        let (p2, _r2) = join(&mut session);
        session.start_round(p1).unwrap();

        session.handle_move(p1, &MoveRequest::new(1, 1, 1), 100).unwrap();
        assert!(!session.tick(1_000).round_ended);
        session.handle_move(p2, &MoveRequest::new(2, -1, 0), 1_100).unwrap();
        assert!(!session.tick(2_000).round_ended);

        let outcome = session.tick(3_000);
        assert!(outcome.round_ended);
        assert!(session.state().is_ended());
        assert_eq!(outcome.winner, Some(p1));
        assert_eq!(session.verify_round(), Some(true));

        // Clock no longer moves, and a new round can be started
        assert!(!session.tick(4_000).advanced);
        assert!(session.start_round(p1).is_ok());
    }

    #[tokio::test]
    async fn test_join_rejected_mid_round() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        session.start_round(p1).unwrap();

        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(session.join(tx), Err(SessionError::RoundInProgress));
    }

    #[tokio::test]
    async fn test_last_leave_resets_to_lobby() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        session.start_round(p1).unwrap();

        assert!(session.leave(p1));
        assert!(!session.leave(p1));
        assert_eq!(session.state().phase, RoundPhase::Waiting);
        assert!(session.state().players.is_empty());
        assert!(session.round_id().is_none());
    }

    #[tokio::test]
    async fn test_leave_mid_round_keeps_others_playing() {
        let mut session = create_test_session();
        let (p1, _r1) = join(&mut session);
        let (p2, _r2) = join(&mut session);
        session.start_round(p1).unwrap();

        session.leave(p1);
        assert!(session.state().started());
        assert!(session.state().player(p1).is_none());
        assert_eq!(session.host(), Some(p2));
        assert_eq!(
            session.handle_move(p1, &MoveRequest::new(1, 0, 1), 0),
            Err(SessionError::PlayerNotFound)
        );
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_players() {
        let mut session = create_test_session();
        let (_p1, mut r1) = join(&mut session);
        let (_p2, mut r2) = join(&mut session);

        session.broadcast_state();
        assert!(matches!(r1.recv().await, Some(ServerMessage::GameStateUpdate { .. })));
        assert!(matches!(r2.recv().await, Some(ServerMessage::GameStateUpdate { .. })));

        session.broadcast(ServerMessage::Pong { timestamp: 1, server_time: 2 });
        assert!(matches!(r2.recv().await, Some(ServerMessage::Pong { timestamp: 1, .. })));
        assert!(r1.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_stalled_player_does_not_block_broadcast() {
        let mut session = create_test_session();
        let (p1, mut stalled) = join(&mut session);
        let (_p2, mut live) = join(&mut session);
        session.start_round(p1).unwrap();

        // Nobody drains `stalled`; its queue fills after 64 messages
        for _ in 0..100 {
            session.broadcast_state();
            while live.try_recv().is_ok() {}
        }

        let outcome = session.tick(session.now() + 1_000);
        assert!(outcome.advanced);
        session.broadcast_state();
        assert!(matches!(live.try_recv(), Ok(ServerMessage::GameStateUpdate { .. })));

        let mut queued = 0;
        while stalled.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 64);
    }

    #[tokio::test]
    async fn test_broadcast_skips_closed_queue() {
        let mut session = create_test_session();
        let (_p1, r1) = join(&mut session);
        let (_p2, mut r2) = join(&mut session);
        drop(r1);

        session.broadcast_state();
        assert!(matches!(r2.try_recv(), Ok(ServerMessage::GameStateUpdate { .. })));
    }
}
