//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Messages are JSON text frames; moves may also arrive as a flat bincode
//! [`MoveFrame`] in a binary frame.

use serde::{Serialize, Deserialize};

use crate::core::fixed::to_float;
use crate::game::events::GameEvent;
use crate::game::input::Direction;
use crate::game::state::{
    GameState, GameTime, PlayerColor, PlayerId, PlayerState, PowerupKind, Terrain,
};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Move one step.
    Move(MoveRequest),

    /// Start the round (host only).
    StartGame,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },

    /// Player is leaving the arena.
    Leave,
}

/// Movement request.
///
/// Either `dx`/`dy` or a direction name (`up`, `down`, `left`, `right`).
/// The name wins when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Player the client claims to move.
    #[serde(alias = "playerId")]
    pub player_id: u8,
    /// Horizontal step (-1, 0, 1).
    #[serde(default)]
    pub dx: i32,
    /// Vertical step (-1, 0, 1).
    #[serde(default)]
    pub dy: i32,
    /// Direction name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl MoveRequest {
    /// Request from components.
    pub fn new(player_id: u8, dx: i32, dy: i32) -> Self {
        Self { player_id, dx, dy, direction: None }
    }

    /// Validated direction, `None` when out of range or unknown.
    pub fn direction(&self) -> Option<Direction> {
        match &self.direction {
            Some(name) => Direction::from_name(name),
            None => Direction::from_components(self.dx, self.dy),
        }
    }
}

/// Compact binary move, sent in a binary WebSocket frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFrame {
    /// Player the client claims to move.
    pub player_id: u8,
    /// Horizontal step.
    pub dx: i8,
    /// Vertical step.
    pub dy: i8,
    /// Client timestamp.
    pub timestamp: u64,
}

impl MoveFrame {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Equivalent JSON request.
    pub fn to_request(&self) -> MoveRequest {
        MoveRequest::new(self.player_id, self.dx as i32, self.dy as i32)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Joined the arena.
    #[serde(rename_all = "camelCase")]
    ConnectionAccepted {
        player_id: u8,
        game_state: GameSnapshot,
    },

    /// Arena is full or closed.
    ConnectionRejected { message: String },

    /// Snapshot after an accepted transition.
    #[serde(rename_all = "camelCase")]
    GameStateUpdate { game_state: GameSnapshot },

    /// Game event notification.
    Event(GameEvent),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed message.
    InvalidMessage,
    /// Direction components out of range.
    InvalidInput,
    /// Moving someone else's player.
    Unauthorized,
    /// Only the host may do this.
    NotHost,
    /// Round already running.
    RoundInProgress,
    /// Arena is full.
    SessionFull,
    /// Map generation failed.
    InternalError,
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Client view of the round, in float pixels and camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub players: Vec<PlayerSnapshot>,
    pub shared_object: ObjectSnapshot,
    pub obstacles: Vec<ObstacleSnapshot>,
    pub powerups: Vec<PowerupSnapshot>,
    pub time_remaining: u32,
    pub game_started: bool,
    pub winner: Option<u8>,
}

/// Player in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: u8,
    pub x: f32,
    pub y: f32,
    /// Effective speed at snapshot time.
    pub speed: f32,
    pub score: u32,
    pub color: PlayerColor,
    pub has_object: bool,
    pub powerups: EffectsSnapshot,
}

/// Effect deadlines of a player (0 when inactive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsSnapshot {
    pub speed_boost: GameTime,
    pub speed_penalty: GameTime,
    pub freeze: GameTime,
    pub invincibility: GameTime,
}

/// Orb in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSnapshot {
    pub x: f32,
    pub y: f32,
    pub is_held: bool,
    pub holder_id: Option<u8>,
}

/// Obstacle in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    #[serde(rename = "type")]
    pub terrain: Terrain,
}

/// Powerup in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerupSnapshot {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PowerupKind,
    pub active: bool,
}

impl GameSnapshot {
    /// Snapshot of `state` as seen at `now`.
    pub fn from_state(state: &GameState, now: GameTime) -> Self {
        Self {
            players: state
                .players
                .iter()
                .map(|p| PlayerSnapshot::from_player(p, state, now))
                .collect(),
            shared_object: ObjectSnapshot {
                x: to_float(state.object.position.x),
                y: to_float(state.object.position.y),
                is_held: state.object.is_held(),
                holder_id: state.object.holder.map(PlayerId::get),
            },
            obstacles: state
                .obstacles
                .iter()
                .map(|o| ObstacleSnapshot {
                    x: to_float(o.position.x),
                    y: to_float(o.position.y),
                    size: to_float(o.size),
                    terrain: o.terrain,
                })
                .collect(),
            powerups: state
                .powerups
                .iter()
                .map(|p| PowerupSnapshot {
                    x: to_float(p.position.x),
                    y: to_float(p.position.y),
                    kind: p.kind,
                    active: p.active,
                })
                .collect(),
            time_remaining: state.time_remaining,
            game_started: state.started(),
            winner: state.winner.map(PlayerId::get),
        }
    }
}

impl PlayerSnapshot {
    fn from_player(player: &PlayerState, state: &GameState, now: GameTime) -> Self {
        let effects = &player.effects;
        Self {
            id: player.id.get(),
            x: to_float(player.position.x),
            y: to_float(player.position.y),
            speed: to_float(player.effective_speed(&state.config, now)),
            score: player.score,
            color: player.color,
            has_object: player.has_object,
            powerups: EffectsSnapshot {
                speed_boost: effects.speed_boost,
                speed_penalty: effects.speed_penalty,
                freeze: effects.freeze,
                invincibility: effects.invincibility,
            },
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Snapshot update message.
    pub fn update(state: &GameState, now: GameTime) -> Self {
        Self::GameStateUpdate {
            game_state: GameSnapshot::from_state(state, now),
        }
    }

    /// Error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ServerError {
            code,
            message: message.into(),
        })
    }
}
