//! Network Layer
//!
//! WebSocket relay for real-time multiplayer.
//! This layer is **non-deterministic**; every state change goes through `game/`.

pub mod protocol;
pub mod session;
pub mod server;
pub mod client;

pub use protocol::{ClientMessage, ServerMessage, MoveRequest, MoveFrame, GameSnapshot, ErrorCode};
pub use session::{ArenaSession, SessionConfig, SessionError, RoundId};
pub use server::{GameServer, GameServerError};
pub use client::{RelayClient, ReconnectPolicy, ConnectionStatus, ClientEvent, ClientError};
