//! Game Logic Module
//!
//! The round simulation. Deterministic given a seed and an input log.
//!
//! ## Module Structure
//!
//! - `config`: Gameplay constants and policy switches
//! - `state`: Round state, players, orb, obstacles, powerups
//! - `input`: Movement directions and recorded inputs
//! - `collision`: Square boxes and overlap queries
//! - `world`: Spawns, map generation, orb relocation
//! - `powerup`: Pickup and effect targeting
//! - `engine`: `start_round`, `apply_move`, `step`, replay
//! - `events`: Events emitted by transitions

pub mod config;
pub mod state;
pub mod input;
pub mod collision;
pub mod world;
pub mod powerup;
pub mod engine;
pub mod events;

// Re-export key types
pub use config::{ArenaConfig, ArenaConfigError, ObjectPolicy, DebuffTarget};
pub use state::{GameState, GameTime, PlayerState, PlayerId, PlayerColor, RoundPhase, PowerupKind, Terrain};
pub use input::{Direction, InvalidDirection, MoveIntent, RecordedInput};
pub use world::{SpawnPoint, WorldGenError, MAX_PLAYERS};
pub use engine::{start_round, apply_move, advance_move, step, advance_step, replay_round, Transition};
pub use events::{GameEvent, GameEventData};
