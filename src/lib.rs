//! # Orb Rush
//!
//! Authoritative simulation and relay server for a 2-4 player arena game.
//! Players race to touch the orb, cross ice, mud and walls, and grab
//! powerups that buff themselves or slow their opponents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ORB RUSH                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector with fixed-point                │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Round simulation (deterministic)          │
//! │  ├── config.rs   - Gameplay constants and policies           │
//! │  ├── state.rs    - Round, player and map state               │
//! │  ├── input.rs    - Directions and recorded inputs            │
//! │  ├── collision.rs- Square overlap queries                    │
//! │  ├── world.rs    - World generator and orb relocation        │
//! │  ├── powerup.rs  - Pickup and effect targeting               │
//! │  ├── engine.rs   - start_round / apply_move / step / replay  │
//! │  └── events.rs   - Transition events                         │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── protocol.rs - Message and snapshot types                │
//! │  ├── session.rs  - Arena session, owns the state             │
//! │  ├── server.rs   - WebSocket relay server                    │
//! │  └── client.rs   - Reconnecting relay client                 │
//! │                                                              │
//! │  config.rs       - Server configuration (TOML + env)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock or a global RNG. Time comes in
//! as an argument and randomness from the round's seeded generator, so a
//! round replays to the same state hash from its seed and input log.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod config;

// Re-export commonly used types
pub use crate::core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use crate::core::vec2::FixedVec2;
pub use crate::core::rng::DeterministicRng;
pub use crate::game::input::Direction;
pub use crate::game::state::{GameState, PlayerState, PlayerId};
pub use crate::game::engine::{apply_move, step, start_round};
pub use crate::config::ServerConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Round clock rate (Hz)
pub const TICK_RATE: u32 = 1;
