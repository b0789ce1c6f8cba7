//! Game Events
//!
//! Events produced by transitions. The engine never needs them; the
//! session logs them and forwards them to clients.

use serde::{Serialize, Deserialize};

use crate::core::vec2::FixedVec2;
use crate::game::state::{GameTime, PlayerId, PowerupKind};

/// Why a move left the player in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// A wall was in the way
    Wall,
    /// Another player was in the way
    Player,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEventData {
    /// Round started
    RoundStarted {
        round_seed: u64,
        players: Vec<PlayerId>,
    },

    /// Player position changed
    PlayerMoved {
        player_id: PlayerId,
        from: FixedVec2,
        to: FixedVec2,
    },

    /// Move reverted
    MoveBlocked {
        player_id: PlayerId,
        reason: BlockReason,
    },

    /// Powerup collected and applied
    PowerupCollected {
        player_id: PlayerId,
        powerup_index: usize,
        powerup_kind: PowerupKind,
        targets: Vec<PlayerId>,
        expires_at: GameTime,
    },

    /// Orb touched, score incremented
    ObjectScored {
        player_id: PlayerId,
        new_score: u32,
    },

    /// Orb moved to a fresh position
    ObjectRelocated {
        position: FixedVec2,
    },

    /// Orb now carried by a player
    ObjectCarried {
        holder: PlayerId,
    },

    /// Round clock ran out
    RoundEnded {
        winner_id: Option<PlayerId>,
        scores: Vec<(PlayerId, u32)>,
    },
}

/// A game event with its time reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Time reference of the transition that produced it
    pub at: GameTime,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(at: GameTime, data: GameEventData) -> Self {
        Self { at, data }
    }

    /// Player the event is about, if any.
    pub fn player_id(&self) -> Option<PlayerId> {
        match &self.data {
            GameEventData::PlayerMoved { player_id, .. }
            | GameEventData::MoveBlocked { player_id, .. }
            | GameEventData::PowerupCollected { player_id, .. }
            | GameEventData::ObjectScored { player_id, .. } => Some(*player_id),
            GameEventData::ObjectCarried { holder } => Some(*holder),
            GameEventData::RoundEnded { winner_id, .. } => *winner_id,
            GameEventData::RoundStarted { .. } | GameEventData::ObjectRelocated { .. } => None,
        }
    }

    /// Should clients hear about this event?
    ///
    /// Plain movement is already visible in the next snapshot.
    pub fn is_broadcast(&self) -> bool {
        !matches!(
            self.data,
            GameEventData::PlayerMoved { .. } | GameEventData::MoveBlocked { .. }
        )
    }

    /// Create round started event.
    pub fn round_started(at: GameTime, round_seed: u64, players: Vec<PlayerId>) -> Self {
        Self::new(at, GameEventData::RoundStarted { round_seed, players })
    }

    /// Create player moved event.
    pub fn player_moved(at: GameTime, player_id: PlayerId, from: FixedVec2, to: FixedVec2) -> Self {
        Self::new(at, GameEventData::PlayerMoved { player_id, from, to })
    }

    /// Create move blocked event.
    pub fn move_blocked(at: GameTime, player_id: PlayerId, reason: BlockReason) -> Self {
        Self::new(at, GameEventData::MoveBlocked { player_id, reason })
    }

    /// Create powerup collected event.
    pub fn powerup_collected(
        at: GameTime,
        player_id: PlayerId,
        powerup_index: usize,
        powerup_kind: PowerupKind,
        targets: Vec<PlayerId>,
        expires_at: GameTime,
    ) -> Self {
        Self::new(
            at,
            GameEventData::PowerupCollected {
                player_id,
                powerup_index,
                powerup_kind,
                targets,
                expires_at,
            },
        )
    }

    /// Create object scored event.
    pub fn object_scored(at: GameTime, player_id: PlayerId, new_score: u32) -> Self {
        Self::new(at, GameEventData::ObjectScored { player_id, new_score })
    }

    /// Create object relocated event.
    pub fn object_relocated(at: GameTime, position: FixedVec2) -> Self {
        Self::new(at, GameEventData::ObjectRelocated { position })
    }

    /// Create object carried event.
    pub fn object_carried(at: GameTime, holder: PlayerId) -> Self {
        Self::new(at, GameEventData::ObjectCarried { holder })
    }

    /// Create round ended event.
    pub fn round_ended(at: GameTime, winner_id: Option<PlayerId>, scores: Vec<(PlayerId, u32)>) -> Self {
        Self::new(at, GameEventData::RoundEnded { winner_id, scores })
    }
}
