//! Player Input
//!
//! Movement directions and the input log used for replays.

use serde::{Serialize, Deserialize};

use crate::game::state::{GameTime, PlayerId};

/// Unit movement direction.
///
/// Each axis is -1, 0 or +1. Diagonals move the full speed on both axes.
/// `y` grows downward, so `UP` is `dy = -1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDirection", into = "RawDirection")]
pub struct Direction {
    dx: i8,
    dy: i8,
}

#[derive(Serialize, Deserialize)]
struct RawDirection {
    dx: i8,
    dy: i8,
}

/// A direction component outside {-1, 0, 1}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid direction ({dx}, {dy})")]
pub struct InvalidDirection {
    /// Rejected horizontal component
    pub dx: i8,
    /// Rejected vertical component
    pub dy: i8,
}

impl TryFrom<RawDirection> for Direction {
    type Error = InvalidDirection;

    fn try_from(raw: RawDirection) -> Result<Self, Self::Error> {
        Direction::new(raw.dx, raw.dy).ok_or(InvalidDirection { dx: raw.dx, dy: raw.dy })
    }
}

impl From<Direction> for RawDirection {
    fn from(dir: Direction) -> Self {
        Self { dx: dir.dx, dy: dir.dy }
    }
}

impl Direction {
    /// No movement
    pub const NONE: Self = Self { dx: 0, dy: 0 };
    /// Toward y = 0
    pub const UP: Self = Self { dx: 0, dy: -1 };
    /// Toward y = max
    pub const DOWN: Self = Self { dx: 0, dy: 1 };
    /// Toward x = 0
    pub const LEFT: Self = Self { dx: -1, dy: 0 };
    /// Toward x = max
    pub const RIGHT: Self = Self { dx: 1, dy: 0 };

    /// Build a direction, rejecting components outside {-1, 0, 1}.
    pub fn new(dx: i8, dy: i8) -> Option<Self> {
        if (-1..=1).contains(&dx) && (-1..=1).contains(&dy) {
            Some(Self { dx, dy })
        } else {
            None
        }
    }

    /// Build a direction from wire integers.
    pub fn from_components(dx: i32, dy: i32) -> Option<Self> {
        let dx = i8::try_from(dx).ok()?;
        let dy = i8::try_from(dy).ok()?;
        Self::new(dx, dy)
    }

    /// Parse a direction name (`up`, `down`, `left`, `right`, `none`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "up" => Some(Self::UP),
            "down" => Some(Self::DOWN),
            "left" => Some(Self::LEFT),
            "right" => Some(Self::RIGHT),
            "none" => Some(Self::NONE),
            _ => None,
        }
    }

    /// Horizontal component.
    #[inline]
    pub fn dx(self) -> i8 {
        self.dx
    }

    /// Vertical component.
    #[inline]
    pub fn dy(self) -> i8 {
        self.dy
    }

    /// Is this the zero direction?
    #[inline]
    pub fn is_none(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

/// One movement request from a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    /// Who moves
    pub player_id: PlayerId,
    /// Where to
    pub direction: Direction,
    /// Time reference the move was applied at
    pub at: GameTime,
}

/// Entry of a round's input log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedInput {
    /// A move applied through `apply_move`
    Move(MoveIntent),
    /// A clock tick applied through `step`
    Tick { at: GameTime },
}

impl RecordedInput {
    /// Record a move.
    pub fn movement(player_id: PlayerId, direction: Direction, at: GameTime) -> Self {
        Self::Move(MoveIntent { player_id, direction, at })
    }

    /// Record a tick.
    pub fn tick(at: GameTime) -> Self {
        Self::Tick { at }
    }

    /// Time reference of the entry.
    pub fn at(&self) -> GameTime {
        match self {
            Self::Move(intent) => intent.at,
            Self::Tick { at } => *at,
        }
    }
}
