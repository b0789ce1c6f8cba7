//! Fixed-Point 2D Vector
//!
//! Positions and displacements on the arena plane. Arithmetic saturates.

use std::fmt;
use std::ops::Add;
use serde::{Serialize, Deserialize};

use super::fixed::{Fixed, fixed_clamp, from_int, to_float};

/// Point or displacement in Q16.16 pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec2 {
    /// Grows to the right
    pub x: Fixed,
    /// Grows downward
    pub y: Fixed,
}

impl FixedVec2 {
    /// Origin, the arena's top-left corner
    pub const ZERO: Self = Self { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Vector from whole pixels.
    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self::new(from_int(x), from_int(y))
    }

    /// Component-wise saturating sum.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x.saturating_add(other.x), self.y.saturating_add(other.y))
    }

    /// Apply `f` to each axis.
    #[inline]
    pub fn map(self, f: impl Fn(Fixed) -> Fixed) -> Self {
        Self::new(f(self.x), f(self.y))
    }

    /// Keep both axes within `[min, max]`.
    #[inline]
    pub fn clamp(self, min: Fixed, max: Fixed) -> Self {
        self.map(|c| fixed_clamp(c, min, max))
    }

    /// Float pixels, for snapshots and logs.
    #[inline]
    pub fn to_floats(self) -> (f32, f32) {
        (to_float(self.x), to_float(self.y))
    }
}

impl Add for FixedVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec2::add(self, rhs)
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.to_floats();
        write!(f, "FixedVec2({x:.2}, {y:.2})")
    }
}

impl fmt::Display for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.to_floats();
        write!(f, "({x:.1}, {y:.1})")
    }
}
