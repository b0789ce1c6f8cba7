//! Round State Hashing
//!
//! SHA-256 over a canonical encoding of the round state. Used to check
//! that a replayed round ends on the same state as the live one.

use sha2::{Sha256, Digest};
use super::fixed::Fixed;
use super::vec2::FixedVec2;

/// SHA-256 digest of a round state.
pub type StateHash = [u8; 32];

/// Canonical encoder feeding SHA-256.
///
/// Order of updates is part of the encoding.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Start a hash prefixed by `domain`.
    pub fn new(domain: &[u8]) -> Self {
        let mut inner = Sha256::new();
        inner.update(domain);
        Self { hasher: inner }
    }

    /// Hasher with the round-state domain tag.
    pub fn for_round_state() -> Self {
        Self::new(b"ORB_RUSH_STATE_V1")
    }

    /// Append one byte.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Append a `u32`, little-endian.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Append a `u64`, little-endian.
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Append a raw Q16.16 value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Append x then y.
    #[inline]
    pub fn update_vec2(&mut self, value: FixedVec2) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
    }

    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with an optional byte, distinguishing `None` from `Some(0)`.
    #[inline]
    pub fn update_opt_u8(&mut self, value: Option<u8>) {
        match value {
            Some(v) => {
                self.update_u8(1);
                self.update_u8(v);
            }
            None => self.update_u8(0),
        }
    }

    /// Digest of everything appended so far.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute the state hash of a round.
///
/// Called by `GameState::compute_hash()`; the closure adds the entities.
pub fn compute_state_hash<F>(round_seed: u64, time_remaining: u32, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut h = StateHasher::for_round_state();

    h.update_u64(round_seed);
    h.update_u32(time_remaining);
    add_state(&mut h);
    h.finalize()
}
