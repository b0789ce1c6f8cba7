//! Seeded Randomness
//!
//! Xorshift128+ seeded through SplitMix64. World generation and orb
//! relocation draw from the RNG stored inside the round state, so a round
//! replays identically from its seed.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::fixed::Fixed;
use super::vec2::FixedVec2;

/// Xorshift128+ generator. Same seed, same sequence, on every platform.
///
/// # Example
///
/// ```
/// use orb_rush::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Expand `seed` into the 128-bit state with SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state = [splitmix64(&mut s), splitmix64(&mut s)];
        // Xorshift must never sit on the all-zero state
        if state == [0, 0] {
            return Self { state: [1, 1] };
        }
        Self { state }
    }

    /// Next raw output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let s1 = self.state[1] ^ s0;
        let out = s0.wrapping_add(self.state[1]);
        self.state = [s0.rotate_left(24) ^ s1 ^ (s1 << 16), s1.rotate_left(37)];
        out
    }

    /// Uniform-ish integer below `max`; 0 when `max` is 0.
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }

    /// Fixed value in `[0, max)`; 0 for non-positive `max`.
    #[inline]
    pub fn next_fixed(&mut self, max: Fixed) -> Fixed {
        if max <= 0 {
            return 0;
        }
        // Top 32 bits scaled into [0, max)
        let high = self.next_u64() >> 32;
        ((high as i64 * max as i64) >> 32) as Fixed
    }

    /// Fixed value in `[min, max)`; `min` for an empty range.
    #[inline]
    pub fn next_fixed_range(&mut self, min: Fixed, max: Fixed) -> Fixed {
        if min >= max {
            return min;
        }
        min.wrapping_add(self.next_fixed(max.wrapping_sub(min)))
    }

    /// Random point with both coordinates in [min, max).
    pub fn next_point(&mut self, min: Fixed, max: Fixed) -> FixedVec2 {
        let x = self.next_fixed_range(min, max);
        let y = self.next_fixed_range(min, max);
        FixedVec2::new(x, y)
    }

    /// Pick one element, `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            slice.get(self.next_int(slice.len() as u32) as usize)
        }
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a round seed from the round id and the participating players.
///
/// `player_ids` must be sorted; the session passes them in id order.
pub fn derive_round_seed(round_id: &[u8; 16], player_ids: &[u8]) -> u64 {
    let digest = Sha256::new()
        .chain_update(b"ORB_RUSH_SEED_V1")
        .chain_update(round_id)
        .chain_update([player_ids.len() as u8])
        .chain_update(player_ids)
        .finalize();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}
