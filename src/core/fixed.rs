//! Fixed-Point Scalars
//!
//! Every coordinate, size and speed in the simulation is a Q16.16 value so
//! that two runs fed the same inputs land on bit-identical states.
//!
//! ```text
//!   bit 31      bits 30..16         bits 15..0
//!   sign        whole pixels        1/65536 px
//!
//!   from_int(5)  = 0x0005_0000  = 5.0 px
//!   FIXED_HALF   = 0x0000_8000  = 0.5 px
//! ```
//!
//! The arena is at most a few thousand pixels wide, so products of two
//! coordinates would overflow the integer part. Geometry therefore sticks
//! to additions and comparisons; multiplications only ever scale a
//! displacement by a small factor.

/// Signed Q16.16 value.
pub type Fixed = i32;

/// Fractional bits
pub const FIXED_SCALE: i32 = 16;

/// One pixel
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE;

/// Half a pixel
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1;

/// Convert a whole number of pixels to fixed-point.
#[inline]
pub const fn from_int(value: i32) -> Fixed {
    value << FIXED_SCALE
}

/// Float literal to fixed-point, truncating. For constants and tests only.
///
/// ```
/// use orb_rush::core::fixed::{from_int, to_fixed, FIXED_HALF};
/// const LANE: i32 = to_fixed(102.5);
/// assert_eq!(LANE, from_int(102) + FIXED_HALF);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * FIXED_ONE as f64) as Fixed
}

/// Float pixels, for snapshots and logs.
#[inline]
pub fn to_float(value: Fixed) -> f32 {
    value as f32 / FIXED_ONE as f32
}

/// Scale a fixed-point value by an integer percentage (150 = x1.5).
///
/// Truncates toward zero, so +d and -d scale symmetrically.
#[inline]
pub fn scale_percent(value: Fixed, percent: u32) -> Fixed {
    let wide = (value as i64) * (percent as i64) / 100;
    wide as Fixed
}

/// Clamp a fixed-point number to `[min, max]`.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_int() {
        assert_eq!(from_int(0), 0);
        assert_eq!(from_int(1), FIXED_ONE);
        assert_eq!(from_int(-3), -3 * FIXED_ONE);
        assert_eq!(from_int(800), 800 * FIXED_ONE);
    }

    #[test]
    fn test_to_fixed_literals() {
        assert_eq!(to_fixed(2.0), from_int(2));
        assert_eq!(to_fixed(0.25), FIXED_ONE / 4);
        assert_eq!(to_fixed(-1.5), -FIXED_ONE - FIXED_HALF);
    }

    #[test]
    fn test_scale_percent() {
        assert_eq!(scale_percent(from_int(10), 50), from_int(5));
        assert_eq!(scale_percent(from_int(10), 150), from_int(15));
        assert_eq!(scale_percent(from_int(-10), 150), from_int(-15));
        assert_eq!(scale_percent(from_int(7), 100), from_int(7));
        // Large coordinates do not overflow the intermediate
        assert_eq!(scale_percent(from_int(30_000), 100), from_int(30_000));
    }

    #[test]
    fn test_fixed_clamp() {
        assert_eq!(fixed_clamp(from_int(5), 0, from_int(3)), from_int(3));
        assert_eq!(fixed_clamp(from_int(-5), 0, from_int(3)), 0);
        assert_eq!(fixed_clamp(FIXED_ONE, 0, from_int(3)), FIXED_ONE);
    }

    #[test]
    fn test_to_float() {
        assert_eq!(to_float(from_int(770)), 770.0);
        assert_eq!(to_float(FIXED_HALF), 0.5);
    }
}
