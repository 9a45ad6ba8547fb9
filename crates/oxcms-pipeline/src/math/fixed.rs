//! 16-bit fixed point helpers
//!
//! Interpolation on 16-bit tables works in 15.16 fixed point: the integer
//! part selects the grid cell, the low 16 bits weight the neighbours.

/// Largest value representable in a 16-bit channel
pub const MAX_WORD: f64 = 65535.0;

/// Convert a `[0, 0xffff] * domain` product to 15.16 fixed point
///
/// This is `a / 0xffff` in 16.16, computed without division by multiplying
/// by `0x10000 / 0xffff` and rounding.
#[inline]
pub fn to_fixed_domain(a: i64) -> i64 {
    a + ((a + 0x7fff) / 0xffff)
}

/// Integer part of a 15.16 fixed point value
#[inline]
pub fn fixed_to_int(x: i64) -> i64 {
    x >> 16
}

/// Fractional part of a 15.16 fixed point value, in 1/65536 units
#[inline]
pub fn fixed_rest_to_int(x: i64) -> i64 {
    x & 0xffff
}

/// Round a 15.16 fixed point value to the nearest integer
#[inline]
pub fn round_fixed_to_int(x: i64) -> i64 {
    (x + 0x8000) >> 16
}

/// Round and saturate to the 16-bit range
#[inline]
pub fn saturate_word(d: f64) -> u16 {
    let d = d + 0.5;
    if d <= 0.0 {
        return 0;
    }
    if d >= MAX_WORD {
        return 0xffff;
    }
    d.floor() as u16
}

/// Value of node `i` out of `max_samples` evenly spaced 16-bit nodes
#[inline]
pub fn quantize_val(i: f64, max_samples: u32) -> u16 {
    let x = (i * MAX_WORD) / (max_samples as f64 - 1.0);
    saturate_word(x)
}

/// Fixed point linear interpolation between `l` and `h` with weight `a`
///
/// `a` is the 16-bit fractional weight. Unsigned wrap-around arithmetic
/// makes descending segments come out right after the final truncation.
#[inline]
pub fn linear_interp(a: i64, l: u16, h: u16) -> u16 {
    let dif = ((h as i32 - l as i32) as u32)
        .wrapping_mul(a as u32)
        .wrapping_add(0x8000);
    ((dif >> 16).wrapping_add(l as u32)) as u16
}

/// Clamp a float to `[0, 1]`, mapping NaN and tiny values to zero
#[inline]
pub fn fclamp(v: f32) -> f32 {
    if v < 1.0e-9 || v.is_nan() {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_domain_endpoints() {
        // 0xffff maps exactly onto the next integer
        assert_eq!(to_fixed_domain(0xffff), 0x10000);
        assert_eq!(to_fixed_domain(0), 0);
        assert_eq!(fixed_to_int(to_fixed_domain(0xffff * 16)), 16);
        assert_eq!(fixed_rest_to_int(to_fixed_domain(0xffff * 16)), 0);
    }

    #[test]
    fn test_saturate_word() {
        assert_eq!(saturate_word(-10.0), 0);
        assert_eq!(saturate_word(0.4), 0);
        assert_eq!(saturate_word(0.5), 1);
        assert_eq!(saturate_word(65534.6), 65535);
        assert_eq!(saturate_word(1e30), 65535);
    }

    #[test]
    fn test_quantize_val() {
        assert_eq!(quantize_val(0.0, 17), 0);
        assert_eq!(quantize_val(16.0, 17), 65535);
        assert_eq!(quantize_val(8.0, 17), 32768);
    }

    #[test]
    fn test_linear_interp_both_directions() {
        assert_eq!(linear_interp(0, 100, 200), 100);
        assert_eq!(linear_interp(0x8000, 100, 200), 150);
        assert_eq!(linear_interp(0x8000, 200, 100), 150);
        assert_eq!(linear_interp(0xffff, 0, 65535), 65534);
    }

    #[test]
    fn test_fclamp() {
        assert_eq!(fclamp(f32::NAN), 0.0);
        assert_eq!(fclamp(-1.0), 0.0);
        assert_eq!(fclamp(1e-12), 0.0);
        assert_eq!(fclamp(2.0), 1.0);
        assert_eq!(fclamp(0.25), 0.25);
    }
}
