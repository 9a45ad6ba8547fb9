//! CIELAB (L*a*b*) Color Space
//!
//! - L*: Lightness (0 = black, 100 = white)
//! - a*: Green-red axis
//! - b*: Blue-yellow axis
//!
//! Conversions use the D50 PCS white. Pipelines carry Lab normalized:
//! `L / 100`, `(a + 128) / 255`, `(b + 128) / 255`.

use crate::color::{D50, Xyz};

/// CIELAB color coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lab {
    /// Lightness (0 to 100)
    pub l: f64,
    /// Green-red axis (typically -128 to 127)
    pub a: f64,
    /// Blue-yellow axis (typically -128 to 127)
    pub b: f64,
}

impl Lab {
    /// Create a new Lab color
    #[inline]
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Convert from XYZ relative to the D50 white
    pub fn from_xyz(xyz: Xyz) -> Self {
        let fx = lab_f(xyz.x / D50.x);
        let fy = lab_f(xyz.y / D50.y);
        let fz = lab_f(xyz.z / D50.z);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    /// Convert to XYZ relative to the D50 white
    pub fn to_xyz(&self) -> Xyz {
        let fy = (self.l + 16.0) / 116.0;
        let fx = fy + 0.002 * self.a;
        let fz = fy - 0.005 * self.b;

        Xyz::new(
            lab_f_inv(fx) * D50.x,
            lab_f_inv(fy) * D50.y,
            lab_f_inv(fz) * D50.z,
        )
    }

    /// Decode from the normalized pipeline representation
    #[inline]
    pub fn from_pcs_float(v: &[f32]) -> Self {
        Self {
            l: v[0] as f64 * 100.0,
            a: v[1] as f64 * 255.0 - 128.0,
            b: v[2] as f64 * 255.0 - 128.0,
        }
    }

    /// Encode into the normalized pipeline representation
    #[inline]
    pub fn to_pcs_float(&self, out: &mut [f32]) {
        out[0] = (self.l / 100.0) as f32;
        out[1] = ((self.a + 128.0) / 255.0) as f32;
        out[2] = ((self.b + 128.0) / 255.0) as f32;
    }
}

/// Lab forward function, linear below `(24/116)³`
#[inline]
fn lab_f(t: f64) -> f64 {
    const LIMIT: f64 = (24.0 / 116.0) * (24.0 / 116.0) * (24.0 / 116.0);

    if t <= LIMIT {
        (841.0 / 108.0) * t + 16.0 / 116.0
    } else {
        t.cbrt()
    }
}

/// Lab inverse function, linear below `24/116`
#[inline]
fn lab_f_inv(t: f64) -> f64 {
    const LIMIT: f64 = 24.0 / 116.0;

    if t <= LIMIT {
        (108.0 / 841.0) * (t - 16.0 / 116.0)
    } else {
        t * t * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    fn assert_lab_close(a: Lab, b: Lab, epsilon: f64) {
        let close = (a.l - b.l).abs() < epsilon
            && (a.a - b.a).abs() < epsilon
            && (a.b - b.b).abs() < epsilon;
        assert!(close, "{:?} vs {:?}", a, b);
    }

    #[test]
    fn test_white_is_100() {
        let lab = Lab::from_xyz(D50);
        assert!((lab.l - 100.0).abs() < EPSILON);
        assert!(lab.a.abs() < EPSILON);
        assert!(lab.b.abs() < EPSILON);
    }

    #[test]
    fn test_black_is_0() {
        let lab = Lab::from_xyz(Xyz::new(0.0, 0.0, 0.0));
        assert!(lab.l.abs() < EPSILON);
        let xyz = Lab::new(0.0, 0.0, 0.0).to_xyz();
        assert!(xyz.x.abs() < EPSILON && xyz.y.abs() < EPSILON && xyz.z.abs() < EPSILON);
    }

    #[test]
    fn test_roundtrip() {
        for original in [
            Lab::new(50.0, 25.0, -30.0),
            Lab::new(5.0, -2.0, 3.0),
            Lab::new(95.0, 80.0, 90.0),
        ] {
            assert_lab_close(Lab::from_xyz(original.to_xyz()), original, 1e-9);
        }
    }

    #[test]
    fn test_pcs_float_encoding() {
        let lab = Lab::new(50.0, -128.0, 127.0);
        let mut encoded = [0.0f32; 3];
        lab.to_pcs_float(&mut encoded);

        assert!((encoded[0] - 0.5).abs() < 1e-6);
        assert_eq!(encoded[1], 0.0);
        assert!((encoded[2] - 1.0).abs() < 1e-6);
        assert_lab_close(Lab::from_pcs_float(&encoded), lab, 1e-4);
    }
}
