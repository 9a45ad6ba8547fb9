//! CIE XYZ Color Space
//!
//! XYZ is one of the two Profile Connection Spaces. Pipelines carry it
//! normalized so that `1.0` in a channel stands for the largest encodable
//! XYZ value, `1 + 32767/32768`.

/// Largest XYZ value a 16-bit PCS encoding can hold
pub const MAX_ENCODEABLE_XYZ: f64 = 1.0 + 32767.0 / 32768.0;

/// CIE 1931 XYZ color coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Xyz {
    /// X tristimulus value
    pub x: f64,
    /// Y tristimulus value (luminance)
    pub y: f64,
    /// Z tristimulus value
    pub z: f64,
}

impl Xyz {
    /// Create a new XYZ color
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Decode from the normalized pipeline representation
    #[inline]
    pub fn from_pcs_float(v: &[f32]) -> Self {
        Self {
            x: v[0] as f64 * MAX_ENCODEABLE_XYZ,
            y: v[1] as f64 * MAX_ENCODEABLE_XYZ,
            z: v[2] as f64 * MAX_ENCODEABLE_XYZ,
        }
    }

    /// Encode into the normalized pipeline representation
    #[inline]
    pub fn to_pcs_float(&self, out: &mut [f32]) {
        out[0] = (self.x / MAX_ENCODEABLE_XYZ) as f32;
        out[1] = (self.y / MAX_ENCODEABLE_XYZ) as f32;
        out[2] = (self.z / MAX_ENCODEABLE_XYZ) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcs_float_roundtrip() {
        let xyz = Xyz::new(0.9642, 1.0, 0.8249);
        let mut encoded = [0.0f32; 3];
        xyz.to_pcs_float(&mut encoded);

        assert!(encoded.iter().all(|&v| v > 0.0 && v < 1.0));
        let decoded = Xyz::from_pcs_float(&encoded);
        assert!((decoded.x - xyz.x).abs() < 1e-6);
        assert!((decoded.y - xyz.y).abs() < 1e-6);
        assert!((decoded.z - xyz.z).abs() < 1e-6);
    }
}
