//! Sample generation
//!
//! Deterministic inputs for curve and pipeline comparisons.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Sample pattern types
#[derive(Debug, Clone, Copy)]
pub enum SamplePattern {
    /// Evenly spaced from 0 to full scale, both ends included
    Ramp,
    /// Uniform random values with seed
    Random(u64),
    /// Values at and next to both ends of the range
    Endpoints,
}

/// Generate `count` values in `[0, 1]`
pub fn unit_samples(pattern: SamplePattern, count: usize) -> Vec<f32> {
    match pattern {
        SamplePattern::Ramp => {
            let last = count.saturating_sub(1).max(1) as f32;
            (0..count).map(|i| i as f32 / last).collect()
        }
        SamplePattern::Random(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..count).map(|_| rng.gen_range(0.0..=1.0)).collect()
        }
        SamplePattern::Endpoints => {
            let edges = [0.0, 1.0 / 65535.0, 1e-3, 1.0 - 1e-3, 1.0 - 1.0 / 65535.0, 1.0];
            edges.iter().copied().cycle().take(count).collect()
        }
    }
}

/// Generate `count` 16-bit values
pub fn word_samples(pattern: SamplePattern, count: usize) -> Vec<u16> {
    match pattern {
        SamplePattern::Ramp => {
            let last = count.saturating_sub(1).max(1) as u64;
            (0..count as u64).map(|i| (i * 65535 / last) as u16).collect()
        }
        SamplePattern::Random(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..count).map(|_| rng.r#gen::<u16>()).collect()
        }
        SamplePattern::Endpoints => {
            let edges = [0u16, 1, 2, 65533, 65534, 65535];
            edges.iter().copied().cycle().take(count).collect()
        }
    }
}

/// A `y = x^gamma` table of 16-bit entries
pub fn gamma_table_16(gamma: f64, entries: usize) -> Vec<u16> {
    let last = (entries - 1) as f64;
    (0..entries)
        .map(|i| ((i as f64 / last).powf(gamma) * 65535.0).round() as u16)
        .collect()
}

/// A `y = x^gamma` table of float entries
pub fn gamma_table_float(gamma: f32, entries: usize) -> Vec<f32> {
    let last = (entries - 1) as f32;
    (0..entries).map(|i| (i as f32 / last).powf(gamma)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_covers_range() {
        let v = unit_samples(SamplePattern::Ramp, 11);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[10], 1.0);

        let w = word_samples(SamplePattern::Ramp, 257);
        assert_eq!(w[0], 0);
        assert_eq!(w[256], 65535);
    }

    #[test]
    fn test_random_deterministic() {
        let a = unit_samples(SamplePattern::Random(42), 100);
        let b = unit_samples(SamplePattern::Random(42), 100);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_gamma_tables() {
        let t = gamma_table_16(2.2, 256);
        assert_eq!(t[0], 0);
        assert_eq!(t[255], 65535);
        assert!(t.windows(2).all(|w| w[0] <= w[1]));

        let f = gamma_table_float(1.0, 5);
        assert_eq!(f, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
