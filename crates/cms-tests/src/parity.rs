//! Parity measurement
//!
//! Compares oxcms-pipeline output against a reference, sample by sample.

use std::fmt;

/// Statistics from a comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diff {
    /// Largest absolute difference
    pub max: f64,
    /// Mean absolute difference
    pub mean: f64,
    /// Index of the sample with the largest difference
    pub worst_index: usize,
    /// Number of samples
    pub count: usize,
}

impl Diff {
    /// Every difference is at most `tolerance`
    pub fn is_within(&self, tolerance: f64) -> bool {
        self.max <= tolerance
    }

    /// Bit-exact match
    pub fn is_exact(&self) -> bool {
        self.max == 0.0
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max {:.3e} (sample {}), mean {:.3e} over {} samples",
            self.max, self.worst_index, self.mean, self.count
        )
    }
}

fn collect(diffs: impl Iterator<Item = f64>) -> Diff {
    let mut max = 0.0;
    let mut sum = 0.0;
    let mut worst_index = 0;
    let mut count = 0;

    for (i, d) in diffs.enumerate() {
        // NaN counts as the worst possible difference
        let d = if d.is_nan() { f64::INFINITY } else { d };
        if d > max {
            max = d;
            worst_index = i;
        }
        sum += d;
        count += 1;
    }

    Diff {
        max,
        mean: if count > 0 { sum / count as f64 } else { 0.0 },
        worst_index,
        count,
    }
}

/// Evaluate two float curves at every input and compare
pub fn compare_curve_float(
    inputs: &[f32],
    ours: impl Fn(f32) -> f32,
    reference: impl Fn(f32) -> f32,
) -> Diff {
    collect(
        inputs
            .iter()
            .map(|&x| (ours(x) as f64 - reference(x) as f64).abs()),
    )
}

/// Evaluate two 16-bit curves at every input and compare
pub fn compare_curve_16(
    inputs: &[u16],
    ours: impl Fn(u16) -> u16,
    reference: impl Fn(u16) -> u16,
) -> Diff {
    collect(
        inputs
            .iter()
            .map(|&x| (ours(x) as f64 - reference(x) as f64).abs()),
    )
}

/// Compare two 16-bit buffers element by element
///
/// # Panics
/// If the lengths differ.
pub fn compare_buffers_16(ours: &[u16], reference: &[u16]) -> Diff {
    assert_eq!(ours.len(), reference.len(), "buffer lengths differ");
    collect(
        ours.iter()
            .zip(reference)
            .map(|(&a, &b)| (a as f64 - b as f64).abs()),
    )
}

/// Compare two float buffers element by element
///
/// # Panics
/// If the lengths differ.
pub fn compare_buffers_float(ours: &[f32], reference: &[f32]) -> Diff {
    assert_eq!(ours.len(), reference.len(), "buffer lengths differ");
    collect(
        ours.iter()
            .zip(reference)
            .map(|(&a, &b)| (a as f64 - b as f64).abs()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_buffers() {
        let a = [1u16, 2, 3];
        let diff = compare_buffers_16(&a, &a);
        assert!(diff.is_exact());
        assert_eq!(diff.count, 3);
    }

    #[test]
    fn test_worst_sample_reported() {
        let diff = compare_buffers_float(&[0.0, 0.5, 1.0], &[0.0, 0.25, 1.0]);
        assert_eq!(diff.worst_index, 1);
        assert_eq!(diff.max, 0.25);
        assert!(diff.is_within(0.25));
        assert!(!diff.is_within(0.2));
    }

    #[test]
    fn test_nan_is_never_within() {
        let diff = compare_curve_float(&[0.5], |_| f32::NAN, |x| x);
        assert!(!diff.is_within(1e9));
    }
}
