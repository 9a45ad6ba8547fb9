//! Tone curve inversion and composition

use crate::context::Context;
use crate::curves::parametric::Direction;
use crate::curves::tone_curve::{SegmentShape, ToneCurve};
use crate::error::{Error, Result};
use crate::math::fixed::saturate_word;

/// Default number of samples of a numerically reversed curve
pub const DEFAULT_REVERSE_SAMPLES: usize = 4096;

impl ToneCurve {
    /// Index `j` such that `y` lies between `table[j]` and `table[j + 1]`
    ///
    /// Overall ascending tables are searched from the top, descending ones
    /// from the bottom. Either bracket orientation is accepted.
    fn interval_of(&self, y: f64) -> Option<usize> {
        let t = &self.table16;
        if t.len() < 2 {
            return None;
        }

        let brackets = |i: usize| {
            let y0 = t[i] as f64;
            let y1 = t[i + 1] as f64;
            if y0 <= y1 {
                y >= y0 && y <= y1
            } else {
                y >= y1 && y <= y0
            }
        };

        let domain = t.len() - 1;
        if t[0] < t[domain] {
            (0..domain).rev().find(|&i| brackets(i))
        } else {
            (0..domain).find(|&i| brackets(i))
        }
    }

    /// Inverse curve
    ///
    /// A single forward parametric segment whose family is registered in
    /// `ctx` inverts analytically. Anything else is inverted numerically into
    /// an `n_samples` point table.
    ///
    /// # Errors
    /// `Range` when fewer than 2 or more than 65530 samples are requested.
    pub fn reverse_ex(&self, ctx: &Context, n_samples: usize) -> Result<Self> {
        if let [seg] = self.segments() {
            if let SegmentShape::Parametric(curve) = &seg.shape {
                if curve.direction == Direction::Forward
                    && ctx.curves().resolve(curve.kind.code()).is_some()
                {
                    return Self::build_parametric(ctx, curve.inverted());
                }
            }
        }

        if n_samples < 2 {
            return Err(ctx.signal(Error::range(format!(
                "Reversed curve needs at least 2 samples, got {}",
                n_samples
            ))));
        }

        let mut out = Self::allocate(ctx, Vec::new(), n_samples, None)?;

        let ascending = !self.is_descending();
        let n_entries = self.table16.len();

        // Unbracketed outputs reuse the last linear map, starting from the
        // boundary that matches the table direction
        let mut a = 0.0;
        let mut b = if ascending { 0.0 } else { 65535.0 };

        for i in 0..n_samples {
            let y = i as f64 * 65535.0 / (n_samples - 1) as f64;

            if let Some(j) = self.interval_of(y) {
                let x1 = self.table16[j] as f64;
                let x2 = self.table16[j + 1] as f64;

                let y1 = (j as f64 * 65535.0) / (n_entries - 1) as f64;
                let y2 = ((j + 1) as f64 * 65535.0) / (n_entries - 1) as f64;

                if x1 == x2 {
                    out.table16[i] = saturate_word(if ascending { y2 } else { y1 });
                    continue;
                }

                a = (y2 - y1) / (x2 - x1);
                b = y2 - a * x2;
            }

            out.table16[i] = saturate_word(a * y + b);
        }

        tracing::debug!(samples = n_samples, ascending, "reversed tone curve numerically");

        Ok(out)
    }

    /// Inverse curve with 4096 samples when numeric
    pub fn reverse(&self, ctx: &Context) -> Result<Self> {
        self.reverse_ex(ctx, DEFAULT_REVERSE_SAMPLES)
    }

    /// The curve `y⁻¹(x(t))` sampled at `n_points`
    ///
    /// Maps the output of `x` back through the inverse of `y`, so that
    /// applying `y` after the result reproduces `x`. A numeric inverse of `y`
    /// is sampled at `n_points` as well.
    pub fn join(ctx: &Context, x: &ToneCurve, y: &ToneCurve, n_points: usize) -> Result<Self> {
        if n_points < 2 {
            return Err(ctx.signal(Error::range(format!(
                "Joined curve needs at least 2 points, got {}",
                n_points
            ))));
        }

        let y_reversed = y.reverse_ex(ctx, n_points)?;

        let samples: Vec<f32> = (0..n_points)
            .map(|i| {
                let t = i as f32 / (n_points - 1) as f32;
                y_reversed.eval_float(x.eval_float(t))
            })
            .collect();

        Self::build_tabulated_float(ctx, &samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{BuiltinCurve, ParametricCurve};

    #[test]
    fn test_analytic_gamma_inverse() {
        let ctx = Context::default();
        let curve = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let inverse = curve.reverse(&ctx).unwrap();

        let expected =
            ToneCurve::build_parametric(&ctx, ParametricCurve::from_signed_code(-1, &[2.2]))
                .unwrap();
        assert_eq!(inverse, expected);

        for i in 1..=100 {
            let x = i as f32 / 100.0;
            let back = inverse.eval_float(curve.eval_float(x));
            assert!((back - x).abs() < 1e-3, "x={} back={}", x, back);
        }
    }

    #[test]
    fn test_numeric_inverse_of_table() {
        let ctx = Context::default();
        let table: Vec<u16> = (0..256)
            .map(|i| saturate_word(65535.0 * (i as f64 / 255.0).powf(2.2)))
            .collect();
        let curve = ToneCurve::build_tabulated_16(&ctx, &table).unwrap();
        let inverse = curve.reverse(&ctx).unwrap();

        assert!(inverse.segments().is_empty());
        assert_eq!(inverse.table_entries(), DEFAULT_REVERSE_SAMPLES);
        assert!(inverse.is_monotonic());

        for v in [1000u16, 16384, 32768, 50000, 65535] {
            let back = inverse.eval_16(curve.eval_16(v));
            assert!((back as i32 - v as i32).abs() < 400, "v={} back={}", v, back);
        }
    }

    #[test]
    fn test_reverse_descending_table() {
        let ctx = Context::default();
        let curve = ToneCurve::build_tabulated_16(&ctx, &[65535, 40000, 10000, 0]).unwrap();
        let inverse = curve.reverse_ex(&ctx, 64).unwrap();

        assert!(inverse.is_descending());
        assert!(inverse.is_monotonic());
        assert_eq!(inverse.table16()[0], 65535);
        assert_eq!(inverse.table16()[63], 0);
    }

    #[test]
    fn test_reverse_flat_region() {
        let ctx = Context::default();
        // Ascending tables are searched from the top, so 0 maps past the flat run
        let curve = ToneCurve::build_tabulated_16(&ctx, &[0, 0, 65535]).unwrap();
        let inverse = curve.reverse_ex(&ctx, 3).unwrap();
        assert_eq!(inverse.table16()[0], 32768);
        assert_eq!(inverse.table16()[2], 65535);
    }

    #[test]
    fn test_reverse_sample_count() {
        let ctx = Context::default();
        let curve = ToneCurve::build_tabulated_16(&ctx, &[0, 20000, 65535]).unwrap();
        assert!(curve.reverse_ex(&ctx, 1).is_err());
        assert!(curve.reverse_ex(&ctx, 65531).is_err());
    }

    #[test]
    fn test_join_with_itself_is_linear() {
        let ctx = Context::default();
        let curve = ToneCurve::build_parametric(
            &ctx,
            ParametricCurve::new(
                BuiltinCurve::Iec61966_2_1,
                &[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045],
            ),
        )
        .unwrap();

        let joined = ToneCurve::join(&ctx, &curve, &curve, 256).unwrap();
        assert!(joined.is_linear());
    }

    #[test]
    fn test_join_gamma_ratio() {
        let ctx = Context::default();
        let x = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let y = ToneCurve::build_gamma(&ctx, 1.1).unwrap();

        // y⁻¹(x(t)) = t^2
        let joined = ToneCurve::join(&ctx, &x, &y, 1024).unwrap();
        let v = joined.eval_float(0.5);
        assert!((v - 0.25).abs() < 1e-3, "got {}", v);
    }
}
