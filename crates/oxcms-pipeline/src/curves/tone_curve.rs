//! Tone curves
//!
//! A [`ToneCurve`] is either a plain 16-bit table or a list of segments,
//! each a parametric formula or a sampled float table. Segmented curves also
//! carry a 16-bit approximation for fast fixed point evaluation.
//!
//! Curves are values: clone to duplicate, drop to release. The only
//! mutation after construction is [`ToneCurve::smooth`].

use std::sync::Arc;

use crate::context::Context;
use crate::curves::parametric::{
    BuiltinCurve, CurveKind, Direction, MAX_PARAMS, MINUS_INF, PLUS_INF, ParametricCurve,
    ParametricCurveEvaluator,
};
use crate::error::{Error, Result};
use crate::math::fixed::{quantize_val, saturate_word};
use crate::math::interpolation::{InterpFlags, InterpParams};

/// Maximum number of entries of a 16-bit curve table
pub const MAX_TABLE_ENTRIES: usize = 65530;

/// Sample count used when probing curves (gamma estimation, smoothing limit)
pub(crate) const MAX_NODES_IN_CURVE: usize = 4097;

/// Entries of the 16-bit approximation of a segmented curve
const SEGMENTED_TABLE_ENTRIES: usize = 4096;

/// Shape of one curve segment
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentShape {
    /// Closed-form formula
    Parametric(ParametricCurve),
    /// Float samples evenly spread over the segment domain
    Sampled(Vec<f32>),
}

/// A curve segment covering `(x0, x1]`
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSegment {
    pub x0: f32,
    pub x1: f32,
    pub shape: SegmentShape,
}

impl CurveSegment {
    pub fn parametric(x0: f32, x1: f32, curve: ParametricCurve) -> Self {
        Self {
            x0,
            x1,
            shape: SegmentShape::Parametric(curve),
        }
    }

    pub fn sampled(x0: f32, x1: f32, points: Vec<f32>) -> Self {
        Self {
            x0,
            x1,
            shape: SegmentShape::Sampled(points),
        }
    }
}

/// Resolved evaluation state of a segment, built alongside its shape
#[derive(Debug, Clone)]
enum SegmentEval {
    Parametric(Arc<dyn ParametricCurveEvaluator>),
    Sampled(InterpParams),
}

/// A per-channel transfer function
#[derive(Debug, Clone)]
pub struct ToneCurve {
    segments: Vec<CurveSegment>,
    evals: Vec<SegmentEval>,
    pub(crate) table16: Vec<u16>,
    interp: InterpParams,
}

impl PartialEq for ToneCurve {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.table16 == other.table16
    }
}

/// Linear gamma curves only need the two endpoints
fn entries_by_gamma(gamma: f64) -> usize {
    if (gamma - 1.0).abs() < 0.001 {
        2
    } else {
        SEGMENTED_TABLE_ENTRIES
    }
}

impl ToneCurve {
    /// Validate segments and build the table interpolation
    ///
    /// The table is copied from `values`, or zero-filled when `None`.
    pub(crate) fn allocate(
        ctx: &Context,
        segments: Vec<CurveSegment>,
        n_entries: usize,
        values: Option<&[u16]>,
    ) -> Result<Self> {
        if n_entries == 0 && segments.is_empty() {
            return Err(ctx.signal(Error::range(
                "Couldn't create tone curve of zero segments and no table",
            )));
        }
        if n_entries > MAX_TABLE_ENTRIES {
            return Err(ctx.signal(Error::range(format!(
                "Couldn't create tone curve of more than {} entries",
                MAX_TABLE_ENTRIES
            ))));
        }

        let evals = resolve_segments(ctx, &segments)?;
        let interp = InterpParams::new(ctx, &[n_entries as u32], 1, InterpFlags::u16())?;

        let table16 = match values {
            Some(v) => v.to_vec(),
            None => vec![0; n_entries],
        };

        Ok(Self {
            segments,
            evals,
            table16,
            interp,
        })
    }

    /// Build a table-only curve from 16-bit samples
    ///
    /// # Errors
    /// `Range` for an empty table or more than 65530 entries.
    pub fn build_tabulated_16(ctx: &Context, values: &[u16]) -> Result<Self> {
        Self::allocate(ctx, Vec::new(), values.len(), Some(values))
    }

    /// Build a curve from float samples over `[0, 1]`
    ///
    /// Outside that interval the curve holds the first and last sample.
    pub fn build_tabulated_float(ctx: &Context, values: &[f32]) -> Result<Self> {
        let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
            return Err(ctx.signal(Error::range(
                "Couldn't create tone curve of zero segments and no table",
            )));
        };

        let constant =
            |v: f32| ParametricCurve::new(BuiltinCurve::OffsetGamma, &[1.0, 0.0, 0.0, v as f64]);

        let segments = vec![
            CurveSegment::parametric(MINUS_INF as f32, 0.0, constant(first)),
            CurveSegment::sampled(0.0, 1.0, values.to_vec()),
            CurveSegment::parametric(1.0, PLUS_INF as f32, constant(last)),
        ];

        Self::build_segmented(ctx, segments)
    }

    /// Build a curve from a list of segments
    ///
    /// # Errors
    /// - `Range` for an empty list, an empty sampled segment, unsorted
    ///   segments or missing parameters
    /// - `UnknownExtension` for a parametric kind no evaluator handles
    pub fn build_segmented(ctx: &Context, segments: Vec<CurveSegment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(ctx.signal(Error::range("Segmented curve without segments")));
        }

        let n_entries = match segments.as_slice() {
            [CurveSegment {
                shape: SegmentShape::Parametric(curve),
                ..
            }] if curve.kind.code() == 1 && curve.direction == Direction::Forward => {
                entries_by_gamma(curve.params.first().copied().unwrap_or(1.0))
            }
            _ => SEGMENTED_TABLE_ENTRIES,
        };

        let mut curve = Self::allocate(ctx, segments, n_entries, None)?;

        for i in 0..n_entries {
            let r = i as f64 / (n_entries - 1) as f64;
            curve.table16[i] = saturate_word(curve.eval_segmented(r) * 65535.0);
        }

        tracing::debug!(
            segments = curve.segments.len(),
            entries = n_entries,
            "built segmented tone curve"
        );

        Ok(curve)
    }

    /// Build a single-segment parametric curve over the whole real line
    pub fn build_parametric(ctx: &Context, curve: ParametricCurve) -> Result<Self> {
        Self::build_segmented(
            ctx,
            vec![CurveSegment::parametric(
                MINUS_INF as f32,
                PLUS_INF as f32,
                curve,
            )],
        )
    }

    /// Build a power curve `y = x^gamma`
    pub fn build_gamma(ctx: &Context, gamma: f64) -> Result<Self> {
        Self::build_parametric(ctx, ParametricCurve::gamma(gamma))
    }

    /// Evaluate the segment list at `r`
    ///
    /// The last segment with `x0 < r <= x1` wins. Infinite results are
    /// clamped to the ±1e22 sentinels; no match gives -1e22.
    pub(crate) fn eval_segmented(&self, r: f64) -> f64 {
        for (seg, eval) in self.segments.iter().zip(&self.evals).rev() {
            if r > seg.x0 as f64 && r <= seg.x1 as f64 {
                let out = match (&seg.shape, eval) {
                    (SegmentShape::Sampled(points), SegmentEval::Sampled(params)) => {
                        let r1 = (r - seg.x0 as f64) as f32 / (seg.x1 - seg.x0);
                        let mut out = [0.0f32];
                        params.eval_float(points, &[r1], &mut out);
                        out[0] as f64
                    }
                    (SegmentShape::Parametric(curve), SegmentEval::Parametric(evaluator)) => {
                        evaluator.eval(curve.kind.code(), curve.direction, &curve.params, r)
                    }
                    // Shapes and evaluators are resolved pairwise
                    _ => MINUS_INF,
                };

                if out.is_infinite() {
                    return if out > 0.0 { PLUS_INF } else { MINUS_INF };
                }
                return out;
            }
        }

        MINUS_INF
    }

    /// Evaluate through the 16-bit table
    #[inline]
    pub fn eval_16(&self, v: u16) -> u16 {
        let mut out = [0u16];
        self.interp.eval_16(&self.table16, &[v], &mut out);
        out[0]
    }

    /// Evaluate in floating point
    ///
    /// Segmented curves are evaluated directly; table-only curves go through
    /// the 16-bit table.
    pub fn eval_float(&self, v: f32) -> f32 {
        if self.segments.is_empty() {
            let input = saturate_word(v as f64 * 65535.0);
            return (self.eval_16(input) as f64 / 65535.0) as f32;
        }

        self.eval_segmented(v as f64) as f32
    }

    /// Segments of the curve, empty for table-only curves
    pub fn segments(&self) -> &[CurveSegment] {
        &self.segments
    }

    /// The 16-bit table
    pub fn table16(&self) -> &[u16] {
        &self.table16
    }

    /// Number of entries in the 16-bit table
    pub fn table_entries(&self) -> usize {
        self.table16.len()
    }

    /// More than one segment
    pub fn is_multisegment(&self) -> bool {
        self.segments.len() > 1
    }

    /// The parametric definition of a single-segment parametric curve
    pub fn parametric_type(&self) -> Option<&ParametricCurve> {
        match self.segments.as_slice() {
            [CurveSegment {
                shape: SegmentShape::Parametric(curve),
                ..
            }] => Some(curve),
            _ => None,
        }
    }

    /// Every table entry lies within 0x0f of the identity ramp
    pub fn is_linear(&self) -> bool {
        let n = self.table16.len() as u32;
        self.table16
            .iter()
            .enumerate()
            .all(|(i, &v)| (v as i32 - quantize_val(i as f64, n) as i32).abs() <= 0x0f)
    }

    /// Last entry below the first
    pub fn is_descending(&self) -> bool {
        match (self.table16.first(), self.table16.last()) {
            (Some(first), Some(last)) => first > last,
            _ => false,
        }
    }

    /// Monotonic in its overall direction, allowing a ripple of 2 units
    pub fn is_monotonic(&self) -> bool {
        let t = &self.table16;
        if t.len() < 2 {
            return true;
        }

        if self.is_descending() {
            let mut last = t[0] as i32;
            for &v in &t[1..] {
                if v as i32 - last > 2 {
                    return false;
                }
                last = v as i32;
            }
        } else {
            let mut last = t[t.len() - 1] as i32;
            for &v in t[..t.len() - 1].iter().rev() {
                if v as i32 - last > 2 {
                    return false;
                }
                last = v as i32;
            }
        }

        true
    }

    /// Estimate the exponent of a curve behaving like `y = x^g`
    ///
    /// Averages `ln y / ln x` over interior samples, skipping the lowest 7%
    /// where linear toes live. Returns `None` with fewer than two usable
    /// samples or when the standard deviation exceeds `precision`.
    pub fn estimate_gamma(&self, precision: f64) -> Option<f64> {
        let mut sum = 0.0;
        let mut sum2 = 0.0;
        let mut n = 0.0;

        for i in 1..MAX_NODES_IN_CURVE - 1 {
            let x = i as f64 / (MAX_NODES_IN_CURVE - 1) as f64;
            let y = self.eval_float(x as f32) as f64;

            if y > 0.0 && y < 1.0 && x > 0.07 {
                let gamma = y.ln() / x.ln();
                sum += gamma;
                sum2 += gamma * gamma;
                n += 1.0;
            }
        }

        if n <= 1.0 {
            return None;
        }

        let std = ((n * sum2 - sum * sum) / (n * (n - 1.0))).max(0.0).sqrt();
        if std > precision {
            return None;
        }

        Some(sum / n)
    }
}

fn resolve_segments(ctx: &Context, segments: &[CurveSegment]) -> Result<Vec<SegmentEval>> {
    let mut evals = Vec::with_capacity(segments.len());

    for (i, seg) in segments.iter().enumerate() {
        if i > 0 && seg.x0 < segments[i - 1].x0 {
            return Err(ctx.signal(Error::range(format!(
                "Curve segment {} starts before segment {}",
                i,
                i - 1
            ))));
        }

        let eval = match &seg.shape {
            SegmentShape::Sampled(points) => {
                if points.is_empty() {
                    return Err(ctx.signal(Error::range(format!(
                        "Sampled curve segment {} has no points",
                        i
                    ))));
                }
                SegmentEval::Sampled(InterpParams::new(
                    ctx,
                    &[points.len() as u32],
                    1,
                    InterpFlags::float(),
                )?)
            }
            SegmentShape::Parametric(curve) => {
                SegmentEval::Parametric(resolve_parametric(ctx, curve)?)
            }
        };
        evals.push(eval);
    }

    Ok(evals)
}

fn resolve_parametric(
    ctx: &Context,
    curve: &ParametricCurve,
) -> Result<Arc<dyn ParametricCurveEvaluator>> {
    let Some((evaluator, count)) = ctx.curves().resolve(curve.kind.code()) else {
        return Err(ctx.signal(Error::unknown_extension(format!(
            "Unsupported parametric curve type {}",
            curve.signed_code()
        ))));
    };

    if curve.params.len() < count || curve.params.len() > MAX_PARAMS {
        return Err(ctx.signal(Error::range(format!(
            "Parametric curve type {} takes {} parameters, got {}",
            curve.signed_code(),
            count,
            curve.params.len()
        ))));
    }

    if let CurveKind::Custom(code) = curve.kind {
        tracing::trace!(code, "resolved custom parametric curve");
    }

    Ok(evaluator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CollectingSink;
    use crate::error::ErrorCode;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_gamma_eval_float() {
        let ctx = Context::default();
        let curve = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let y = curve.eval_float(0.5);
        assert!((y - 0.5f32.powf(2.2)).abs() < EPSILON, "got {}", y);
        assert_eq!(curve.table_entries(), 4096);
    }

    #[test]
    fn test_linear_gamma_uses_two_entries() {
        let ctx = Context::default();
        let curve = ToneCurve::build_gamma(&ctx, 1.0).unwrap();
        assert_eq!(curve.table16(), &[0, 65535]);
        assert!(curve.is_linear());
        assert_eq!(curve.eval_16(12345), 12345);
    }

    #[test]
    fn test_identity_ramp_midpoint() {
        let ctx = Context::default();
        let curve = ToneCurve::build_tabulated_16(&ctx, &[0, 65535]).unwrap();
        assert_eq!(curve.eval_16(32768), 32768);
        assert!(curve.segments().is_empty());
    }

    #[test]
    fn test_table_only_float_eval() {
        let ctx = Context::default();
        let curve = ToneCurve::build_tabulated_16(&ctx, &[0, 32768, 65535]).unwrap();
        assert!((curve.eval_float(0.25) - 0.25).abs() < 1e-4);
        assert_eq!(curve.eval_float(-1.0), 0.0);
        assert_eq!(curve.eval_float(2.0), 1.0);
    }

    #[test]
    fn test_empty_table_rejected() {
        let sink = Arc::new(CollectingSink::new());
        let ctx = Context::new().with_error_sink(sink.clone());

        let err = ToneCurve::build_tabulated_16(&ctx, &[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Range);
        assert_eq!(sink.len(), 1);

        assert!(ToneCurve::build_tabulated_float(&ctx, &[]).is_err());
        assert!(ToneCurve::build_segmented(&ctx, Vec::new()).is_err());
    }

    #[test]
    fn test_oversized_table_rejected() {
        let ctx = Context::default();
        let table = vec![0u16; MAX_TABLE_ENTRIES + 1];
        let err = ToneCurve::build_tabulated_16(&ctx, &table).unwrap_err();
        assert!(matches!(err, Error::Range(_)));

        let table = vec![0u16; MAX_TABLE_ENTRIES];
        assert!(ToneCurve::build_tabulated_16(&ctx, &table).is_ok());
    }

    #[test]
    fn test_unknown_parametric_kind() {
        let sink = Arc::new(CollectingSink::new());
        let ctx = Context::new().with_error_sink(sink.clone());

        let curve = ParametricCurve::new(CurveKind::Custom(42), &[1.0]);
        let err = ToneCurve::build_parametric(&ctx, curve).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownExtension);
        assert_eq!(sink.errors()[0].0, ErrorCode::UnknownExtension);
    }

    #[test]
    fn test_missing_parameters() {
        let ctx = Context::default();
        let curve = ParametricCurve::new(BuiltinCurve::Iec61966_2_1, &[2.4, 1.0]);
        let err = ToneCurve::build_parametric(&ctx, curve).unwrap_err();
        assert!(matches!(err, Error::Range(_)));
    }

    #[test]
    fn test_tabulated_float_hits_samples() {
        let ctx = Context::default();
        let values = [0.0f32, 0.1, 0.4, 0.9, 1.0];
        let curve = ToneCurve::build_tabulated_float(&ctx, &values).unwrap();
        assert_eq!(curve.segments().len(), 3);
        assert!(curve.is_multisegment());

        for (i, &v) in values.iter().enumerate() {
            let x = i as f32 / 4.0;
            assert!((curve.eval_float(x) - v).abs() < 1e-6, "node {}", i);
        }

        // Constant extension outside [0, 1]
        assert!((curve.eval_float(-3.0) - 0.0).abs() < 1e-6);
        assert!((curve.eval_float(7.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_segment_outside_every_domain() {
        let ctx = Context::default();
        let seg = CurveSegment::parametric(0.0, 1.0, ParametricCurve::gamma(2.0));
        let curve = ToneCurve::build_segmented(&ctx, vec![seg]).unwrap();
        assert_eq!(curve.eval_segmented(-0.5), MINUS_INF);
        assert_eq!(curve.eval_segmented(0.0), MINUS_INF);
        assert!((curve.eval_segmented(0.5) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_infinite_results_clamped() {
        let ctx = Context::default();
        // 10^(400) overflows to +inf
        let curve = ToneCurve::build_parametric(
            &ctx,
            ParametricCurve::new(BuiltinCurve::Exponential, &[1.0, 10.0, 400.0, 0.0, 0.0]),
        )
        .unwrap();
        assert_eq!(curve.eval_segmented(1.0), PLUS_INF);
        assert_eq!(curve.eval_16(0xffff), 0xffff);
    }

    #[test]
    fn test_monotonic_gammas() {
        let ctx = Context::default();
        for gamma in [0.1, 0.5, 1.0, 2.2, 8.0] {
            let curve = ToneCurve::build_gamma(&ctx, gamma).unwrap();
            assert!(curve.is_monotonic(), "gamma {}", gamma);
            assert!(!curve.is_descending(), "gamma {}", gamma);
        }
    }

    #[test]
    fn test_descending_and_non_monotonic() {
        let ctx = Context::default();
        let down = ToneCurve::build_tabulated_16(&ctx, &[65535, 40000, 20000, 0]).unwrap();
        assert!(down.is_descending());
        assert!(down.is_monotonic());

        let bumpy = ToneCurve::build_tabulated_16(&ctx, &[0, 30000, 20000, 65535]).unwrap();
        assert!(!bumpy.is_monotonic());

        // Small ripple is tolerated
        let ripple = ToneCurve::build_tabulated_16(&ctx, &[0, 30002, 30000, 65535]).unwrap();
        assert!(ripple.is_monotonic());
    }

    #[test]
    fn test_is_linear_tolerance() {
        let ctx = Context::default();
        let near = ToneCurve::build_tabulated_16(&ctx, &[0, 32768 + 15, 65535]).unwrap();
        assert!(near.is_linear());
        let far = ToneCurve::build_tabulated_16(&ctx, &[0, 32768 + 16, 65535]).unwrap();
        assert!(!far.is_linear());
    }

    #[test]
    fn test_estimate_gamma() {
        let ctx = Context::default();
        let curve = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let gamma = curve.estimate_gamma(0.01).unwrap();
        assert!((gamma - 2.2).abs() < 1e-3, "estimated {}", gamma);

        let srgb = ToneCurve::build_parametric(
            &ctx,
            ParametricCurve::new(
                BuiltinCurve::Iec61966_2_1,
                &[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045],
            ),
        )
        .unwrap();
        // Not a pure power law
        assert!(srgb.estimate_gamma(0.001).is_none());
        let loose = srgb.estimate_gamma(1.0).unwrap();
        assert!(loose > 2.0 && loose < 2.4, "estimated {}", loose);
    }

    #[test]
    fn test_parametric_type() {
        let ctx = Context::default();
        let curve = ToneCurve::build_gamma(&ctx, 1.8).unwrap();
        assert_eq!(curve.parametric_type().map(|c| c.signed_code()), Some(1));

        let table = ToneCurve::build_tabulated_16(&ctx, &[0, 65535]).unwrap();
        assert!(table.parametric_type().is_none());
    }

    #[test]
    fn test_clone_is_deep_and_equal() {
        let ctx = Context::default();
        let curve = ToneCurve::build_tabulated_float(&ctx, &[0.0, 0.3, 1.0]).unwrap();
        let mut copy = curve.clone();
        assert_eq!(curve, copy);

        copy.table16[10] ^= 1;
        assert_ne!(curve, copy);
    }

    #[test]
    fn test_unsorted_segments_rejected() {
        let ctx = Context::default();
        let segments = vec![
            CurveSegment::parametric(0.0, 1.0, ParametricCurve::gamma(2.0)),
            CurveSegment::parametric(-1.0, 0.0, ParametricCurve::gamma(1.0)),
        ];
        assert!(matches!(
            ToneCurve::build_segmented(&ctx, segments),
            Err(Error::Range(_))
        ));
    }
}
