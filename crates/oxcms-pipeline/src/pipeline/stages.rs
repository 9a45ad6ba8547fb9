//! Pipeline Stages
//!
//! A stage is one step of a color transform: it reads `input_channels`
//! floats and writes `output_channels` floats. Every stage owns its payload
//! outright, so cloning a stage deep-copies curves, tables and named color
//! lists, and two clones never share mutable state.

use std::fmt;

use crate::color::{Lab, Xyz};
use crate::context::Context;
use crate::curves::ToneCurve;
use crate::error::{Error, Result};
use crate::math::MAX_STAGE_CHANNELS;
use crate::pipeline::clut::Clut;
use crate::pipeline::named::NamedColorStage;

/// Four character type tag of a stage
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageSignature(pub u32);

impl StageSignature {
    /// Per-channel tone curves
    pub const CURVE_SET: Self = Self::from_tag(b"cvst");
    /// Matrix with optional offset
    pub const MATRIX: Self = Self::from_tag(b"matf");
    /// Color lookup table
    pub const CLUT: Self = Self::from_tag(b"clut");
    /// Named color lookup
    pub const NAMED_COLOR: Self = Self::from_tag(b"ncl ");
    /// Passthrough
    pub const IDENTITY: Self = Self::from_tag(b"idn ");
    /// Lab to XYZ PCS conversion
    pub const LAB_TO_XYZ: Self = Self::from_tag(b"l2x ");
    /// XYZ to Lab PCS conversion
    pub const XYZ_TO_LAB: Self = Self::from_tag(b"x2l ");
    /// Clamp negative values to zero
    pub const CLIP_NEGATIVES: Self = Self::from_tag(b"clp ");

    /// Build from a big-endian four byte tag
    pub const fn from_tag(tag: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*tag))
    }

    /// The four tag bytes
    pub const fn to_tag(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for StageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageSignature({})", self)
    }
}

impl fmt::Display for StageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_tag() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Evaluation callback of a custom stage
///
/// Implemented for every `Fn(&[f32], &mut [f32]) + Clone + Send + Sync`
/// closure. Implementations must be pure: the same input always yields the
/// same output, and nothing is remembered between calls.
pub trait StageEvaluator: Send + Sync {
    /// Read `input.len()` values and write `output.len()` values
    fn eval(&self, input: &[f32], output: &mut [f32]);

    /// Clone into a new box
    fn clone_box(&self) -> Box<dyn StageEvaluator>;
}

impl<F> StageEvaluator for F
where
    F: Fn(&[f32], &mut [f32]) + Clone + Send + Sync + 'static,
{
    fn eval(&self, input: &[f32], output: &mut [f32]) {
        self(input, output)
    }

    fn clone_box(&self) -> Box<dyn StageEvaluator> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn StageEvaluator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Debug for dyn StageEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StageEvaluator")
    }
}

/// Matrix stage payload
///
/// `rows` outputs from `cols` inputs: `out[i] = Σ in[j] · m[i·cols + j] + offset[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixStage {
    pub rows: usize,
    pub cols: usize,
    /// Row-major, `rows · cols` values
    pub coefficients: Vec<f64>,
    /// One value per row
    pub offset: Option<Vec<f64>>,
}

impl MatrixStage {
    #[inline]
    fn eval(&self, input: &[f32], output: &mut [f32]) {
        for (i, out) in output.iter_mut().enumerate().take(self.rows) {
            let row = &self.coefficients[i * self.cols..(i + 1) * self.cols];
            let mut acc: f64 = row
                .iter()
                .zip(input)
                .map(|(&m, &v)| v as f64 * m)
                .sum();
            if let Some(offset) = &self.offset {
                acc += offset[i];
            }
            *out = acc as f32;
        }
    }
}

/// Payload of a stage
#[derive(Debug, Clone)]
pub enum StageKind {
    /// Copies input to output
    Identity,
    /// Linear map with optional offset
    Matrix(MatrixStage),
    /// One tone curve per channel
    Curves(Vec<ToneCurve>),
    /// Grid lookup
    Clut(Clut),
    /// Index into a named color list
    NamedColor(NamedColorStage),
    /// Normalized Lab to normalized XYZ
    LabToXyz,
    /// Normalized XYZ to normalized Lab
    XyzToLab,
    /// Negative values become zero
    ClipNegatives,
    /// Caller supplied evaluator
    Custom(Box<dyn StageEvaluator>),
}

/// A single pipeline stage
#[derive(Debug, Clone)]
pub struct Stage {
    pub(crate) signature: StageSignature,
    pub(crate) implements: StageSignature,
    pub(crate) input_channels: usize,
    pub(crate) output_channels: usize,
    pub(crate) kind: StageKind,
}

impl Stage {
    /// Check channel counts and assemble a stage
    pub(crate) fn allocate(
        ctx: &Context,
        signature: StageSignature,
        input_channels: usize,
        output_channels: usize,
        kind: StageKind,
    ) -> Result<Self> {
        if !(1..=MAX_STAGE_CHANNELS).contains(&input_channels)
            || !(1..=MAX_STAGE_CHANNELS).contains(&output_channels)
        {
            return Err(ctx.signal(Error::range(format!(
                "Stage channels {} -> {} out of range 1..={}",
                input_channels, output_channels, MAX_STAGE_CHANNELS
            ))));
        }

        Ok(Self {
            signature,
            implements: signature,
            input_channels,
            output_channels,
            kind,
        })
    }

    /// Stage evaluated by a caller supplied function
    ///
    /// # Errors
    /// `Range` when a channel count is outside `1..=128`.
    pub fn custom<E>(
        ctx: &Context,
        signature: StageSignature,
        input_channels: usize,
        output_channels: usize,
        evaluator: E,
    ) -> Result<Self>
    where
        E: StageEvaluator + 'static,
    {
        Self::allocate(
            ctx,
            signature,
            input_channels,
            output_channels,
            StageKind::Custom(Box::new(evaluator)),
        )
    }

    /// Passthrough of `n` channels
    pub fn identity(ctx: &Context, n: usize) -> Result<Self> {
        Self::allocate(ctx, StageSignature::IDENTITY, n, n, StageKind::Identity)
    }

    /// Matrix stage with `rows` outputs and `cols` inputs
    ///
    /// `coefficients` is row-major. Evaluation accumulates in f64.
    ///
    /// # Errors
    /// `Range` when `coefficients` does not hold `rows · cols` values, when
    /// `offset` does not hold `rows` values, or on bad channel counts.
    pub fn matrix(
        ctx: &Context,
        rows: usize,
        cols: usize,
        coefficients: &[f64],
        offset: Option<&[f64]>,
    ) -> Result<Self> {
        let n = rows.checked_mul(cols).unwrap_or(usize::MAX);
        if coefficients.len() != n {
            return Err(ctx.signal(Error::range(format!(
                "Matrix {}x{} needs {} coefficients, got {}",
                rows,
                cols,
                n,
                coefficients.len()
            ))));
        }
        if let Some(offset) = offset {
            if offset.len() != rows {
                return Err(ctx.signal(Error::range(format!(
                    "Matrix offset needs {} values, got {}",
                    rows,
                    offset.len()
                ))));
            }
        }

        let matrix = MatrixStage {
            rows,
            cols,
            coefficients: coefficients.to_vec(),
            offset: offset.map(<[f64]>::to_vec),
        };
        Self::allocate(ctx, StageSignature::MATRIX, cols, rows, StageKind::Matrix(matrix))
    }

    /// One curve per channel
    pub fn tone_curves(ctx: &Context, curves: Vec<ToneCurve>) -> Result<Self> {
        let n = curves.len();
        Self::allocate(ctx, StageSignature::CURVE_SET, n, n, StageKind::Curves(curves))
    }

    /// `n` gamma 1.0 curves, tagged as implementing identity
    pub fn identity_curves(ctx: &Context, n: usize) -> Result<Self> {
        if !(1..=MAX_STAGE_CHANNELS).contains(&n) {
            return Err(ctx.signal(Error::range(format!(
                "Identity curves: bad channel count {}",
                n
            ))));
        }
        let curve = ToneCurve::build_gamma(ctx, 1.0)?;
        let mut stage = Self::tone_curves(ctx, vec![curve; n])?;
        stage.implements = StageSignature::IDENTITY;
        Ok(stage)
    }

    /// Normalized Lab to normalized XYZ
    pub fn lab_to_xyz(ctx: &Context) -> Result<Self> {
        Self::allocate(ctx, StageSignature::LAB_TO_XYZ, 3, 3, StageKind::LabToXyz)
    }

    /// Normalized XYZ to normalized Lab
    pub fn xyz_to_lab(ctx: &Context) -> Result<Self> {
        Self::allocate(ctx, StageSignature::XYZ_TO_LAB, 3, 3, StageKind::XyzToLab)
    }

    /// Clamp negative values of `n` channels to zero
    pub fn clip_negatives(ctx: &Context, n: usize) -> Result<Self> {
        Self::allocate(ctx, StageSignature::CLIP_NEGATIVES, n, n, StageKind::ClipNegatives)
    }

    pub fn signature(&self) -> StageSignature {
        self.signature
    }

    /// What the stage is equivalent to; usually its own signature
    pub fn implements(&self) -> StageSignature {
        self.implements
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn kind(&self) -> &StageKind {
        &self.kind
    }

    /// Tone curves of a curve set stage
    pub fn curves(&self) -> Option<&[ToneCurve]> {
        match &self.kind {
            StageKind::Curves(curves) => Some(curves),
            _ => None,
        }
    }

    /// Evaluate the stage
    ///
    /// `input` holds at least `input_channels` values and `output` room for
    /// `output_channels` values.
    pub fn eval(&self, input: &[f32], output: &mut [f32]) {
        let input = &input[..self.input_channels];
        let output = &mut output[..self.output_channels];

        match &self.kind {
            StageKind::Identity => output.copy_from_slice(input),
            StageKind::Matrix(matrix) => matrix.eval(input, output),
            StageKind::Curves(curves) => {
                for ((out, &v), curve) in output.iter_mut().zip(input).zip(curves) {
                    *out = curve.eval_float(v);
                }
            }
            StageKind::Clut(clut) => clut.eval(input, output),
            StageKind::NamedColor(named) => named.eval(input, output),
            StageKind::LabToXyz => Lab::from_pcs_float(input).to_xyz().to_pcs_float(output),
            StageKind::XyzToLab => {
                Lab::from_xyz(Xyz::from_pcs_float(input)).to_pcs_float(output)
            }
            StageKind::ClipNegatives => {
                for (out, &v) in output.iter_mut().zip(input) {
                    *out = if v < 0.0 { 0.0 } else { v };
                }
            }
            StageKind::Custom(evaluator) => evaluator.eval(input, output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CollectingSink;
    use crate::error::ErrorCode;
    use std::sync::Arc;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_signature_tags() {
        assert_eq!(StageSignature::CURVE_SET.0, 0x63767374);
        assert_eq!(StageSignature::CLUT.to_tag(), *b"clut");
        assert_eq!(StageSignature::NAMED_COLOR.to_string(), "ncl ");
    }

    #[test]
    fn test_identity() {
        let ctx = Context::default();
        let stage = Stage::identity(&ctx, 4).unwrap();
        let mut out = [0.0f32; 4];
        stage.eval(&[0.1, 0.2, 0.3, 0.4], &mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_matrix_with_offset() {
        let ctx = Context::default();
        let stage = Stage::matrix(
            &ctx,
            2,
            3,
            &[1.0, 2.0, 3.0, 0.0, 0.5, 0.0],
            Some(&[0.25, -0.25][..]),
        )
        .unwrap();

        assert_eq!(stage.input_channels(), 3);
        assert_eq!(stage.output_channels(), 2);

        let mut out = [0.0f32; 2];
        stage.eval(&[0.1, 0.2, 0.3], &mut out);
        assert!((out[0] - 1.65).abs() < EPSILON, "got {}", out[0]);
        assert!((out[1] - (-0.15)).abs() < EPSILON, "got {}", out[1]);
    }

    #[test]
    fn test_matrix_size_errors() {
        let sink = Arc::new(CollectingSink::new());
        let ctx = Context::new().with_error_sink(sink.clone());

        assert!(Stage::matrix(&ctx, 3, 3, &[1.0; 8], None).is_err());
        assert!(Stage::matrix(&ctx, 3, 3, &[1.0; 9], Some(&[0.0; 2][..])).is_err());
        assert_eq!(sink.len(), 2);
        assert!(sink.errors().iter().all(|(code, _)| *code == ErrorCode::Range));
    }

    #[test]
    fn test_channel_limits() {
        let ctx = Context::default();
        assert!(Stage::identity(&ctx, 0).is_err());
        assert!(Stage::identity(&ctx, MAX_STAGE_CHANNELS).is_ok());
        assert!(Stage::identity(&ctx, MAX_STAGE_CHANNELS + 1).is_err());
    }

    #[test]
    fn test_identity_curves() {
        let ctx = Context::default();
        let stage = Stage::identity_curves(&ctx, 3).unwrap();
        assert_eq!(stage.signature(), StageSignature::CURVE_SET);
        assert_eq!(stage.implements(), StageSignature::IDENTITY);

        let mut out = [0.0f32; 3];
        stage.eval(&[0.0, 0.5, 1.0], &mut out);
        for (a, b) in out.iter().zip([0.0, 0.5, 1.0]) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_tone_curves_clone_is_deep() {
        let ctx = Context::default();
        let curve = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
        let stage = Stage::tone_curves(&ctx, vec![curve.clone(), curve]).unwrap();
        let copy = stage.clone();
        drop(stage);

        let mut out = [0.0f32; 2];
        copy.eval(&[0.5, 0.5], &mut out);
        assert!((out[0] - 0.5f32.powf(2.2)).abs() < 1e-4);
        assert_eq!(copy.curves().map(<[ToneCurve]>::len), Some(2));
    }

    #[test]
    fn test_lab_xyz_roundtrip() {
        let ctx = Context::default();
        let to_xyz = Stage::lab_to_xyz(&ctx).unwrap();
        let to_lab = Stage::xyz_to_lab(&ctx).unwrap();

        let lab = [0.5f32, 0.6, 0.3];
        let mut xyz = [0.0f32; 3];
        let mut back = [0.0f32; 3];
        to_xyz.eval(&lab, &mut xyz);
        to_lab.eval(&xyz, &mut back);

        for (a, b) in lab.iter().zip(&back) {
            assert!((a - b).abs() < 1e-4, "{:?} vs {:?}", lab, back);
        }
    }

    #[test]
    fn test_lab_white_to_xyz() {
        let ctx = Context::default();
        let stage = Stage::lab_to_xyz(&ctx).unwrap();

        // L = 100, a = b = 0
        let mut xyz = [0.0f32; 3];
        stage.eval(&[1.0, 128.0 / 255.0, 128.0 / 255.0], &mut xyz);
        let white = Xyz::from_pcs_float(&xyz);
        assert!((white.x - 0.9642).abs() < 1e-4);
        assert!((white.y - 1.0).abs() < 1e-4);
        assert!((white.z - 0.8249).abs() < 1e-4);
    }

    #[test]
    fn test_clip_negatives() {
        let ctx = Context::default();
        let stage = Stage::clip_negatives(&ctx, 3).unwrap();
        let mut out = [9.0f32; 3];
        stage.eval(&[-0.5, 0.0, 1.5], &mut out);
        assert_eq!(out, [0.0, 0.0, 1.5]);
    }

    #[test]
    fn test_custom_stage() {
        let ctx = Context::default();
        let gain = 2.0f32;
        let stage = Stage::custom(
            &ctx,
            StageSignature::from_tag(b"gain"),
            2,
            1,
            move |input: &[f32], output: &mut [f32]| output[0] = (input[0] + input[1]) * gain,
        )
        .unwrap();

        let copy = stage.clone();
        let mut out = [0.0f32; 1];
        copy.eval(&[0.25, 0.5], &mut out);
        assert_eq!(out[0], 1.5);
        assert_eq!(copy.signature().to_string(), "gain");
    }
}
