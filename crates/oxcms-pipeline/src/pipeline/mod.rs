//! Color Transform Pipeline
//!
//! A pipeline is an ordered chain of [`Stage`]s implementing one end-to-end
//! color conversion. It supports:
//! - Building by insertion at either end, and concatenation
//! - 16-bit and float evaluation
//! - An optional fused evaluator installed by an optimization pass
//! - Newton inversion of 3 and 4 input pipelines
//!
//! # Pipeline Architecture
//!
//! Evaluation threads a pair of `MAX_STAGE_CHANNELS` float buffers through
//! the stages, each stage reading one and writing the other. The 16-bit entry
//! point normalizes by 1/65535 on the way in and rounds with saturation on
//! the way out.
//!
//! Building needs `&mut self`; evaluation only `&self`. A finished pipeline
//! can be shared between threads and evaluated concurrently.

mod clut;
mod named;
mod stages;

pub use clut::{Clut, ClutTable, SamplerFlags, slice_space_16, slice_space_float};
pub use named::{MAX_COLORANTS, NamedColor, NamedColorList, NamedColorStage};
pub use stages::{MatrixStage, Stage, StageEvaluator, StageKind, StageSignature};

use std::fmt;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::fixed::saturate_word;
use crate::math::{MAX_STAGE_CHANNELS, Matrix3x3};

/// Pipelines carry fewer channels than this at either end
pub const MAX_PIPELINE_CHANNELS: usize = 16;

/// Newton iterations of reverse evaluation
const INVERSION_MAX_ITERATIONS: usize = 30;

/// Finite difference step of the Jacobian
const JACOBIAN_EPSILON: f32 = 0.001;

/// Where [`Pipeline::insert_stage`] puts a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLoc {
    Begin,
    End,
}

/// Replacement evaluator for a whole pipeline
///
/// Installed by an optimization pass that collapses the stage chain into a
/// single kernel. Once installed it answers every evaluation; the stages are
/// kept for introspection only.
pub trait FusedEvaluator: Send + Sync {
    fn eval_16(&self, input: &[u16], output: &mut [u16]);

    fn eval_float(&self, input: &[f32], output: &mut [f32]);

    /// Clone into a new box; called when the pipeline is cloned
    fn clone_box(&self) -> Box<dyn FusedEvaluator>;
}

impl Clone for Box<dyn FusedEvaluator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// An ordered chain of stages
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    input_channels: usize,
    output_channels: usize,
    fused: Option<Box<dyn FusedEvaluator>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("input_channels", &self.input_channels)
            .field("output_channels", &self.output_channels)
            .field("stages", &self.stages)
            .field("optimized", &self.fused.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Create an empty pipeline
    ///
    /// # Errors
    /// `Range` when either channel count is 16 or more.
    pub fn new(ctx: &Context, input_channels: usize, output_channels: usize) -> Result<Self> {
        check_channel_limit(ctx, input_channels, output_channels)?;

        Ok(Self {
            stages: Vec::new(),
            input_channels,
            output_channels,
            fused: None,
        })
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages.first()
    }

    pub fn last_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// Whether a fused evaluator is installed
    pub fn is_optimized(&self) -> bool {
        self.fused.is_some()
    }

    /// Stages are frozen once a fused evaluator stands in for them
    fn check_mutable(&self, ctx: &Context) -> Result<()> {
        if self.fused.is_some() {
            return Err(ctx.signal(Error::internal(
                "Cannot change the stages of an optimized pipeline",
            )));
        }
        Ok(())
    }

    fn update_channels(&mut self) {
        if let (Some(first), Some(last)) = (self.stages.first(), self.stages.last()) {
            self.input_channels = first.input_channels;
            self.output_channels = last.output_channels;
        }
    }

    /// Insert a stage at either end
    ///
    /// The stage must chain with its new neighbour; the first stage of an
    /// empty pipeline is unconstrained. Afterwards the pipeline's channel
    /// counts are those of its first and last stage.
    ///
    /// # Errors
    /// `Internal` on a channel mismatch or when the pipeline is optimized,
    /// `Range` when either end would reach [`MAX_PIPELINE_CHANNELS`]. The
    /// pipeline is left unchanged.
    pub fn insert_stage(&mut self, ctx: &Context, loc: StageLoc, stage: Stage) -> Result<()> {
        self.check_mutable(ctx)?;

        let mismatch = match loc {
            StageLoc::Begin => self
                .stages
                .first()
                .filter(|next| next.input_channels != stage.output_channels)
                .map(|next| (stage.output_channels, next.input_channels)),
            StageLoc::End => self
                .stages
                .last()
                .filter(|prev| prev.output_channels != stage.input_channels)
                .map(|prev| (prev.output_channels, stage.input_channels)),
        };

        if let Some((out, inp)) = mismatch {
            return Err(ctx.signal(Error::internal(format!(
                "Cannot chain stage '{}': {} channels feed {} inputs",
                stage.signature, out, inp
            ))));
        }

        let (new_in, new_out) = match (loc, self.stages.is_empty()) {
            (_, true) => (stage.input_channels, stage.output_channels),
            (StageLoc::Begin, false) => (stage.input_channels, self.output_channels),
            (StageLoc::End, false) => (self.input_channels, stage.output_channels),
        };
        check_channel_limit(ctx, new_in, new_out)?;

        match loc {
            StageLoc::Begin => self.stages.insert(0, stage),
            StageLoc::End => self.stages.push(stage),
        }
        self.update_channels();

        Ok(())
    }

    /// Append clones of every stage of `other`
    ///
    /// Two empty pipelines leave `self` with `other`'s channel counts.
    ///
    /// # Errors
    /// `Internal` when the chains do not connect or `self` is optimized;
    /// `self` is left unchanged.
    pub fn cat(&mut self, ctx: &Context, other: &Pipeline) -> Result<()> {
        self.check_mutable(ctx)?;

        if self.stages.is_empty() && other.stages.is_empty() {
            self.input_channels = other.input_channels;
            self.output_channels = other.output_channels;
            return Ok(());
        }

        if let (Some(prev), Some(next)) = (self.stages.last(), other.stages.first()) {
            if prev.output_channels != next.input_channels {
                return Err(ctx.signal(Error::internal(format!(
                    "Cannot concatenate: {} channels feed {} inputs",
                    prev.output_channels, next.input_channels
                ))));
            }
        }

        self.stages.extend(other.stages.iter().cloned());
        self.update_channels();

        Ok(())
    }

    /// Install a fused evaluator
    ///
    /// # Errors
    /// `Internal` when one is already installed.
    pub fn set_optimization(
        &mut self,
        ctx: &Context,
        fused: Box<dyn FusedEvaluator>,
    ) -> Result<()> {
        if self.fused.is_some() {
            return Err(ctx.signal(Error::internal("Pipeline is already optimized")));
        }

        tracing::debug!(
            stages = self.stages.len(),
            inputs = self.input_channels,
            outputs = self.output_channels,
            "installed fused pipeline evaluator"
        );
        self.fused = Some(fused);

        Ok(())
    }

    /// Thread `storage[0]` through the stages, returning the buffer holding
    /// the result
    fn walk(&self, storage: &mut [[f32; MAX_STAGE_CHANNELS]; 2]) -> usize {
        let mut phase = 0;
        for stage in &self.stages {
            let [a, b] = &mut *storage;
            let (src, dst) = if phase == 0 { (a, b) } else { (b, a) };
            stage.eval(&src[..], &mut dst[..]);
            phase ^= 1;
        }
        phase
    }

    /// Evaluate 16-bit values
    ///
    /// # Panics
    /// If `input` is shorter than `input_channels` or `output` shorter than
    /// `output_channels`.
    pub fn eval_16(&self, input: &[u16], output: &mut [u16]) {
        if let Some(fused) = &self.fused {
            fused.eval_16(input, output);
            return;
        }

        let mut storage = [[0.0f32; MAX_STAGE_CHANNELS]; 2];
        for (dst, &v) in storage[0].iter_mut().zip(&input[..self.input_channels]) {
            *dst = v as f32 / 65535.0;
        }

        let phase = self.walk(&mut storage);

        for (dst, &v) in output[..self.output_channels].iter_mut().zip(&storage[phase]) {
            *dst = saturate_word(v as f64 * 65535.0);
        }
    }

    /// Evaluate float values
    ///
    /// # Panics
    /// If `input` is shorter than `input_channels` or `output` shorter than
    /// `output_channels`.
    pub fn eval_float(&self, input: &[f32], output: &mut [f32]) {
        if let Some(fused) = &self.fused {
            fused.eval_float(input, output);
            return;
        }

        let mut storage = [[0.0f32; MAX_STAGE_CHANNELS]; 2];
        storage[0][..self.input_channels].copy_from_slice(&input[..self.input_channels]);

        let phase = self.walk(&mut storage);

        output[..self.output_channels].copy_from_slice(&storage[phase][..self.output_channels]);
    }

    /// Find inputs producing `target` by Newton iteration
    ///
    /// Only pipelines with 3 or 4 inputs and 3 outputs are supported. The
    /// search starts from `hint` (3 values) or from 0.3 on every channel. A
    /// fourth input is held at `target[3]`. Iteration stops after 30 steps
    /// or as soon as the error stops decreasing, and the best input seen is
    /// returned.
    ///
    /// Returns `None` for unsupported shapes, a `target` shorter than the
    /// input count, a `hint` of fewer than 3 values, singular Jacobians, and
    /// evaluations that never produce a finite error.
    pub fn eval_reverse_float(&self, target: &[f32], hint: Option<&[f32]>) -> Option<Vec<f32>> {
        let n_in = self.input_channels;
        if (n_in != 3 && n_in != 4) || self.output_channels != 3 {
            return None;
        }
        if target.len() < n_in || hint.is_some_and(|h| h.len() < 3) {
            return None;
        }

        let mut x = [0.3f32; 4];
        if let Some(hint) = hint {
            x[..3].copy_from_slice(&hint[..3]);
        }
        x[3] = if n_in == 4 { target[3] } else { 0.0 };

        let mut result = None;
        let mut last_error = 1e20f64;
        let mut fx = [0.0f32; 3];
        let mut fxd = [0.0f32; 3];

        for _ in 0..INVERSION_MAX_ITERATIONS {
            self.eval_float(&x[..n_in], &mut fx);

            let error = euclidean_distance(&fx, &target[..3]);
            if !(error < last_error) {
                break;
            }
            last_error = error;
            result = Some(x[..n_in].to_vec());

            if error <= 0.0 {
                break;
            }

            let mut jacobian = Matrix3x3::default();
            for j in 0..3 {
                let mut xd = x;
                xd[j] = if xd[j] < 1.0 - JACOBIAN_EPSILON {
                    xd[j] + JACOBIAN_EPSILON
                } else {
                    xd[j] - JACOBIAN_EPSILON
                };
                let delta = (xd[j] - x[j]) as f64;

                self.eval_float(&xd[..n_in], &mut fxd);
                for row in 0..3 {
                    jacobian[row][j] = (fxd[row] - fx[row]) as f64 / delta;
                }
            }

            let residual = [
                (fx[0] - target[0]) as f64,
                (fx[1] - target[1]) as f64,
                (fx[2] - target[2]) as f64,
            ];
            let step = jacobian.solve(residual)?;

            for (v, s) in x.iter_mut().zip(step) {
                *v = (*v - s as f32).clamp(0.0, 1.0);
            }
        }

        result
    }

    /// The stages, if their signatures are exactly `signatures` in order
    pub fn check_and_retrieve_stages(&self, signatures: &[StageSignature]) -> Option<&[Stage]> {
        let matches = self.stages.len() == signatures.len()
            && self
                .stages
                .iter()
                .zip(signatures)
                .all(|(stage, &sig)| stage.signature == sig);

        matches.then_some(&self.stages[..])
    }

    /// Switch every 3-input CLUT stage to trilinear interpolation
    ///
    /// Needed when Lab indexes an output CLUT: tetrahedral interpolation
    /// along the Lab grid diagonals shows visible artifacts there.
    pub fn change_interpolation_to_trilinear(&mut self) {
        for stage in &mut self.stages {
            stage.set_trilinear();
        }
    }
}

fn check_channel_limit(ctx: &Context, input_channels: usize, output_channels: usize) -> Result<()> {
    if input_channels >= MAX_PIPELINE_CHANNELS || output_channels >= MAX_PIPELINE_CHANNELS {
        return Err(ctx.signal(Error::range(format!(
            "Pipeline channels {} -> {} exceed the limit of {}",
            input_channels,
            output_channels,
            MAX_PIPELINE_CHANNELS - 1
        ))));
    }
    Ok(())
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
