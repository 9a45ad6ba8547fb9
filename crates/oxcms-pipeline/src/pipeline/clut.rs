//! Color lookup table stages
//!
//! A CLUT holds `n_outputs` values per node of a regular grid over the
//! inputs, either as 16-bit words or as floats. Tables are filled from a
//! slice, from raw native-endian bytes, or node by node through a sampler
//! callback.
//!
//! Node order is row-major: the last input varies fastest.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::fixed::{quantize_val, saturate_word};
use crate::math::{InterpFlags, InterpParams, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS};
use crate::pipeline::stages::{Stage, StageKind, StageSignature};

/// Grid node values
#[derive(Debug, Clone, PartialEq)]
pub enum ClutTable {
    U16(Vec<u16>),
    Float(Vec<f32>),
}

/// CLUT stage payload
#[derive(Debug, Clone)]
pub struct Clut {
    params: InterpParams,
    table: ClutTable,
}

impl Clut {
    pub fn params(&self) -> &InterpParams {
        &self.params
    }

    pub fn table(&self) -> &ClutTable {
        &self.table
    }

    /// Number of table entries, nodes times outputs
    pub fn len(&self) -> usize {
        match &self.table {
            ClutTable::U16(t) => t.len(),
            ClutTable::Float(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 16-bit tables quantize the input, interpolate in fixed point and
    /// scale back; float tables interpolate directly.
    pub(crate) fn eval(&self, input: &[f32], output: &mut [f32]) {
        match &self.table {
            ClutTable::U16(table) => {
                let mut in16 = [0u16; MAX_INPUT_DIMENSIONS];
                let mut out16 = [0u16; MAX_STAGE_CHANNELS];
                for (dst, &v) in in16.iter_mut().zip(input) {
                    *dst = saturate_word(v as f64 * 65535.0);
                }

                let n_in = self.params.n_inputs();
                let n_out = self.params.n_outputs();
                self.params.eval_16(table, &in16[..n_in], &mut out16[..n_out]);

                for (dst, &v) in output.iter_mut().zip(&out16[..n_out]) {
                    *dst = v as f32 / 65535.0;
                }
            }
            ClutTable::Float(table) => self.params.eval_float(table, input, output),
        }
    }
}

/// Sampler options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerFlags {
    /// Only visit the nodes, never write back
    pub inspect: bool,
}

impl SamplerFlags {
    /// Visit and write back
    pub const NONE: Self = Self { inspect: false };
    /// Visit without writing back
    pub const INSPECT: Self = Self { inspect: true };
}

/// Number of grid nodes, or `None` for degenerate or overflowing grids
fn cube_size(grid_points: &[u32]) -> Option<usize> {
    grid_points.iter().try_fold(1usize, |acc, &dim| {
        if dim <= 1 {
            return None;
        }
        acc.checked_mul(dim as usize)
    })
}

/// Validate a CLUT shape and return its table length
fn clut_entries(
    ctx: &Context,
    grid_points: &[u32],
    input_channels: usize,
    output_channels: usize,
) -> Result<usize> {
    if input_channels > MAX_INPUT_DIMENSIONS {
        return Err(ctx.signal(Error::range(format!(
            "Too many input channels ({} found, max is {})",
            input_channels, MAX_INPUT_DIMENSIONS
        ))));
    }
    if grid_points.len() < input_channels {
        return Err(ctx.signal(Error::range(format!(
            "{} grid dimensions given for {} inputs",
            grid_points.len(),
            input_channels
        ))));
    }

    cube_size(&grid_points[..input_channels])
        .and_then(|n| n.checked_mul(output_channels))
        .ok_or_else(|| ctx.signal(Error::range("Invalid CLUT grid dimensions")))
}

/// Visit every node of a grid
///
/// `visit` receives the node index and the quantized 16-bit coordinate of
/// each input; returning `false` stops the walk with a `Range` error.
fn walk_grid<F>(ctx: &Context, grid_points: &[u32], mut visit: F) -> Result<()>
where
    F: FnMut(usize, &[u16]) -> bool,
{
    let n_inputs = grid_points.len();
    if n_inputs == 0 || n_inputs > MAX_INPUT_DIMENSIONS {
        return Err(ctx.signal(Error::range(format!(
            "Cannot walk a grid with {} inputs",
            n_inputs
        ))));
    }
    let total = cube_size(grid_points)
        .ok_or_else(|| ctx.signal(Error::range("Invalid grid dimensions")))?;

    let mut coords = [0u16; MAX_INPUT_DIMENSIONS];
    for node in 0..total {
        let mut rest = node;
        for t in (0..n_inputs).rev() {
            let n = grid_points[t] as usize;
            coords[t] = quantize_val((rest % n) as f64, grid_points[t]);
            rest /= n;
        }

        if !visit(node, &coords[..n_inputs]) {
            return Err(ctx.signal(Error::range(format!(
                "Sampler stopped at node {} of {}",
                node, total
            ))));
        }
    }

    Ok(())
}

/// Walk a grid without a CLUT, with 16-bit coordinates
///
/// # Errors
/// `Range` for bad dimensions or when `sampler` returns `false`.
pub fn slice_space_16<F>(ctx: &Context, grid_points: &[u32], mut sampler: F) -> Result<()>
where
    F: FnMut(&[u16]) -> bool,
{
    walk_grid(ctx, grid_points, |_, coords| sampler(coords))
}

/// Walk a grid without a CLUT, with coordinates in `[0, 1]`
///
/// # Errors
/// `Range` for bad dimensions or when `sampler` returns `false`.
pub fn slice_space_float<F>(ctx: &Context, grid_points: &[u32], mut sampler: F) -> Result<()>
where
    F: FnMut(&[f32]) -> bool,
{
    let mut input = [0.0f32; MAX_INPUT_DIMENSIONS];
    walk_grid(ctx, grid_points, |_, coords| {
        for (dst, &c) in input.iter_mut().zip(coords) {
            *dst = (c as f64 / 65535.0) as f32;
        }
        sampler(&input[..coords.len()])
    })
}

impl Stage {
    fn clut_stage(
        ctx: &Context,
        grid_points: &[u32],
        input_channels: usize,
        output_channels: usize,
        table: ClutTable,
        flags: InterpFlags,
    ) -> Result<Self> {
        let params =
            InterpParams::new(ctx, &grid_points[..input_channels], output_channels, flags)?;
        let clut = Clut { params, table };

        tracing::trace!(
            inputs = input_channels,
            outputs = output_channels,
            entries = clut.len(),
            "allocated CLUT stage"
        );

        Self::allocate(
            ctx,
            StageSignature::CLUT,
            input_channels,
            output_channels,
            StageKind::Clut(clut),
        )
    }

    /// 16-bit CLUT with `grid_points[i]` nodes along input `i`
    ///
    /// Without a table the grid starts zeroed, ready for
    /// [`sample_clut_16`](Self::sample_clut_16).
    ///
    /// # Errors
    /// `Range` for more than 15 inputs, any dimension below 2 nodes, an
    /// overflowing grid, or a table whose length is not `outputs · nodes`.
    pub fn clut_16_granular(
        ctx: &Context,
        grid_points: &[u32],
        input_channels: usize,
        output_channels: usize,
        table: Option<&[u16]>,
    ) -> Result<Self> {
        let n = clut_entries(ctx, grid_points, input_channels, output_channels)?;
        let table = match table {
            Some(t) if t.len() != n => {
                return Err(ctx.signal(Error::range(format!(
                    "CLUT table holds {} entries, expected {}",
                    t.len(),
                    n
                ))));
            }
            Some(t) => t.to_vec(),
            None => vec![0; n],
        };

        Self::clut_stage(
            ctx,
            grid_points,
            input_channels,
            output_channels,
            ClutTable::U16(table),
            InterpFlags::u16(),
        )
    }

    /// 16-bit CLUT with `n_grid` nodes along every input
    pub fn clut_16(
        ctx: &Context,
        n_grid: u32,
        input_channels: usize,
        output_channels: usize,
        table: Option<&[u16]>,
    ) -> Result<Self> {
        if input_channels > MAX_INPUT_DIMENSIONS {
            return Err(ctx.signal(Error::range(format!(
                "Too many input channels ({} found, max is {})",
                input_channels, MAX_INPUT_DIMENSIONS
            ))));
        }
        let grid = [n_grid; MAX_INPUT_DIMENSIONS];
        Self::clut_16_granular(
            ctx,
            &grid[..input_channels],
            input_channels,
            output_channels,
            table,
        )
    }

    /// 16-bit CLUT from a native-endian byte table
    ///
    /// # Errors
    /// As [`clut_16_granular`](Self::clut_16_granular), plus `Range` when
    /// the byte count is odd.
    pub fn clut_16_from_bytes(
        ctx: &Context,
        grid_points: &[u32],
        input_channels: usize,
        output_channels: usize,
        bytes: &[u8],
    ) -> Result<Self> {
        if bytes.len() % 2 != 0 {
            return Err(ctx.signal(Error::range(format!(
                "CLUT byte table has odd length {}",
                bytes.len()
            ))));
        }

        let mut table = vec![0u16; bytes.len() / 2];
        bytemuck::cast_slice_mut::<u16, u8>(&mut table).copy_from_slice(bytes);

        Self::clut_16_granular(
            ctx,
            grid_points,
            input_channels,
            output_channels,
            Some(&table[..]),
        )
    }

    /// Float CLUT with `grid_points[i]` nodes along input `i`
    ///
    /// # Errors
    /// As [`clut_16_granular`](Self::clut_16_granular).
    pub fn clut_float_granular(
        ctx: &Context,
        grid_points: &[u32],
        input_channels: usize,
        output_channels: usize,
        table: Option<&[f32]>,
    ) -> Result<Self> {
        let n = clut_entries(ctx, grid_points, input_channels, output_channels)?;
        let table = match table {
            Some(t) if t.len() != n => {
                return Err(ctx.signal(Error::range(format!(
                    "CLUT table holds {} entries, expected {}",
                    t.len(),
                    n
                ))));
            }
            Some(t) => t.to_vec(),
            None => vec![0.0; n],
        };

        Self::clut_stage(
            ctx,
            grid_points,
            input_channels,
            output_channels,
            ClutTable::Float(table),
            InterpFlags::float(),
        )
    }

    /// Float CLUT with `n_grid` nodes along every input
    pub fn clut_float(
        ctx: &Context,
        n_grid: u32,
        input_channels: usize,
        output_channels: usize,
        table: Option<&[f32]>,
    ) -> Result<Self> {
        if input_channels > MAX_INPUT_DIMENSIONS {
            return Err(ctx.signal(Error::range(format!(
                "Too many input channels ({} found, max is {})",
                input_channels, MAX_INPUT_DIMENSIONS
            ))));
        }
        let grid = [n_grid; MAX_INPUT_DIMENSIONS];
        Self::clut_float_granular(
            ctx,
            &grid[..input_channels],
            input_channels,
            output_channels,
            table,
        )
    }

    /// `n` channel identity as a 2-node 16-bit CLUT
    pub fn identity_clut(ctx: &Context, n: usize) -> Result<Self> {
        if n > MAX_INPUT_DIMENSIONS {
            return Err(ctx.signal(Error::range(format!(
                "Identity CLUT: too many channels ({})",
                n
            ))));
        }
        let grid = [2u32; MAX_INPUT_DIMENSIONS];
        let mut stage = Self::clut_16_granular(ctx, &grid[..n], n, n, None)?;
        stage.sample_clut_16(
            ctx,
            |input, output| {
                output.copy_from_slice(input);
                true
            },
            SamplerFlags::NONE,
        )?;
        stage.implements = StageSignature::IDENTITY;
        Ok(stage)
    }

    /// The CLUT payload, if this is a CLUT stage
    pub fn clut(&self) -> Option<&Clut> {
        match &self.kind {
            StageKind::Clut(clut) => Some(clut),
            _ => None,
        }
    }

    /// Switch a 3-input CLUT to trilinear interpolation
    ///
    /// Other stages and other CLUT shapes are left as they are.
    pub fn set_trilinear(&mut self) {
        if let StageKind::Clut(clut) = &mut self.kind {
            clut.params = clut.params.to_trilinear();
        }
    }

    /// Fill a 16-bit CLUT node by node
    ///
    /// `sampler` receives the quantized node coordinates and the current
    /// node values, and may overwrite the latter. The values are stored back
    /// unless `flags.inspect` is set.
    ///
    /// # Errors
    /// - `Internal` when the stage is not a 16-bit CLUT
    /// - `Range` when `sampler` returns `false`; nodes not yet visited keep
    ///   their values
    pub fn sample_clut_16<F>(
        &mut self,
        ctx: &Context,
        mut sampler: F,
        flags: SamplerFlags,
    ) -> Result<()>
    where
        F: FnMut(&[u16], &mut [u16]) -> bool,
    {
        let (grid, n_out, table) = match &mut self.kind {
            StageKind::Clut(Clut {
                params,
                table: ClutTable::U16(table),
            }) => (params.n_samples().to_vec(), params.n_outputs(), table),
            _ => {
                return Err(ctx.signal(Error::internal(format!(
                    "Stage '{}' is not a 16-bit CLUT",
                    self.signature
                ))));
            }
        };

        let mut out = [0u16; MAX_STAGE_CHANNELS];
        walk_grid(ctx, &grid, |node, coords| {
            let values = &mut table[node * n_out..(node + 1) * n_out];
            out[..n_out].copy_from_slice(values);
            if !sampler(coords, &mut out[..n_out]) {
                return false;
            }
            if !flags.inspect {
                values.copy_from_slice(&out[..n_out]);
            }
            true
        })
    }

    /// Fill a float CLUT node by node
    ///
    /// Like [`sample_clut_16`](Self::sample_clut_16) with coordinates in
    /// `[0, 1]`.
    pub fn sample_clut_float<F>(
        &mut self,
        ctx: &Context,
        mut sampler: F,
        flags: SamplerFlags,
    ) -> Result<()>
    where
        F: FnMut(&[f32], &mut [f32]) -> bool,
    {
        let (grid, n_out, table) = match &mut self.kind {
            StageKind::Clut(Clut {
                params,
                table: ClutTable::Float(table),
            }) => (params.n_samples().to_vec(), params.n_outputs(), table),
            _ => {
                return Err(ctx.signal(Error::internal(format!(
                    "Stage '{}' is not a float CLUT",
                    self.signature
                ))));
            }
        };

        let mut input = [0.0f32; MAX_INPUT_DIMENSIONS];
        let mut out = [0.0f32; MAX_STAGE_CHANNELS];
        walk_grid(ctx, &grid, |node, coords| {
            for (dst, &c) in input.iter_mut().zip(coords) {
                *dst = (c as f64 / 65535.0) as f32;
            }
            let values = &mut table[node * n_out..(node + 1) * n_out];
            out[..n_out].copy_from_slice(values);
            if !sampler(&input[..coords.len()], &mut out[..n_out]) {
                return false;
            }
            if !flags.inspect {
                values.copy_from_slice(&out[..n_out]);
            }
            true
        })
    }
}
