//! N-dimensional LUT interpolation
//!
//! This module provides:
//! - Nearest and linear interpolation (1D, one or many outputs)
//! - Bilinear interpolation (2D)
//! - Trilinear and tetrahedral interpolation (3D)
//! - Recursive interpolation for 4 to 15 inputs (tetrahedral core)
//!
//! Tables are laid out row-major: the first input is the most significant
//! dimension, the last input varies fastest, and every node holds
//! `n_outputs` consecutive values.
//!
//! [`InterpParams`] is immutable once built and does not own the table. The
//! owner (a tone curve or a CLUT stage) passes the table on every call, so
//! one parameter block can be shared read-only between threads.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::fixed::{
    fclamp, fixed_rest_to_int, fixed_to_int, linear_interp, round_fixed_to_int, to_fixed_domain,
};

/// Maximum number of input dimensions of an interpolation table
pub const MAX_INPUT_DIMENSIONS: usize = 15;

/// Maximum number of channels flowing between stages
pub const MAX_STAGE_CHANNELS: usize = 128;

/// Options selecting precision and algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterpFlags {
    /// Table holds `f32` samples instead of `u16`
    pub float: bool,
    /// Force trilinear instead of tetrahedral for 3-input tables
    pub trilinear: bool,
    /// Use nearest node instead of linear for 1-input tables
    pub nearest: bool,
}

impl InterpFlags {
    /// 16-bit table, default algorithms
    pub const fn u16() -> Self {
        Self {
            float: false,
            trilinear: false,
            nearest: false,
        }
    }

    /// Float table, default algorithms
    pub const fn float() -> Self {
        Self {
            float: true,
            trilinear: false,
            nearest: false,
        }
    }

    /// Force trilinear interpolation on 3-input tables
    pub const fn with_trilinear(mut self) -> Self {
        self.trilinear = true;
        self
    }

    /// Use nearest-node lookup on 1-input tables
    pub const fn with_nearest(mut self) -> Self {
        self.nearest = true;
        self
    }
}

/// Interpolation kernel chosen for a table shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// One input, one output, nearest node
    Nearest1D,
    /// One input, one output
    Linear1D,
    /// One input, several outputs
    Linear1DMulti,
    /// Two inputs
    Bilinear,
    /// Three inputs, eight corners
    Trilinear,
    /// Three inputs, four corners
    Tetrahedral,
    /// 4 to 15 inputs, one dimension peeled per level
    Recursive,
}

impl Interpolation {
    /// Pick the kernel for a table shape
    ///
    /// Returns `None` for shapes no kernel supports.
    pub fn select(n_inputs: usize, n_outputs: usize, flags: InterpFlags) -> Option<Self> {
        if n_inputs >= 4 && n_outputs >= MAX_STAGE_CHANNELS {
            return None;
        }

        match n_inputs {
            1 if n_outputs == 1 && flags.nearest => Some(Self::Nearest1D),
            1 if n_outputs == 1 => Some(Self::Linear1D),
            1 => Some(Self::Linear1DMulti),
            2 => Some(Self::Bilinear),
            3 if flags.trilinear => Some(Self::Trilinear),
            3 => Some(Self::Tetrahedral),
            4..=MAX_INPUT_DIMENSIONS => Some(Self::Recursive),
            _ => None,
        }
    }
}

/// Interpolation parameters for one table shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpParams {
    flags: InterpFlags,
    n_inputs: usize,
    n_outputs: usize,
    /// Grid points per input dimension
    n_samples: [u32; MAX_INPUT_DIMENSIONS],
    /// `n_samples - 1` per input dimension
    domain: [u32; MAX_INPUT_DIMENSIONS],
    /// Table strides; `opta[i]` belongs to input `n_inputs - 1 - i`
    opta: [usize; MAX_INPUT_DIMENSIONS],
    kind: Interpolation,
}

impl InterpParams {
    /// Build parameters for a table with `n_samples[i]` nodes along input `i`
    ///
    /// # Errors
    /// - `Range` when there are no inputs, more than 15, or a dimension has
    ///   no samples
    /// - `UnknownExtension` when no kernel handles the shape
    pub fn new(
        ctx: &Context,
        n_samples: &[u32],
        n_outputs: usize,
        flags: InterpFlags,
    ) -> Result<Self> {
        let n_inputs = n_samples.len();

        if n_inputs > MAX_INPUT_DIMENSIONS {
            return Err(ctx.signal(Error::range(format!(
                "Too many input channels ({} channels, max={})",
                n_inputs, MAX_INPUT_DIMENSIONS
            ))));
        }
        if n_samples.contains(&0) {
            return Err(ctx.signal(Error::range("Interpolation table with an empty dimension")));
        }

        let kind = Interpolation::select(n_inputs, n_outputs, flags).ok_or_else(|| {
            ctx.signal(Error::unknown_extension(format!(
                "Unsupported interpolation ({}->{} channels)",
                n_inputs, n_outputs
            )))
        })?;

        let mut params = Self {
            flags,
            n_inputs,
            n_outputs,
            n_samples: [0; MAX_INPUT_DIMENSIONS],
            domain: [0; MAX_INPUT_DIMENSIONS],
            opta: [0; MAX_INPUT_DIMENSIONS],
            kind,
        };

        for (i, &n) in n_samples.iter().enumerate() {
            params.n_samples[i] = n;
            params.domain[i] = n - 1;
        }

        params.opta[0] = n_outputs;
        for i in 1..n_inputs {
            params.opta[i] = params.opta[i - 1] * n_samples[n_inputs - i] as usize;
        }

        Ok(params)
    }

    /// Build parameters with the same number of nodes on every input
    pub fn new_uniform(
        ctx: &Context,
        n_samples: u32,
        n_inputs: usize,
        n_outputs: usize,
        flags: InterpFlags,
    ) -> Result<Self> {
        if n_inputs > MAX_INPUT_DIMENSIONS {
            return Err(ctx.signal(Error::range(format!(
                "Too many input channels ({} channels, max={})",
                n_inputs, MAX_INPUT_DIMENSIONS
            ))));
        }
        let samples = [n_samples; MAX_INPUT_DIMENSIONS];
        Self::new(ctx, &samples[..n_inputs], n_outputs, flags)
    }

    /// Same shape, with 3-input tables switched to trilinear
    pub fn to_trilinear(&self) -> Self {
        let mut params = self.clone();
        params.flags.trilinear = true;
        if let Some(kind) = Interpolation::select(self.n_inputs, self.n_outputs, params.flags) {
            params.kind = kind;
        }
        params
    }

    pub fn flags(&self) -> InterpFlags {
        self.flags
    }

    pub fn kind(&self) -> Interpolation {
        self.kind
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Grid points per input dimension
    pub fn n_samples(&self) -> &[u32] {
        &self.n_samples[..self.n_inputs]
    }

    /// Highest grid index per input dimension
    pub fn domain(&self) -> &[u32] {
        &self.domain[..self.n_inputs]
    }

    /// Number of table entries this shape addresses
    pub fn table_len(&self) -> usize {
        match self.n_inputs {
            0 => 0,
            n => self.opta[n - 1] * self.n_samples[0] as usize,
        }
    }

    /// Interpolate a 16-bit table
    ///
    /// `input` holds `n_inputs` values, `output` receives `n_outputs` values.
    pub fn eval_16(&self, table: &[u16], input: &[u16], output: &mut [u16]) {
        let domain = self.domain();
        match self.kind {
            Interpolation::Nearest1D => nearest_1d_16(table, domain[0], input[0], output),
            Interpolation::Linear1D => lin_lerp_1d_16(table, domain[0], input[0], output),
            Interpolation::Linear1DMulti => {
                eval_1_input_16(table, domain[0], self.opta[0], self.n_outputs, input, output)
            }
            Interpolation::Bilinear => {
                bilinear_16(table, domain, &self.opta, self.n_outputs, input, output)
            }
            Interpolation::Trilinear => {
                trilinear_16(table, domain, &self.opta, self.n_outputs, input, output)
            }
            Interpolation::Tetrahedral => {
                tetrahedral_16(table, domain, &self.opta, self.n_outputs, input, output)
            }
            Interpolation::Recursive => eval_n_inputs_16(
                table,
                domain,
                &self.opta,
                self.n_outputs,
                input,
                output,
            ),
        }
    }

    /// Interpolate a float table
    ///
    /// Inputs are clamped to `[0, 1]`; NaN is treated as 0.
    pub fn eval_float(&self, table: &[f32], input: &[f32], output: &mut [f32]) {
        let domain = self.domain();
        match self.kind {
            Interpolation::Nearest1D => nearest_1d_float(table, domain[0], input[0], output),
            Interpolation::Linear1D => lin_lerp_1d_float(table, domain[0], input[0], output),
            Interpolation::Linear1DMulti => {
                eval_1_input_float(table, domain[0], self.opta[0], self.n_outputs, input, output)
            }
            Interpolation::Bilinear => {
                bilinear_float(table, domain, &self.opta, self.n_outputs, input, output)
            }
            Interpolation::Trilinear => {
                trilinear_float(table, domain, &self.opta, self.n_outputs, input, output)
            }
            Interpolation::Tetrahedral => {
                tetrahedral_float(table, domain, &self.opta, self.n_outputs, input, output)
            }
            Interpolation::Recursive => eval_n_inputs_float(
                table,
                domain,
                &self.opta,
                self.n_outputs,
                input,
                output,
            ),
        }
    }
}

/// Locate a 16-bit coordinate on a grid axis
///
/// Returns the lower node, the 16-bit weight of the upper node and whether
/// an upper node exists (false only on the last grid line).
#[inline]
fn cell_16(v: u16, domain: u32) -> (usize, i64, bool) {
    let fx = to_fixed_domain(v as i64 * domain as i64);
    (fixed_to_int(fx) as usize, fixed_rest_to_int(fx), v != 0xffff)
}

/// Locate a float coordinate on a grid axis
///
/// The lower node never exceeds `domain`, so coordinates on the last grid
/// line stay in bounds.
#[inline]
fn cell_float(v: f32, domain: u32) -> (usize, f32, bool) {
    let v = fclamp(v);
    let px = v * domain as f32;
    let x0 = (px.floor() as u32).min(domain);
    (x0 as usize, px - x0 as f32, v < 1.0 && x0 < domain)
}

/// Axis order of the tetrahedron containing `(rx, ry, rz)`
///
/// The cube is split along its main diagonal into six tetrahedra; the one
/// holding the point is found by sorting the fractional parts.
#[inline]
fn tetrahedron<T: PartialOrd>(rx: T, ry: T, rz: T) -> [usize; 3] {
    if rx >= ry && ry >= rz {
        [0, 1, 2]
    } else if rx >= rz && rz >= ry {
        [0, 2, 1]
    } else if rz >= rx && rx >= ry {
        [2, 0, 1]
    } else if ry >= rx && rx >= rz {
        [1, 0, 2]
    } else if ry >= rz && rz >= rx {
        [1, 2, 0]
    } else {
        [2, 1, 0]
    }
}

#[inline]
fn lerp_16(a: i64, l: i64, h: i64) -> i64 {
    l + round_fixed_to_int((h - l) * a)
}

#[inline]
fn lerp_float(a: f32, l: f32, h: f32) -> f32 {
    l + (h - l) * a
}

fn nearest_1d_16(table: &[u16], domain: u32, v: u16, output: &mut [u16]) {
    let pos = (v as u64 * domain as u64 + 0x7fff) / 0xffff;
    output[0] = table[pos as usize];
}

fn nearest_1d_float(table: &[f32], domain: u32, v: f32, output: &mut [f32]) {
    let pos = (fclamp(v) * domain as f32).round() as usize;
    output[0] = table[pos.min(domain as usize)];
}

fn lin_lerp_1d_16(table: &[u16], domain: u32, v: u16, output: &mut [u16]) {
    if v == 0xffff || domain == 0 {
        output[0] = table[domain as usize];
        return;
    }

    let (cell0, rest, _) = cell_16(v, domain);
    output[0] = linear_interp(rest, table[cell0], table[cell0 + 1]);
}

fn lin_lerp_1d_float(table: &[f32], domain: u32, v: f32, output: &mut [f32]) {
    let v = fclamp(v);
    if v == 1.0 || domain == 0 {
        output[0] = table[domain as usize];
        return;
    }

    let (cell0, rest, has_next) = cell_float(v, domain);
    let cell1 = if has_next { cell0 + 1 } else { cell0 };
    let y0 = table[cell0];
    let y1 = table[cell1];
    output[0] = y0 + (y1 - y0) * rest;
}

fn eval_1_input_16(
    table: &[u16],
    domain: u32,
    stride: usize,
    n_outputs: usize,
    input: &[u16],
    output: &mut [u16],
) {
    if input[0] == 0xffff || domain == 0 {
        let start = domain as usize * stride;
        output[..n_outputs].copy_from_slice(&table[start..start + n_outputs]);
        return;
    }

    let (k0, rk, _) = cell_16(input[0], domain);
    let k0 = k0 * stride;
    let k1 = k0 + stride;
    for i in 0..n_outputs {
        output[i] = linear_interp(rk, table[k0 + i], table[k1 + i]);
    }
}

fn eval_1_input_float(
    table: &[f32],
    domain: u32,
    stride: usize,
    n_outputs: usize,
    input: &[f32],
    output: &mut [f32],
) {
    let v = fclamp(input[0]);
    if v == 1.0 || domain == 0 {
        let start = domain as usize * stride;
        output[..n_outputs].copy_from_slice(&table[start..start + n_outputs]);
        return;
    }

    let (cell0, rest, has_next) = cell_float(v, domain);
    let k0 = cell0 * stride;
    let k1 = if has_next { k0 + stride } else { k0 };
    for i in 0..n_outputs {
        output[i] = lerp_float(rest, table[k0 + i], table[k1 + i]);
    }
}

fn bilinear_16(
    table: &[u16],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[u16],
    output: &mut [u16],
) {
    let (x0, rx, x_next) = cell_16(input[0], domain[0]);
    let (y0, ry, y_next) = cell_16(input[1], domain[1]);

    let x0 = opta[1] * x0;
    let x1 = x0 + if x_next { opta[1] } else { 0 };
    let y0 = opta[0] * y0;
    let y1 = y0 + if y_next { opta[0] } else { 0 };

    for i in 0..n_outputs {
        let d = |x: usize, y: usize| table[x + y + i] as i64;

        let dx0 = lerp_16(rx, d(x0, y0), d(x1, y0));
        let dx1 = lerp_16(rx, d(x0, y1), d(x1, y1));
        output[i] = lerp_16(ry, dx0, dx1).clamp(0, 0xffff) as u16;
    }
}

fn bilinear_float(
    table: &[f32],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[f32],
    output: &mut [f32],
) {
    let (x0, rx, x_next) = cell_float(input[0], domain[0]);
    let (y0, ry, y_next) = cell_float(input[1], domain[1]);

    let x0 = opta[1] * x0;
    let x1 = x0 + if x_next { opta[1] } else { 0 };
    let y0 = opta[0] * y0;
    let y1 = y0 + if y_next { opta[0] } else { 0 };

    for i in 0..n_outputs {
        let d = |x: usize, y: usize| table[x + y + i];

        let dx0 = lerp_float(rx, d(x0, y0), d(x1, y0));
        let dx1 = lerp_float(rx, d(x0, y1), d(x1, y1));
        output[i] = lerp_float(ry, dx0, dx1);
    }
}

fn trilinear_16(
    table: &[u16],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[u16],
    output: &mut [u16],
) {
    let (x0, rx, x_next) = cell_16(input[0], domain[0]);
    let (y0, ry, y_next) = cell_16(input[1], domain[1]);
    let (z0, rz, z_next) = cell_16(input[2], domain[2]);

    let x0 = opta[2] * x0;
    let x1 = x0 + if x_next { opta[2] } else { 0 };
    let y0 = opta[1] * y0;
    let y1 = y0 + if y_next { opta[1] } else { 0 };
    let z0 = opta[0] * z0;
    let z1 = z0 + if z_next { opta[0] } else { 0 };

    for i in 0..n_outputs {
        let d = |x: usize, y: usize, z: usize| table[x + y + z + i] as i64;

        let dx00 = lerp_16(rx, d(x0, y0, z0), d(x1, y0, z0));
        let dx01 = lerp_16(rx, d(x0, y0, z1), d(x1, y0, z1));
        let dx10 = lerp_16(rx, d(x0, y1, z0), d(x1, y1, z0));
        let dx11 = lerp_16(rx, d(x0, y1, z1), d(x1, y1, z1));

        let dxy0 = lerp_16(ry, dx00, dx10);
        let dxy1 = lerp_16(ry, dx01, dx11);

        output[i] = lerp_16(rz, dxy0, dxy1).clamp(0, 0xffff) as u16;
    }
}

fn trilinear_float(
    table: &[f32],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[f32],
    output: &mut [f32],
) {
    let (x0, rx, x_next) = cell_float(input[0], domain[0]);
    let (y0, ry, y_next) = cell_float(input[1], domain[1]);
    let (z0, rz, z_next) = cell_float(input[2], domain[2]);

    let x0 = opta[2] * x0;
    let x1 = x0 + if x_next { opta[2] } else { 0 };
    let y0 = opta[1] * y0;
    let y1 = y0 + if y_next { opta[1] } else { 0 };
    let z0 = opta[0] * z0;
    let z1 = z0 + if z_next { opta[0] } else { 0 };

    for i in 0..n_outputs {
        let d = |x: usize, y: usize, z: usize| table[x + y + z + i];

        let dx00 = lerp_float(rx, d(x0, y0, z0), d(x1, y0, z0));
        let dx01 = lerp_float(rx, d(x0, y0, z1), d(x1, y0, z1));
        let dx10 = lerp_float(rx, d(x0, y1, z0), d(x1, y1, z0));
        let dx11 = lerp_float(rx, d(x0, y1, z1), d(x1, y1, z1));

        let dxy0 = lerp_float(ry, dx00, dx10);
        let dxy1 = lerp_float(ry, dx01, dx11);

        output[i] = lerp_float(rz, dxy0, dxy1);
    }
}

fn tetrahedral_16(
    table: &[u16],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[u16],
    output: &mut [u16],
) {
    let (x0, rx, x_next) = cell_16(input[0], domain[0]);
    let (y0, ry, y_next) = cell_16(input[1], domain[1]);
    let (z0, rz, z_next) = cell_16(input[2], domain[2]);

    let base = opta[2] * x0 + opta[1] * y0 + opta[0] * z0;
    let step = [
        if x_next { opta[2] } else { 0 },
        if y_next { opta[1] } else { 0 },
        if z_next { opta[0] } else { 0 },
    ];
    let rest = [rx, ry, rz];
    let [a0, a1, a2] = tetrahedron(rx, ry, rz);

    let v1 = base + step[a0];
    let v2 = v1 + step[a1];
    let v3 = v2 + step[a2];

    for i in 0..n_outputs {
        let c0 = table[base + i] as i64;
        let c1 = table[v1 + i] as i64 - c0;
        let c2 = table[v2 + i] as i64 - table[v1 + i] as i64;
        let c3 = table[v3 + i] as i64 - table[v2 + i] as i64;

        let sum = c1 * rest[a0] + c2 * rest[a1] + c3 * rest[a2];
        let value = c0 + round_fixed_to_int(to_fixed_domain(sum));
        output[i] = value.clamp(0, 0xffff) as u16;
    }
}

fn tetrahedral_float(
    table: &[f32],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[f32],
    output: &mut [f32],
) {
    let (x0, rx, x_next) = cell_float(input[0], domain[0]);
    let (y0, ry, y_next) = cell_float(input[1], domain[1]);
    let (z0, rz, z_next) = cell_float(input[2], domain[2]);

    let base = opta[2] * x0 + opta[1] * y0 + opta[0] * z0;
    let step = [
        if x_next { opta[2] } else { 0 },
        if y_next { opta[1] } else { 0 },
        if z_next { opta[0] } else { 0 },
    ];
    let rest = [rx, ry, rz];
    let [a0, a1, a2] = tetrahedron(rx, ry, rz);

    let v1 = base + step[a0];
    let v2 = v1 + step[a1];
    let v3 = v2 + step[a2];

    for i in 0..n_outputs {
        let c0 = table[base + i];
        let c1 = table[v1 + i] - c0;
        let c2 = table[v2 + i] - table[v1 + i];
        let c3 = table[v3 + i] - table[v2 + i];

        output[i] = c0 + c1 * rest[a0] + c2 * rest[a1] + c3 * rest[a2];
    }
}

/// Interpolate 4 or more inputs by peeling off the first dimension
///
/// Both neighbouring hyper-planes are evaluated with one input less and the
/// results blended linearly. Three remaining inputs use the tetrahedral
/// kernel.
fn eval_n_inputs_16(
    table: &[u16],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[u16],
    output: &mut [u16],
) {
    let n = domain.len();
    if n == 3 {
        tetrahedral_16(table, domain, opta, n_outputs, input, output);
        return;
    }

    let (k0, rk, k_next) = cell_16(input[0], domain[0]);
    let stride = opta[n - 1];
    let lo = stride * k0;
    let hi = lo + if k_next { stride } else { 0 };

    let mut tmp1 = [0u16; MAX_STAGE_CHANNELS];
    let mut tmp2 = [0u16; MAX_STAGE_CHANNELS];

    eval_n_inputs_16(&table[lo..], &domain[1..], opta, n_outputs, &input[1..], &mut tmp1);
    eval_n_inputs_16(&table[hi..], &domain[1..], opta, n_outputs, &input[1..], &mut tmp2);

    for i in 0..n_outputs {
        output[i] = linear_interp(rk, tmp1[i], tmp2[i]);
    }
}

fn eval_n_inputs_float(
    table: &[f32],
    domain: &[u32],
    opta: &[usize],
    n_outputs: usize,
    input: &[f32],
    output: &mut [f32],
) {
    let n = domain.len();
    if n == 3 {
        tetrahedral_float(table, domain, opta, n_outputs, input, output);
        return;
    }

    let (k0, rest, k_next) = cell_float(input[0], domain[0]);
    let stride = opta[n - 1];
    let lo = stride * k0;
    let hi = lo + if k_next { stride } else { 0 };

    let mut tmp1 = [0f32; MAX_STAGE_CHANNELS];
    let mut tmp2 = [0f32; MAX_STAGE_CHANNELS];

    eval_n_inputs_float(&table[lo..], &domain[1..], opta, n_outputs, &input[1..], &mut tmp1);
    eval_n_inputs_float(&table[hi..], &domain[1..], opta, n_outputs, &input[1..], &mut tmp2);

    for i in 0..n_outputs {
        output[i] = lerp_float(rest, tmp1[i], tmp2[i]);
    }
}
