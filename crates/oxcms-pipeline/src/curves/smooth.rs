//! Tone curve smoothing
//!
//! Whittaker-Henderson smoother with a second-difference penalty: finds `z`
//! minimizing `Σ w (y - z)² + λ Σ (Δ²z)²`. The normal equations are
//! pentadiagonal and solved by banded elimination in f32.

use crate::context::Context;
use crate::curves::tone_curve::{MAX_NODES_IN_CURVE, ToneCurve};
use crate::error::{Error, Result};
use crate::math::fixed::saturate_word;

/// Solve the smoothing system
///
/// Arrays are 1-based: index 0 is unused and `w`, `y`, `z` hold `m + 1`
/// values.
fn whittaker_henderson(w: &[f32], y: &[f32], z: &mut [f32], lambda: f32, m: usize) {
    let mut c = vec![0.0f32; m + 1];
    let mut d = vec![0.0f32; m + 1];
    let mut e = vec![0.0f32; m + 1];

    d[1] = w[1] + lambda;
    c[1] = -2.0 * lambda / d[1];
    e[1] = lambda / d[1];
    z[1] = w[1] * y[1];
    d[2] = w[2] + 5.0 * lambda - d[1] * c[1] * c[1];
    c[2] = (-4.0 * lambda - d[1] * c[1] * e[1]) / d[2];
    e[2] = lambda / d[2];
    z[2] = w[2] * y[2] - c[1] * z[1];

    for i in 3..m - 1 {
        let (i1, i2) = (i - 1, i - 2);
        d[i] = w[i] + 6.0 * lambda - c[i1] * c[i1] * d[i1] - e[i2] * e[i2] * d[i2];
        c[i] = (-4.0 * lambda - d[i1] * c[i1] * e[i1]) / d[i];
        e[i] = lambda / d[i];
        z[i] = w[i] * y[i] - c[i1] * z[i1] - e[i2] * z[i2];
    }

    let (i1, i2) = (m - 2, m - 3);
    d[m - 1] = w[m - 1] + 5.0 * lambda - c[i1] * c[i1] * d[i1] - e[i2] * e[i2] * d[i2];
    c[m - 1] = (-2.0 * lambda - d[i1] * c[i1] * e[i1]) / d[m - 1];
    z[m - 1] = w[m - 1] * y[m - 1] - c[i1] * z[i1] - e[i2] * z[i2];

    let (i1, i2) = (m - 1, m - 2);
    d[m] = w[m] + lambda - c[i1] * c[i1] * d[i1] - e[i2] * e[i2] * d[i2];
    z[m] = (w[m] * y[m] - c[i1] * z[i1] - e[i2] * z[i2]) / d[m];
    z[m - 1] = z[m - 1] / d[m - 1] - c[m - 1] * z[m];

    for i in (1..=m - 2).rev() {
        z[i] = z[i] / d[i] - c[i] * z[i + 1] - e[i] * z[i + 2];
    }
}

impl ToneCurve {
    /// Smooth the 16-bit table in place
    ///
    /// Linear curves are left alone. The result is rejected when it is not
    /// ascending, or when more than a third of it sits at 0 or at 65535.
    /// A negative `lambda` forces the result: `|lambda|` is used and the
    /// rejection checks only log.
    ///
    /// Segments, if any, are not touched: segmented float evaluation keeps
    /// following the original formulas.
    ///
    /// # Errors
    /// `Range` for tables with fewer than 4 or more than 4096 entries, and
    /// for rejected results. The table is unchanged on error.
    pub fn smooth(&mut self, ctx: &Context, lambda: f64) -> Result<()> {
        if self.is_linear() {
            return Ok(());
        }

        let n = self.table16.len();
        if n >= MAX_NODES_IN_CURVE {
            return Err(ctx.signal(Error::range(format!(
                "Smoothing: too many points ({})",
                n
            ))));
        }
        if n < 4 {
            return Err(ctx.signal(Error::range(format!("Smoothing: too few points ({})", n))));
        }

        let (lambda, forced) = if lambda < 0.0 {
            (-lambda, true)
        } else {
            (lambda, false)
        };

        let mut w = vec![0.0f32; n + 1];
        let mut y = vec![0.0f32; n + 1];
        let mut z = vec![0.0f32; n + 1];
        for (i, &v) in self.table16.iter().enumerate() {
            y[i + 1] = v as f32;
            w[i + 1] = 1.0;
        }

        whittaker_henderson(&w, &y, &mut z, lambda as f32, n);

        let mut zeros = 0;
        let mut poles = 0;
        let mut rejection = None;
        for i in (2..=n).rev() {
            if z[i] == 0.0 {
                zeros += 1;
            }
            if z[i] >= 65535.0 {
                poles += 1;
            }
            if z[i] < z[i - 1] {
                rejection = Some("non-monotonic");
                break;
            }
        }
        if rejection.is_none() && zeros > n / 3 {
            rejection = Some("degenerated, mostly zeros");
        }
        if rejection.is_none() && poles > n / 3 {
            rejection = Some("degenerated, mostly poles");
        }

        if let Some(reason) = rejection {
            if !forced {
                return Err(ctx.signal(Error::range(format!("Smoothing: {}", reason))));
            }
            tracing::debug!(reason, "forced smoothing keeps a rejected result");
        }

        for (dst, &v) in self.table16.iter_mut().zip(&z[1..]) {
            *dst = saturate_word(v as f64);
        }

        Ok(())
    }
}
