//! Tone curves and parametric curve families
//!
//! This module provides:
//! - [`ToneCurve`]: tabulated, segmented and parametric transfer functions
//! - Analytic and numeric inversion, joining and smoothing
//! - The parametric catalog and the [`ParametricRegistry`] used to resolve it

pub mod parametric;
mod reverse;
mod smooth;
pub mod tone_curve;

pub use parametric::{
    BuiltinCurve, BuiltinCurves, CurveKind, Direction, MAX_PARAMS, MINUS_INF, PLUS_INF,
    ParametricCurve, ParametricCurveEvaluator, ParametricRegistry,
};
pub use reverse::DEFAULT_REVERSE_SAMPLES;
pub use tone_curve::{CurveSegment, MAX_TABLE_ENTRIES, SegmentShape, ToneCurve};
