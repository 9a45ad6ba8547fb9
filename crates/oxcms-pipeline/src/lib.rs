//! # oxcms-pipeline - Color transform pipelines
//!
//! The evaluation core of a color management system: tone curves,
//! interpolated lookup tables, transform stages and the pipelines that
//! chain them.
//!
//! ## Overview
//!
//! - [`ToneCurve`]: tabulated, segmented and parametric transfer functions,
//!   with inversion, joining, smoothing and introspection
//! - [`Stage`]: identity, matrix, curve set, CLUT, named color, Lab/XYZ and
//!   custom stages
//! - [`Pipeline`]: an ordered stage chain with 16-bit and float evaluation
//! - [`Context`]: where construction errors go and which parametric curve
//!   families are known
//!
//! Construction returns [`Result`] and reports every failure through the
//! context's [`ErrorSink`] first. Evaluation never fails.
//!
//! ## Quick Start
//!
//! ```
//! use oxcms_pipeline::{Context, Pipeline, Stage, StageLoc, ToneCurve};
//!
//! let ctx = Context::new();
//!
//! let gamma = ToneCurve::build_gamma(&ctx, 2.2).unwrap();
//! let curves = Stage::tone_curves(&ctx, vec![gamma; 3]).unwrap();
//! let to_xyz = Stage::matrix(
//!     &ctx,
//!     3,
//!     3,
//!     &[0.4361, 0.3851, 0.1431, 0.2225, 0.7169, 0.0606, 0.0139, 0.0971, 0.7141],
//!     None,
//! )
//! .unwrap();
//!
//! let mut pipeline = Pipeline::new(&ctx, 3, 3).unwrap();
//! pipeline.insert_stage(&ctx, StageLoc::End, curves).unwrap();
//! pipeline.insert_stage(&ctx, StageLoc::End, to_xyz).unwrap();
//!
//! let mut xyz = [0u16; 3];
//! pipeline.eval_16(&[65535, 32768, 0], &mut xyz);
//! ```

pub mod batch;
pub mod color;
pub mod context;
pub mod curves;
pub mod error;
pub mod math;
pub mod pipeline;

pub use context::{CollectingSink, Context, ErrorSink, TracingSink};
pub use curves::{
    BuiltinCurve, CurveKind, CurveSegment, Direction, ParametricCurve, ParametricCurveEvaluator,
    ParametricRegistry, SegmentShape, ToneCurve,
};
pub use error::{Error, ErrorCode, Result};
pub use math::{InterpFlags, InterpParams, Interpolation};
pub use pipeline::{
    FusedEvaluator, NamedColorList, Pipeline, SamplerFlags, Stage, StageEvaluator, StageKind,
    StageLoc, StageSignature,
};

/// Version of oxcms-pipeline
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
