//! # cms-tests
//!
//! Cross-checks for oxcms-pipeline.
//!
//! This crate provides:
//! - Tone curve parity tests against lcms2
//! - Deterministic sample generation
//! - Difference statistics for curve and buffer comparisons
//! - Concurrency and property tests over whole pipelines (see `tests/`)
//!
//! Set `RUST_LOG=oxcms_pipeline=debug` to see construction traces while
//! tests run.

pub mod parity;
pub mod patterns;

pub use parity::{
    Diff, compare_buffers_16, compare_buffers_float, compare_curve_16, compare_curve_float,
};
pub use patterns::{SamplePattern, unit_samples, word_samples};

/// Install a test-friendly tracing subscriber, once per process
///
/// Honors `RUST_LOG`. Later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
