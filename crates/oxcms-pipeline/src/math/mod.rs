//! Mathematical operations for color management
//!
//! This module provides foundational math operations used throughout the crate:
//! - 16-bit fixed point helpers for table lookups
//! - N-dimensional interpolation kernels for curves and CLUTs
//! - 3x3 matrix operations for Newton inversion

pub mod fixed;
pub mod interpolation;
pub mod matrix;

pub use fixed::{quantize_val, saturate_word};
pub use interpolation::{
    InterpFlags, InterpParams, Interpolation, MAX_INPUT_DIMENSIONS, MAX_STAGE_CHANNELS,
};
pub use matrix::Matrix3x3;
