//! Profile Connection Space coordinates
//!
//! This module provides:
//! - CIE XYZ color space
//! - CIELAB (L*a*b*) color space
//! - The D50 PCS white point

pub mod lab;
pub mod xyz;

pub use lab::Lab;
pub use xyz::{MAX_ENCODEABLE_XYZ, Xyz};

/// D50 illuminant, the ICC PCS white
pub const D50: Xyz = Xyz::new(0.9642, 1.0, 0.8249);
