//! Batch pipeline evaluation
//!
//! These functions walk interleaved pixel buffers, one pipeline evaluation
//! per pixel. The pipeline must be fully built; evaluation only reads it.

use crate::pipeline::Pipeline;

/// Evaluate a buffer of interleaved 16-bit pixels
///
/// `src` holds whole pixels of `input_channels` values; `dst` receives
/// `output_channels` values per pixel.
///
/// # Panics
/// If the pipeline has no channels, `src` holds a partial pixel, or `dst`
/// is too short.
pub fn eval_16_batch(pipeline: &Pipeline, src: &[u16], dst: &mut [u16]) {
    let n_in = pipeline.input_channels();
    let n_out = pipeline.output_channels();
    assert!(n_in > 0 && n_out > 0);
    assert!(src.len() % n_in == 0);
    assert!(dst.len() >= src.len() / n_in * n_out);

    for (src_px, dst_px) in src.chunks_exact(n_in).zip(dst.chunks_exact_mut(n_out)) {
        pipeline.eval_16(src_px, dst_px);
    }
}

/// Evaluate a buffer of interleaved float pixels
///
/// # Panics
/// As [`eval_16_batch`].
pub fn eval_float_batch(pipeline: &Pipeline, src: &[f32], dst: &mut [f32]) {
    let n_in = pipeline.input_channels();
    let n_out = pipeline.output_channels();
    assert!(n_in > 0 && n_out > 0);
    assert!(src.len() % n_in == 0);
    assert!(dst.len() >= src.len() / n_in * n_out);

    for (src_px, dst_px) in src.chunks_exact(n_in).zip(dst.chunks_exact_mut(n_out)) {
        pipeline.eval_float(src_px, dst_px);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::pipeline::{Stage, StageLoc};

    fn rgb_to_gray(ctx: &Context) -> Pipeline {
        let mut pipeline = Pipeline::new(ctx, 3, 1).unwrap();
        let luma = Stage::matrix(ctx, 1, 3, &[0.25, 0.5, 0.25], None).unwrap();
        pipeline.insert_stage(ctx, StageLoc::End, luma).unwrap();
        pipeline
    }

    #[test]
    fn test_eval_16_batch() {
        let ctx = Context::default();
        let pipeline = rgb_to_gray(&ctx);

        let src = [65535u16, 65535, 65535, 0, 0, 0, 65535, 0, 0];
        let mut dst = [1u16; 3];
        eval_16_batch(&pipeline, &src, &mut dst);

        assert_eq!(dst, [65535, 0, 16384]);
    }

    #[test]
    fn test_eval_float_batch_matches_single() {
        let ctx = Context::default();
        let pipeline = rgb_to_gray(&ctx);

        let src: Vec<f32> = (0..30).map(|i| i as f32 / 29.0).collect();
        let mut dst = vec![0.0f32; 10];
        eval_float_batch(&pipeline, &src, &mut dst);

        for (px, &got) in src.chunks_exact(3).zip(&dst) {
            let mut single = [0.0f32; 1];
            pipeline.eval_float(px, &mut single);
            assert_eq!(single[0], got);
        }
    }

    #[test]
    #[should_panic]
    fn test_partial_pixel_panics() {
        let ctx = Context::default();
        let pipeline = rgb_to_gray(&ctx);
        let mut dst = [0u16; 2];
        eval_16_batch(&pipeline, &[1, 2, 3, 4], &mut dst);
    }
}
