//! Randomized pipeline properties
//!
//! Seeded random stage chains checked against properties that hold for
//! every input: identities stay identities, inverses invert, and
//! concatenation composes.

use anyhow::Result;
use cms_tests::{
    SamplePattern, compare_buffers_16, compare_buffers_float, unit_samples, word_samples,
};
use oxcms_pipeline::{
    Context, Pipeline, SamplerFlags, Stage, StageLoc, StageSignature, ToneCurve, batch,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const TRIALS: usize = 50;

/// A diagonally dominant, hence invertible, 3x3 matrix
fn random_matrix(rng: &mut ChaCha8Rng) -> [f64; 9] {
    let mut m = [0.0; 9];
    for row in 0..3 {
        for col in 0..3 {
            m[row * 3 + col] = if row == col {
                rng.gen_range(0.6..0.9)
            } else {
                rng.gen_range(0.0..0.1)
            };
        }
    }
    m
}

fn single_stage(ctx: &Context, stage: Stage) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new(ctx, stage.input_channels(), stage.output_channels())?;
    pipeline.insert_stage(ctx, StageLoc::End, stage)?;
    Ok(pipeline)
}

// ============================================================================
// Identities
// ============================================================================

#[test]
fn test_identity_clut_preserves_words() -> Result<()> {
    let ctx = Context::new();

    for n in 1..=8 {
        let pipeline = single_stage(&ctx, Stage::identity_clut(&ctx, n)?)?;
        let src = word_samples(SamplePattern::Random(n as u64), 1000 * n);

        let mut dst = vec![0u16; src.len()];
        batch::eval_16_batch(&pipeline, &src, &mut dst);

        let diff = compare_buffers_16(&dst, &src);
        assert!(diff.is_within(1.0), "{} channels: {}", n, diff);
    }

    Ok(())
}

#[test]
fn test_lab_xyz_round_trip() -> Result<()> {
    let ctx = Context::new();

    let mut pipeline = Pipeline::new(&ctx, 3, 3)?;
    pipeline.insert_stage(&ctx, StageLoc::End, Stage::xyz_to_lab(&ctx)?)?;
    pipeline.insert_stage(&ctx, StageLoc::End, Stage::lab_to_xyz(&ctx)?)?;
    assert!(
        pipeline
            .check_and_retrieve_stages(&[StageSignature::XYZ_TO_LAB, StageSignature::LAB_TO_XYZ])
            .is_some()
    );

    let src = unit_samples(SamplePattern::Random(5), 3000);
    let mut dst = vec![0.0f32; src.len()];
    batch::eval_float_batch(&pipeline, &src, &mut dst);

    let diff = compare_buffers_float(&dst, &src);
    assert!(diff.is_within(1e-4), "Lab round trip: {}", diff);

    Ok(())
}

#[test]
fn test_curves_then_reverse_is_identity() -> Result<()> {
    let ctx = Context::new();
    let mut rng = ChaCha8Rng::seed_from_u64(9);

    for _ in 0..TRIALS {
        let gamma = rng.gen_range(1.2..3.0);
        let curve = ToneCurve::build_gamma(&ctx, gamma)?;
        let inverse = curve.reverse(&ctx)?;

        let mut pipeline = Pipeline::new(&ctx, 1, 1)?;
        pipeline.insert_stage(&ctx, StageLoc::End, Stage::tone_curves(&ctx, vec![curve])?)?;
        pipeline.insert_stage(&ctx, StageLoc::End, Stage::tone_curves(&ctx, vec![inverse])?)?;

        let src = unit_samples(SamplePattern::Ramp, 101);
        let mut dst = vec![0.0f32; src.len()];
        batch::eval_float_batch(&pipeline, &src, &mut dst);

        let diff = compare_buffers_float(&dst, &src);
        assert!(diff.is_within(1e-4), "gamma {}: {}", gamma, diff);
    }

    Ok(())
}

// ============================================================================
// Composition
// ============================================================================

#[test]
fn test_cat_composes_float_evaluation() -> Result<()> {
    let ctx = Context::new();
    let mut rng = ChaCha8Rng::seed_from_u64(13);

    for trial in 0..TRIALS {
        let gamma = rng.gen_range(1.0..2.6);
        let curves = Stage::tone_curves(&ctx, vec![ToneCurve::build_gamma(&ctx, gamma)?; 3])?;
        let first = single_stage(&ctx, curves)?;
        let matrix = Stage::matrix(&ctx, 3, 3, &random_matrix(&mut rng), None)?;
        let second = single_stage(&ctx, matrix)?;

        let mut joined = first.clone();
        joined.cat(&ctx, &second)?;
        assert_eq!(joined.stage_count(), 2);

        let input = [rng.r#gen::<f32>(), rng.r#gen::<f32>(), rng.r#gen::<f32>()];
        let mut mid = [0.0f32; 3];
        let mut expected = [0.0f32; 3];
        first.eval_float(&input, &mut mid);
        second.eval_float(&mid, &mut expected);

        let mut got = [0.0f32; 3];
        joined.eval_float(&input, &mut got);
        assert_eq!(got, expected, "trial {}", trial);
    }

    Ok(())
}

#[test]
fn test_trilinear_and_tetrahedral_agree_on_linear_tables() -> Result<()> {
    let ctx = Context::new();
    let mut rng = ChaCha8Rng::seed_from_u64(17);

    for trial in 0..10 {
        let m = random_matrix(&mut rng);
        let mut clut = Stage::clut_float(&ctx, 9, 3, 3, None)?;
        clut.sample_clut_float(
            &ctx,
            |input, output| {
                for (row, out) in output.iter_mut().enumerate() {
                    *out = (0..3)
                        .map(|col| m[row * 3 + col] as f32 * input[col])
                        .sum();
                }
                true
            },
            SamplerFlags::NONE,
        )?;

        let tetrahedral = single_stage(&ctx, clut)?;
        let mut trilinear = tetrahedral.clone();
        trilinear.change_interpolation_to_trilinear();

        let src = unit_samples(SamplePattern::Random(100 + trial), 300);
        let mut a = vec![0.0f32; src.len()];
        let mut b = vec![0.0f32; src.len()];
        batch::eval_float_batch(&tetrahedral, &src, &mut a);
        batch::eval_float_batch(&trilinear, &src, &mut b);

        let diff = compare_buffers_float(&a, &b);
        assert!(diff.is_within(1e-5), "trial {}: {}", trial, diff);
    }

    Ok(())
}

// ============================================================================
// Reverse Evaluation
// ============================================================================

#[test]
fn test_reverse_recovers_matrix_input() -> Result<()> {
    let ctx = Context::new();
    let mut rng = ChaCha8Rng::seed_from_u64(21);

    for trial in 0..TRIALS {
        let pipeline =
            single_stage(&ctx, Stage::matrix(&ctx, 3, 3, &random_matrix(&mut rng), None)?)?;

        let input = [
            rng.gen_range(0.1f32..0.9),
            rng.gen_range(0.1f32..0.9),
            rng.gen_range(0.1f32..0.9),
        ];
        let mut target = [0.0f32; 3];
        pipeline.eval_float(&input, &mut target);

        let found = pipeline
            .eval_reverse_float(&target, None)
            .ok_or_else(|| anyhow::anyhow!("trial {}: no solution", trial))?;

        for (x, y) in input.iter().zip(&found) {
            assert!((x - y).abs() < 1e-3, "trial {}: {:?} vs {:?}", trial, input, found);
        }
    }

    Ok(())
}

#[test]
fn test_reverse_through_curves_and_matrix() -> Result<()> {
    let ctx = Context::new();
    let mut rng = ChaCha8Rng::seed_from_u64(23);

    for trial in 0..TRIALS {
        let curves = Stage::tone_curves(&ctx, vec![ToneCurve::build_gamma(&ctx, 1.8)?; 3])?;
        let matrix = Stage::matrix(&ctx, 3, 3, &random_matrix(&mut rng), None)?;

        let mut pipeline = Pipeline::new(&ctx, 3, 3)?;
        pipeline.insert_stage(&ctx, StageLoc::End, curves)?;
        pipeline.insert_stage(&ctx, StageLoc::End, matrix)?;

        let input = [
            rng.gen_range(0.2f32..0.8),
            rng.gen_range(0.2f32..0.8),
            rng.gen_range(0.2f32..0.8),
        ];
        let mut target = [0.0f32; 3];
        pipeline.eval_float(&input, &mut target);

        let found = pipeline
            .eval_reverse_float(&target, Some(&[0.5, 0.5, 0.5][..]))
            .ok_or_else(|| anyhow::anyhow!("trial {}: no solution", trial))?;

        for (x, y) in input.iter().zip(&found) {
            assert!((x - y).abs() < 1e-3, "trial {}: {:?} vs {:?}", trial, input, found);
        }
    }

    Ok(())
}
