//! Behavioral properties of the solver, checked on the CPU evaluator.

use glam::{Vec2, Vec4};
use inkflow::analysis::divergence_energy;
use inkflow::{
    CpuContext, CpuField, FieldDescriptor, FluidConfig, FluidError, FluidParams, FluidPipeline,
    FrameInput, Pass, PassKind, PointerSample, RenderContext, Viewport,
};

/// Delegates to the CPU evaluator and records which buffers every pass touched.
#[derive(Default)]
struct RecordingContext {
    inner: CpuContext,
    passes: Vec<PassRecord>,
}

#[derive(Debug, Clone)]
struct PassRecord {
    kind: PassKind,
    inputs: Vec<u64>,
    target: u64,
}

impl RenderContext for RecordingContext {
    type Field = CpuField;

    fn create_field(&mut self, desc: &FieldDescriptor) -> Result<CpuField, FluidError> {
        self.inner.create_field(desc)
    }

    fn run_pass(
        &mut self,
        pass: &Pass<'_, CpuField>,
        target: &mut CpuField,
    ) -> Result<(), FluidError> {
        self.passes.push(PassRecord {
            kind: pass.kind(),
            inputs: pass.inputs().iter().map(|f| f.id()).collect(),
            target: target.id(),
        });
        self.inner.run_pass(pass, target)
    }

    fn upload(&mut self, field: &mut CpuField, texels: &[Vec4]) -> Result<(), FluidError> {
        self.inner.upload(field, texels)
    }

    fn release_field(&mut self, field: CpuField) {
        self.inner.release_field(field)
    }
}

fn config(params: FluidParams) -> FluidConfig {
    FluidConfig {
        params,
        ..Default::default()
    }
}

fn still(elapsed_time: f32, viewport: Viewport) -> FrameInput {
    FrameInput {
        elapsed_time,
        viewport,
        pointer: Vec2::new(0.3, -0.2),
    }
}

fn grid_texels(width: u32, height: u32, f: impl Fn(f32, f32) -> Vec4) -> Vec<Vec4> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| f(x as f32, y as f32))
        .collect()
}

/// Divergence-free Gaussian vortex centred on the grid, in texels per unit time.
fn vortex(width: u32, height: u32, strength: f32, sigma: f32) -> Vec<Vec4> {
    let c = Vec2::new(width as f32, height as f32) * 0.5;
    grid_texels(width, height, |x, y| {
        let d = Vec2::new(x + 0.5, y + 0.5) - c;
        let falloff = (-d.length_squared() / (2.0 * sigma * sigma)).exp();
        let v = d.perp() * falloff * strength;
        Vec4::new(v.x, v.y, 0.0, 0.0)
    })
}

fn blob(width: u32, height: u32, sigma: f32) -> Vec<Vec4> {
    let c = Vec2::new(width as f32, height as f32) * 0.5;
    grid_texels(width, height, |x, y| {
        let d = Vec2::new(x + 0.5, y + 0.5) - c;
        let v = (-d.length_squared() / (2.0 * sigma * sigma)).exp();
        Vec4::new(v, 0.5 * v, 0.25 * v, 0.0)
    })
}

fn max_channel(field: &CpuField) -> f32 {
    field
        .texels()
        .iter()
        .map(|t| t.x.max(t.y).max(t.z))
        .fold(0.0, f32::max)
}

#[test]
fn test_passes_never_sample_their_target() {
    let mut ctx = RecordingContext::default();
    let viewport = Viewport::new(24, 16);
    let mut pipeline = FluidPipeline::new(&mut ctx, FluidConfig::default(), viewport).unwrap();

    for i in 0..12 {
        let angle = i as f32 * 0.4;
        let input = FrameInput {
            elapsed_time: i as f32 * 0.016,
            viewport,
            pointer: Vec2::new(angle.cos(), angle.sin()) * 0.5,
        };
        pipeline.update(&mut ctx, &input).unwrap();
    }
    // A resize mid-run must not break buffer identity either.
    pipeline.resize(&mut ctx, Viewport::new(16, 16)).unwrap();
    pipeline.update(&mut ctx, &still(1.0, Viewport::new(16, 16))).unwrap();

    assert!(!ctx.passes.is_empty());
    for record in &ctx.passes {
        assert!(
            !record.inputs.contains(&record.target),
            "{:?} pass sampled its own target {}",
            record.kind,
            record.target
        );
    }
}

#[test]
fn test_frame_runs_passes_in_fixed_order() {
    let mut ctx = RecordingContext::default();
    let viewport = Viewport::new(16, 16);
    let mut params = FluidParams::default();
    params.pressure_iterations = 3;
    let mut pipeline = FluidPipeline::new(&mut ctx, config(params), viewport).unwrap();

    pipeline
        .update(&mut ctx, &FrameInput {
            elapsed_time: 0.0,
            viewport,
            pointer: Vec2::ZERO,
        })
        .unwrap();
    ctx.passes.clear();
    pipeline
        .update(&mut ctx, &FrameInput {
            elapsed_time: 0.016,
            viewport,
            pointer: Vec2::new(0.1, 0.0),
        })
        .unwrap();

    use PassKind::*;
    let kinds: Vec<PassKind> = ctx.passes.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Advect,
            Advect,
            Splat,
            Splat,
            Curl,
            Vorticity,
            Divergence,
            Clear,
            Pressure,
            Pressure,
            Pressure,
            GradientSubtract,
        ]
    );

    // Density advection reads the velocity the first pass just wrote.
    assert_eq!(ctx.passes[1].inputs[0], ctx.passes[0].target);
    // Each Jacobi step reads the previous step's output.
    for pair in ctx.passes[7..11].windows(2) {
        assert_eq!(pair[1].inputs[0], pair[0].target);
    }
    // The frame output is the last density write.
    assert_eq!(pipeline.output().id(), ctx.passes[3].target);
}

#[test]
fn test_still_pointer_never_splats() {
    let mut ctx = RecordingContext::default();
    let viewport = Viewport::new(16, 16);
    let mut pipeline = FluidPipeline::new(&mut ctx, FluidConfig::default(), viewport).unwrap();

    for i in 0..20 {
        pipeline.update(&mut ctx, &still(i as f32 * 0.016, viewport)).unwrap();
    }

    assert!(ctx.passes.iter().all(|r| r.kind != PassKind::Splat));
}

#[test]
fn test_no_splat_matches_unforced_decay() {
    let viewport = Viewport::new(24, 24);
    let seed = vortex(24, 24, 4.0, 3.0);

    let mut ctx_a = CpuContext::new();
    let mut tracked = FluidPipeline::new(&mut ctx_a, FluidConfig::default(), viewport).unwrap();
    tracked.velocity_mut().upload(&mut ctx_a, &seed).unwrap();

    let mut ctx_b = CpuContext::new();
    let mut unforced = FluidPipeline::new(&mut ctx_b, FluidConfig::default(), viewport).unwrap();
    unforced.velocity_mut().upload(&mut ctx_b, &seed).unwrap();
    unforced.supply_pointer_sample(Some(PointerSample::default()));

    for i in 0..30 {
        let input = still(i as f32 * 0.016, viewport);
        tracked.update(&mut ctx_a, &input).unwrap();
        unforced.update(&mut ctx_b, &input).unwrap();
    }

    let a = tracked.velocity().read().texels();
    let b = unforced.velocity().read().texels();
    let max_diff = a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x - *y).length())
        .fold(0.0, f32::max);
    assert!(max_diff < 1e-6, "velocity diverged by {}", max_diff);
    assert!(tracked.velocity().read().max_length() > 0.0);
}

#[test]
fn test_density_decays_monotonically() {
    let mut ctx = CpuContext::new();
    let viewport = Viewport::new(32, 32);
    let mut pipeline = FluidPipeline::new(&mut ctx, FluidConfig::default(), viewport).unwrap();
    pipeline.density_mut().upload(&mut ctx, &blob(32, 32, 4.0)).unwrap();
    pipeline
        .velocity_mut()
        .upload(&mut ctx, &vortex(32, 32, 3.0, 5.0))
        .unwrap();

    let mut previous = max_channel(pipeline.output());
    for i in 0..300 {
        let density = pipeline.update(&mut ctx, &still(i as f32 * 0.03, viewport)).unwrap();
        let current = max_channel(density);
        assert!(current.is_finite(), "density became non-finite at frame {}", i);
        assert!(
            current <= previous + 1e-6,
            "density max grew from {} to {} at frame {}",
            previous,
            current,
            i
        );
        previous = current;
    }

    assert!(previous < 5e-3, "density should fade out, max is {}", previous);
    assert!(pipeline.velocity().read().max_length().is_finite());
}

#[test]
fn test_velocity_decays_without_confinement() {
    let mut ctx = CpuContext::new();
    let viewport = Viewport::new(32, 32);
    let mut params = FluidParams::default();
    params.curl_strength = 0.0;
    params.velocity_dissipation = 0.95;
    let mut pipeline = FluidPipeline::new(&mut ctx, config(params), viewport).unwrap();
    pipeline
        .velocity_mut()
        .upload(&mut ctx, &vortex(32, 32, 2.0, 5.0))
        .unwrap();

    let initial = pipeline.velocity().read().max_length();
    let mut checkpoint = initial;
    for i in 0..300 {
        pipeline.update(&mut ctx, &still(i as f32 * 0.03, viewport)).unwrap();
        if (i + 1) % 25 == 0 {
            let current = pipeline.velocity().read().max_length();
            assert!(
                current < checkpoint,
                "velocity max did not decay: {} -> {} by frame {}",
                checkpoint,
                current,
                i
            );
            checkpoint = current;
        }
    }

    assert!(checkpoint < initial * 1e-3, "velocity should converge toward zero");
}

#[test]
fn test_projection_reduces_divergence() {
    let mut ctx = CpuContext::new();
    let viewport = Viewport::new(32, 32);
    let mut params = FluidParams::default();
    params.curl_strength = 0.0;
    params.velocity_dissipation = 1.0;
    params.pressure_dissipation = 0.0;
    let mut pipeline = FluidPipeline::new(&mut ctx, config(params), viewport).unwrap();

    // Radial outflow from the centre.
    let sigma = 3.0f32;
    let outflow = grid_texels(32, 32, |x, y| {
        let d = Vec2::new(x + 0.5, y + 0.5) - 16.0;
        let v = d * (-d.length_squared() / (2.0 * sigma * sigma)).exp();
        Vec4::new(v.x, v.y, 0.0, 0.0)
    });
    pipeline.velocity_mut().upload(&mut ctx, &outflow).unwrap();

    // dt is zero on the first frame, so only the projection changes velocity.
    pipeline.update(&mut ctx, &still(0.0, viewport)).unwrap();

    let before: f32 = pipeline
        .divergence()
        .read()
        .texels()
        .iter()
        .map(|t| t.x * t.x)
        .sum();
    let after = divergence_energy(pipeline.velocity().read());

    assert!(before > 0.0);
    assert!(
        after < before,
        "projection left divergence energy {} (was {})",
        after,
        before
    );
}

#[test]
fn test_end_to_end_single_splat() {
    let mut ctx = CpuContext::new();
    let viewport = Viewport::new(64, 64);
    let mut pipeline = FluidPipeline::new(&mut ctx, FluidConfig::default(), viewport).unwrap();
    assert_eq!(pipeline.params().splat_radius, 0.002);
    assert_eq!(pipeline.params().velocity_acceleration, 10.0);
    assert_eq!(pipeline.params().pressure_iterations, 20);

    pipeline.supply_pointer_sample(Some(PointerSample {
        current: Vec2::ZERO,
        previous: Vec2::new(-0.01, 0.0),
        delta: Vec2::new(0.01, 0.0),
        velocity: Vec2::new(0.0015, 0.0),
        moved: true,
    }));
    let density = pipeline
        .update(&mut ctx, &FrameInput {
            elapsed_time: 0.0,
            viewport,
            pointer: Vec2::ZERO,
        })
        .unwrap();

    // The splat centre sits between texels 31 and 32 on both axes.
    let centre = Vec2::splat(31.5);
    let mut peak: f32 = 0.0;
    for y in 0..64 {
        for x in 0..64 {
            let value = density.texel(x, y).x;
            peak = peak.max(value);
            if (Vec2::new(x as f32, y as f32) - centre).length() > 12.0 {
                assert!(value < 1e-6, "dye at ({}, {}) outside splat: {}", x, y, value);
            }
        }
    }
    assert!(peak > 0.9, "splat peak {} too low", peak);

    pipeline.supply_pointer_sample(None);
    for i in 1..=300 {
        let input = FrameInput {
            elapsed_time: i as f32 / 60.0,
            viewport,
            pointer: Vec2::ZERO,
        };
        pipeline.update(&mut ctx, &input).unwrap();
    }

    let remaining = max_channel(pipeline.output());
    assert!(remaining < 2.5e-3, "dye should fade below epsilon, max is {}", remaining);
}
