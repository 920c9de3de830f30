//! GPU backend tests. Each test returns early when no adapter is available.

#![cfg(feature = "gpu")]

use glam::{Vec2, Vec4};
use inkflow::{
    CpuContext, FieldDescriptor, FluidConfig, FluidError, FluidParams, FluidPipeline, FrameInput,
    GpuContext, RenderContext, Viewport,
};

async fn gpu() -> Option<GpuContext> {
    match GpuContext::new().await {
        Ok(ctx) => Some(ctx),
        Err(FluidError::NoAdapter) => {
            eprintln!("no GPU adapter, skipping");
            None
        }
        Err(err) => panic!("GPU setup failed: {err}"),
    }
}

#[tokio::test]
async fn test_upload_and_read_back() {
    let Some(mut ctx) = gpu().await else {
        return;
    };

    let desc = FieldDescriptor {
        label: "roundtrip",
        width: 70,
        height: 3,
    };
    let mut field = ctx.create_field(&desc).unwrap();
    let texels: Vec<Vec4> = (0..desc.texel_count())
        .map(|i| Vec4::new(i as f32, -(i as f32), 0.5, 1.0))
        .collect();
    ctx.upload(&mut field, &texels).unwrap();

    let read = ctx.read_field(&field).await.unwrap();
    assert_eq!(read, texels, "readback must strip row padding");

    ctx.release_field(field);
    assert_eq!(ctx.live_fields(), 0);
}

#[tokio::test]
async fn test_upload_rejects_wrong_texel_count() {
    let Some(mut ctx) = gpu().await else {
        return;
    };

    let mut field = ctx
        .create_field(&FieldDescriptor {
            label: "short",
            width: 4,
            height: 4,
        })
        .unwrap();
    let result = ctx.upload(&mut field, &[Vec4::ZERO; 3]);
    assert!(matches!(result, Err(FluidError::TexelCount { expected: 16, actual: 3, .. })));
}

#[tokio::test]
async fn test_gpu_matches_cpu_reference() {
    let Some(mut gpu_ctx) = gpu().await else {
        return;
    };
    let mut cpu_ctx = CpuContext::new();

    let viewport = Viewport::new(32, 24);
    let mut params = FluidParams::default();
    params.curl_strength = 0.0;
    let config = FluidConfig {
        params,
        ..Default::default()
    };

    let mut gpu_pipeline = FluidPipeline::new(&mut gpu_ctx, config.clone(), viewport).unwrap();
    let mut cpu_pipeline = FluidPipeline::new(&mut cpu_ctx, config, viewport).unwrap();

    for i in 0..6 {
        let input = FrameInput {
            elapsed_time: i as f32 * 0.016,
            viewport,
            pointer: Vec2::new(-0.4 + i as f32 * 0.1, 0.1),
        };
        gpu_pipeline.update(&mut gpu_ctx, &input).unwrap();
        cpu_pipeline.update(&mut cpu_ctx, &input).unwrap();
    }

    let gpu_density = gpu_ctx.read_field(gpu_pipeline.output()).await.unwrap();
    let cpu_density = cpu_pipeline.output().texels();
    assert_eq!(gpu_density.len(), cpu_density.len());
    for (i, (g, c)) in gpu_density.iter().zip(cpu_density).enumerate() {
        assert!(
            (*g - *c).abs().max_element() < 1e-3,
            "texel {} differs: gpu {:?} cpu {:?}",
            i,
            g,
            c
        );
    }

    gpu_pipeline.destroy(&mut gpu_ctx);
    assert_eq!(gpu_ctx.live_fields(), 0);
}
