use crate::CpuField;
use crate::cpu::CpuContext;
use crate::pipeline::{FluidPipeline, FrameInput};
use crate::render::Renderer;
use std::path::Path;

pub struct ImageExporter {
    renderer: Renderer,
}

impl ImageExporter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            renderer: Renderer::new(width, height),
        }
    }

    pub fn export_density_png(
        &self,
        density: &CpuField,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let img = self.renderer.render_density(density);
        img.save(path)?;
        Ok(())
    }

    pub fn export_velocity_png(
        &self,
        velocity: &CpuField,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let img = self.renderer.render_velocity(velocity);
        img.save(path)?;
        Ok(())
    }

    /// Steps the pipeline once per input and writes every frame's density.
    pub fn export_frame_sequence(
        &self,
        pipeline: &mut FluidPipeline<CpuField>,
        ctx: &mut CpuContext,
        inputs: &[FrameInput],
        output_dir: &Path,
        prefix: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for (i, input) in inputs.iter().enumerate() {
            let density = pipeline.update(ctx, input)?;

            let filename = format!("{}_frame_{:04}.png", prefix, i);
            self.export_density_png(density, &output_dir.join(filename))?;
        }
        Ok(())
    }
}
