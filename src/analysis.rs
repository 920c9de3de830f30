use crate::cpu::CpuField;
use glam::{Vec3, Vec4Swizzles};

/// Central-difference divergence of the xy channels at every texel,
/// clamp-to-edge, matching the divergence pass.
pub fn divergence_at(velocity: &CpuField, x: i32, y: i32) -> f32 {
    let l = velocity.texel(x - 1, y).x;
    let r = velocity.texel(x + 1, y).x;
    let b = velocity.texel(x, y - 1).y;
    let t = velocity.texel(x, y + 1).y;
    0.5 * ((r - l) + (t - b))
}

/// Sum of squared divergence over the whole grid.
pub fn divergence_energy(velocity: &CpuField) -> f32 {
    let mut total = 0.0;
    for y in 0..velocity.height() as i32 {
        for x in 0..velocity.width() as i32 {
            total += divergence_at(velocity, x, y).powi(2);
        }
    }
    total
}

#[derive(Debug, Clone)]
pub struct FluidMetrics {
    /// Sum of all dye channels.
    pub total_dye: f32,
    pub max_dye: f32,
    pub kinetic_energy: f32,
    pub max_speed: f32,
    pub avg_speed: f32,
    pub mean_divergence: f32,
    pub mean_vorticity: f32,
    pub frame: u64,
}

impl FluidMetrics {
    pub fn analyze(velocity: &CpuField, density: &CpuField, frame: u64) -> Self {
        let mut total_dye = 0.0;
        let mut max_dye: f32 = 0.0;
        for texel in density.texels() {
            let dye = texel.xyz();
            total_dye += dye.dot(Vec3::ONE);
            max_dye = max_dye.max(dye.max_element());
        }

        let mut kinetic_energy = 0.0;
        let mut max_speed: f32 = 0.0;
        let mut speed_sum = 0.0;
        let mut total_divergence = 0.0;
        let mut total_vorticity = 0.0;

        for y in 0..velocity.height() as i32 {
            for x in 0..velocity.width() as i32 {
                let v = velocity.texel(x, y).xy();
                let speed = v.length();
                kinetic_energy += 0.5 * speed * speed;
                max_speed = max_speed.max(speed);
                speed_sum += speed;

                total_divergence += divergence_at(velocity, x, y).abs();

                let vorticity = 0.5
                    * ((velocity.texel(x + 1, y).y - velocity.texel(x - 1, y).y)
                        - (velocity.texel(x, y + 1).x - velocity.texel(x, y - 1).x));
                total_vorticity += vorticity.abs();
            }
        }

        let cells = (velocity.width() * velocity.height()) as f32;

        Self {
            total_dye,
            max_dye,
            kinetic_energy,
            max_speed,
            avg_speed: speed_sum / cells,
            mean_divergence: total_divergence / cells,
            mean_vorticity: total_vorticity / cells,
            frame,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.total_dye,
            self.max_dye,
            self.kinetic_energy,
            self.max_speed,
            self.mean_divergence,
            self.mean_vorticity,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    pub fn log_summary(&self) {
        log::info!(
            "frame {}: dye {:.4} (max {:.4}), kinetic energy {:.4}, max speed {:.4}, \
             |div| {:.6}, |curl| {:.6}",
            self.frame,
            self.total_dye,
            self.max_dye,
            self.kinetic_energy,
            self.max_speed,
            self.mean_divergence,
            self.mean_vorticity
        );
    }
}

#[derive(Debug, Default)]
pub struct AnalysisRecorder {
    pub metrics_history: Vec<FluidMetrics>,
}

impl AnalysisRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, velocity: &CpuField, density: &CpuField, frame: u64) {
        let metrics = FluidMetrics::analyze(velocity, density, frame);
        self.metrics_history.push(metrics);
    }

    pub fn latest(&self) -> Option<&FluidMetrics> {
        self.metrics_history.last()
    }

    pub fn log_trends(&self) {
        if self.metrics_history.len() < 2 {
            return;
        }

        let first = &self.metrics_history[0];
        let last = &self.metrics_history[self.metrics_history.len() - 1];

        log::info!(
            "dye change: {:.6} -> {:.6} ({:+.3}%)",
            first.total_dye,
            last.total_dye,
            (last.total_dye - first.total_dye) / first.total_dye.max(0.001) * 100.0
        );
        log::info!(
            "kinetic energy change: {:.6} -> {:.6} ({:+.3}%)",
            first.kinetic_energy,
            last.kinetic_energy,
            (last.kinetic_energy - first.kinetic_energy) / first.kinetic_energy.max(0.001)
                * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FieldDescriptor, RenderContext};
    use crate::cpu::CpuContext;
    use glam::Vec4;

    fn field(ctx: &mut CpuContext, texels: &[Vec4], width: u32, height: u32) -> CpuField {
        let mut f = ctx
            .create_field(&FieldDescriptor {
                label: "test",
                width,
                height,
            })
            .unwrap();
        ctx.upload(&mut f, texels).unwrap();
        f
    }

    #[test]
    fn uniform_flow_has_no_divergence() {
        let mut ctx = CpuContext::new();
        let velocity = field(&mut ctx, &[Vec4::new(3.0, -1.0, 0.0, 0.0); 16], 4, 4);
        let density = field(&mut ctx, &[Vec4::new(0.5, 0.25, 0.0, 0.0); 16], 4, 4);

        let metrics = FluidMetrics::analyze(&velocity, &density, 7);
        assert_eq!(divergence_energy(&velocity), 0.0);
        assert_eq!(metrics.mean_divergence, 0.0);
        assert_eq!(metrics.mean_vorticity, 0.0);
        assert!((metrics.total_dye - 12.0).abs() < 1e-5);
        assert!((metrics.max_dye - 0.5).abs() < 1e-6);
        assert!((metrics.kinetic_energy - 16.0 * 5.0).abs() < 1e-3);
        assert_eq!(metrics.frame, 7);
    }

    #[test]
    fn outflow_is_divergent() {
        let mut ctx = CpuContext::new();
        // x velocity grows left to right.
        let texels: Vec<Vec4> = (0..16)
            .map(|i| Vec4::new((i % 4) as f32, 0.0, 0.0, 0.0))
            .collect();
        let velocity = field(&mut ctx, &texels, 4, 4);
        assert_eq!(divergence_at(&velocity, 1, 1), 1.0);
        assert!(divergence_energy(&velocity) > 0.0);
    }
}
