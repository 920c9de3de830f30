//! CPU reference evaluator for the pass programs.
//!
//! Lets the whole pipeline run and be inspected without a GPU. Each field
//! carries a unique id so tests can check buffer identity per pass.

use crate::FluidError;
use crate::context::{FieldDescriptor, RenderContext};
use crate::kernels;
use crate::pass::Pass;
use glam::{Vec2, Vec4};

/// Largest width or height a field may have, matching common device limits.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// A grid of four-channel texels, row-major with row 0 at the bottom (v = 0).
#[derive(Debug)]
pub struct CpuField {
    id: u64,
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
}

impl CpuField {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn texel_size(&self) -> Vec2 {
        1.0 / self.size()
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub(crate) fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// Texel fetch with clamp-to-edge addressing.
    pub fn texel(&self, x: i32, y: i32) -> Vec4 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Bilinear sample at normalized coordinates, clamp-to-edge.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let pos = uv * self.size() - 0.5;
        let base = pos.floor();
        let t = pos - base;
        let (x, y) = (base.x as i32, base.y as i32);

        let bottom = self.texel(x, y).lerp(self.texel(x + 1, y), t.x);
        let top = self.texel(x, y + 1).lerp(self.texel(x + 1, y + 1), t.x);
        bottom.lerp(top, t.y)
    }

    pub fn max_length(&self) -> f32 {
        self.texels
            .iter()
            .map(|t| t.length())
            .fold(0.0, f32::max)
    }
}

#[derive(Debug)]
pub struct CpuContext {
    next_id: u64,
    live_fields: usize,
    passes_run: u64,
    max_dimension: u32,
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuContext {
    pub fn new() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_DIMENSION)
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            next_id: 0,
            live_fields: 0,
            passes_run: 0,
            max_dimension,
        }
    }

    /// Fields created and not yet released.
    pub fn live_fields(&self) -> usize {
        self.live_fields
    }

    pub fn passes_run(&self) -> u64 {
        self.passes_run
    }
}

impl RenderContext for CpuContext {
    type Field = CpuField;

    fn create_field(&mut self, desc: &FieldDescriptor) -> Result<CpuField, FluidError> {
        let reason = if desc.width == 0 || desc.height == 0 {
            Some("field has no area".to_string())
        } else if desc.width > self.max_dimension || desc.height > self.max_dimension {
            Some(format!("exceeds maximum dimension {}", self.max_dimension))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(FluidError::Allocation {
                label: desc.label,
                width: desc.width,
                height: desc.height,
                reason,
            });
        }

        self.next_id += 1;
        self.live_fields += 1;
        log::debug!(
            "allocated {} field #{} at {}x{}",
            desc.label,
            self.next_id,
            desc.width,
            desc.height
        );

        Ok(CpuField {
            id: self.next_id,
            width: desc.width,
            height: desc.height,
            texels: vec![Vec4::ZERO; desc.texel_count()],
        })
    }

    fn run_pass(
        &mut self,
        pass: &Pass<'_, CpuField>,
        target: &mut CpuField,
    ) -> Result<(), FluidError> {
        debug_assert!(
            pass.inputs().iter().all(|input| input.id != target.id),
            "{} pass samples its own target",
            pass.kind().label()
        );

        match *pass {
            Pass::Advect {
                velocity,
                source,
                dt,
                dissipation,
            } => kernels::advect(velocity, source, dt, dissipation, target),
            Pass::Splat {
                target: base,
                point,
                color,
                radius,
                aspect,
            } => kernels::splat(base, point, color, radius, aspect, target),
            Pass::Curl { velocity } => kernels::curl(velocity, target),
            Pass::Vorticity {
                velocity,
                curl,
                strength,
                dt,
            } => kernels::vorticity(velocity, curl, strength, dt, target),
            Pass::Divergence { velocity } => kernels::divergence(velocity, target),
            Pass::Clear { source, value } => kernels::clear(source, value, target),
            Pass::Pressure {
                pressure,
                divergence,
            } => kernels::pressure(pressure, divergence, target),
            Pass::GradientSubtract { pressure, velocity } => {
                kernels::gradient_subtract(pressure, velocity, target)
            }
        }

        self.passes_run += 1;
        log::trace!("{} pass into field #{}", pass.kind().label(), target.id);
        Ok(())
    }

    fn upload(&mut self, field: &mut CpuField, texels: &[Vec4]) -> Result<(), FluidError> {
        if texels.len() != field.texels.len() {
            return Err(FluidError::TexelCount {
                width: field.width,
                height: field.height,
                expected: field.texels.len(),
                actual: texels.len(),
            });
        }
        field.texels.copy_from_slice(texels);
        Ok(())
    }

    fn release_field(&mut self, field: CpuField) {
        self.live_fields = self.live_fields.saturating_sub(1);
        log::debug!("released field #{}", field.id);
    }
}
