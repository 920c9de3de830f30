use crate::params::FluidParams;
use glam::Vec2;

/// On-screen size supplied by the host, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

#[derive(Debug, Clone)]
pub struct FluidConfig {
    /// Simulation grid cells per viewport pixel, applied on creation and on
    /// every resize.
    pub resolution_scale: f32,
    /// Reallocate the fields when `update` sees a new viewport size.
    pub resize_on_viewport_change: bool,
    pub params: FluidParams,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            resolution_scale: 1.0,
            resize_on_viewport_change: true,
            params: FluidParams::default(),
        }
    }
}

impl FluidConfig {
    /// Grid dimensions for `viewport`, at least one cell per axis.
    pub fn grid_size(&self, viewport: Viewport) -> (u32, u32) {
        let scale = if self.resolution_scale.is_finite() && self.resolution_scale > 0.0 {
            self.resolution_scale
        } else {
            log::warn!(
                "resolution_scale {} is not positive, using 1.0",
                self.resolution_scale
            );
            1.0
        };
        let axis = |pixels: u32| ((pixels as f32 * scale).round() as u32).max(1);
        (axis(viewport.width), axis(viewport.height))
    }
}
