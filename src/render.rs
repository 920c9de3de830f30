use crate::cpu::CpuField;
use glam::Vec4Swizzles;
use image::{ImageBuffer, Rgb, RgbImage};

/// Rasterizes CPU fields to images, nearest-neighbor scaled to the output
/// size. Field row 0 is the bottom of the image.
pub struct Renderer {
    width: u32,
    height: u32,
    /// Speed mapped to full channel intensity in velocity images.
    velocity_scale: f32,
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            velocity_scale: 50.0,
        }
    }

    fn sample_texel(&self, field: &CpuField, x: u32, y: u32) -> glam::Vec4 {
        let fx = (x as u64 * field.width() as u64 / self.width as u64) as i32;
        // Flip so the top image row shows the top of the field.
        let fy = field.height() as i32
            - 1
            - (y as u64 * field.height() as u64 / self.height as u64) as i32;
        field.texel(fx, fy)
    }

    pub fn render_density(&self, density: &CpuField) -> RgbImage {
        let mut img = ImageBuffer::new(self.width, self.height);

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let color = self
                .sample_texel(density, x, y)
                .xyz()
                .clamp(glam::Vec3::ZERO, glam::Vec3::ONE);
            *pixel = Rgb([
                (color.x * 255.0) as u8,
                (color.y * 255.0) as u8,
                (color.z * 255.0) as u8,
            ]);
        }

        img
    }

    pub fn render_velocity(&self, velocity: &CpuField) -> RgbImage {
        let mut img = ImageBuffer::new(self.width, self.height);

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let v = self.sample_texel(velocity, x, y).xy() / self.velocity_scale;

            // Red for horizontal speed, green for vertical.
            let r = (v.x.abs() * 255.0).min(255.0) as u8;
            let g = (v.y.abs() * 255.0).min(255.0) as u8;
            *pixel = Rgb([r, g, 128]);
        }

        img
    }
}
