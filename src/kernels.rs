//! CPU reference kernels, one per pass program.
//!
//! Each kernel fills `out` texel by texel from its inputs only, mirroring what
//! the compute shaders in the GPU backend do per invocation. Inputs must share
//! the output's dimensions; neighbor fetches clamp to the grid edge.

use crate::cpu::CpuField;
use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;

/// Added to the confinement force length before normalizing.
const VORTICITY_EPSILON: f32 = 1e-4;

fn fill<K>(out: &mut CpuField, kernel: K)
where
    K: Fn(i32, i32, Vec2) -> Vec4 + Sync,
{
    let width = out.width() as usize;
    let size = out.size();
    out.texels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, texel) in row.iter_mut().enumerate() {
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
                *texel = kernel(x as i32, y as i32, uv);
            }
        });
}

/// Channel-`x` values of the left, right, bottom and top neighbors.
fn cross_x(field: &CpuField, x: i32, y: i32) -> (f32, f32, f32, f32) {
    (
        field.texel(x - 1, y).x,
        field.texel(x + 1, y).x,
        field.texel(x, y - 1).x,
        field.texel(x, y + 1).x,
    )
}

pub fn advect(
    velocity: &CpuField,
    source: &CpuField,
    dt: f32,
    dissipation: f32,
    out: &mut CpuField,
) {
    let texel_size = velocity.texel_size();
    fill(out, |x, y, uv| {
        let back = uv - dt * velocity.texel(x, y).xy() * texel_size;
        dissipation * source.sample(back)
    });
}

pub fn splat(
    target: &CpuField,
    point: Vec2,
    color: Vec3,
    radius: f32,
    aspect: f32,
    out: &mut CpuField,
) {
    let center = (point + 1.0) * 0.5;
    fill(out, |x, y, uv| {
        let mut p = uv - center;
        p.x *= aspect;
        let falloff = (-p.length_squared() / radius).exp();
        target.texel(x, y) + (color * falloff).extend(0.0)
    });
}

pub fn curl(velocity: &CpuField, out: &mut CpuField) {
    fill(out, |x, y, _| {
        let left = velocity.texel(x - 1, y).y;
        let right = velocity.texel(x + 1, y).y;
        let bottom = velocity.texel(x, y - 1).x;
        let top = velocity.texel(x, y + 1).x;
        Vec4::new(0.5 * ((right - left) - (top - bottom)), 0.0, 0.0, 0.0)
    });
}

pub fn vorticity(velocity: &CpuField, curl: &CpuField, strength: f32, dt: f32, out: &mut CpuField) {
    fill(out, |x, y, _| {
        let (left, right, bottom, top) = cross_x(curl, x, y);
        let center = curl.texel(x, y).x;

        let mut force = 0.5 * Vec2::new(top.abs() - bottom.abs(), right.abs() - left.abs());
        force /= force.length() + VORTICITY_EPSILON;
        force *= strength * center;
        force.y = -force.y;

        let v = velocity.texel(x, y).xy() + force * dt;
        Vec4::new(v.x, v.y, 0.0, 0.0)
    });
}

pub fn divergence(velocity: &CpuField, out: &mut CpuField) {
    fill(out, |x, y, _| {
        let left = velocity.texel(x - 1, y).x;
        let right = velocity.texel(x + 1, y).x;
        let bottom = velocity.texel(x, y - 1).y;
        let top = velocity.texel(x, y + 1).y;
        Vec4::new(0.5 * ((right - left) + (top - bottom)), 0.0, 0.0, 0.0)
    });
}

pub fn clear(source: &CpuField, value: f32, out: &mut CpuField) {
    fill(out, |x, y, _| value * source.texel(x, y));
}

pub fn pressure(pressure: &CpuField, divergence: &CpuField, out: &mut CpuField) {
    fill(out, |x, y, _| {
        let (left, right, bottom, top) = cross_x(pressure, x, y);
        let div = divergence.texel(x, y).x;
        Vec4::new((left + right + bottom + top - div) * 0.25, 0.0, 0.0, 0.0)
    });
}

pub fn gradient_subtract(pressure: &CpuField, velocity: &CpuField, out: &mut CpuField) {
    fill(out, |x, y, _| {
        let (left, right, bottom, top) = cross_x(pressure, x, y);
        let v = velocity.texel(x, y).xy() - 0.5 * Vec2::new(right - left, top - bottom);
        Vec4::new(v.x, v.y, 0.0, 0.0)
    });
}
