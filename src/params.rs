//! Simulation parameters and the merge-update store the pipeline reads from.

use crate::FluidError;
use crate::pointer::PointerSample;
use glam::{Vec2, Vec3};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Smallest accepted splat radius; the falloff divides by it.
pub const MIN_SPLAT_RADIUS: f32 = 1e-6;

/// Dye injected by a splat: a fixed color, or one derived from the smoothed
/// pointer velocity. Resolved once per splat.
#[derive(Clone, Deserialize)]
#[serde(from = "[f32; 3]")]
pub enum FluidColor {
    Constant(Vec3),
    Dynamic(Arc<dyn Fn(Vec2) -> Vec3 + Send + Sync>),
}

impl FluidColor {
    pub fn dynamic(f: impl Fn(Vec2) -> Vec3 + Send + Sync + 'static) -> Self {
        FluidColor::Dynamic(Arc::new(f))
    }

    pub fn resolve(&self, velocity: Vec2) -> Vec3 {
        match self {
            FluidColor::Constant(color) => *color,
            FluidColor::Dynamic(f) => f(velocity),
        }
    }
}

impl From<[f32; 3]> for FluidColor {
    fn from(rgb: [f32; 3]) -> Self {
        FluidColor::Constant(Vec3::from(rgb))
    }
}

impl From<Vec3> for FluidColor {
    fn from(color: Vec3) -> Self {
        FluidColor::Constant(color)
    }
}

impl Default for FluidColor {
    fn default() -> Self {
        FluidColor::Constant(Vec3::ONE)
    }
}

impl fmt::Debug for FluidColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FluidColor::Constant(color) => f.debug_tuple("Constant").field(color).finish(),
            FluidColor::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FluidParams {
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    pub velocity_acceleration: f32,
    pub pressure_dissipation: f32,
    pub pressure_iterations: u32,
    pub curl_strength: f32,
    pub splat_radius: f32,
    pub fluid_color: FluidColor,
    /// When set, used instead of the pipeline's own pointer tracking.
    pub pointer_sample: Option<PointerSample>,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            density_dissipation: 0.98,
            velocity_dissipation: 0.99,
            velocity_acceleration: 10.0,
            pressure_dissipation: 0.9,
            pressure_iterations: 20,
            curl_strength: 35.0,
            splat_radius: 0.002,
            fluid_color: FluidColor::default(),
            pointer_sample: None,
        }
    }
}

/// Partial parameter set; `None` fields are left untouched by
/// [`ParamStore::set`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FluidParamsUpdate {
    pub density_dissipation: Option<f32>,
    pub velocity_dissipation: Option<f32>,
    pub velocity_acceleration: Option<f32>,
    pub pressure_dissipation: Option<f32>,
    pub pressure_iterations: Option<u32>,
    pub curl_strength: Option<f32>,
    pub splat_radius: Option<f32>,
    pub fluid_color: Option<FluidColor>,
}

impl FluidParamsUpdate {
    pub fn from_json(json: &str) -> Result<Self, FluidError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<&FluidParams> for FluidParamsUpdate {
    fn from(params: &FluidParams) -> Self {
        Self {
            density_dissipation: Some(params.density_dissipation),
            velocity_dissipation: Some(params.velocity_dissipation),
            velocity_acceleration: Some(params.velocity_acceleration),
            pressure_dissipation: Some(params.pressure_dissipation),
            pressure_iterations: Some(params.pressure_iterations),
            curl_strength: Some(params.curl_strength),
            splat_radius: Some(params.splat_radius),
            fluid_color: Some(params.fluid_color.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    params: FluidParams,
}

impl ParamStore {
    /// Builds a store from `params`, clamping anything out of range.
    pub fn new(params: FluidParams) -> Self {
        let mut store = Self::default();
        store.set(FluidParamsUpdate::from(&params));
        store.params.pointer_sample = params.pointer_sample;
        store
    }

    pub fn get(&self) -> &FluidParams {
        &self.params
    }

    pub fn set(&mut self, update: FluidParamsUpdate) {
        let p = &mut self.params;
        if let Some(v) = update.density_dissipation {
            p.density_dissipation = unit("density_dissipation", v, p.density_dissipation);
        }
        if let Some(v) = update.velocity_dissipation {
            p.velocity_dissipation = unit("velocity_dissipation", v, p.velocity_dissipation);
        }
        if let Some(v) = update.pressure_dissipation {
            p.pressure_dissipation = unit("pressure_dissipation", v, p.pressure_dissipation);
        }
        if let Some(v) = update.velocity_acceleration {
            p.velocity_acceleration =
                at_least("velocity_acceleration", v, f32::MIN, p.velocity_acceleration);
        }
        if let Some(v) = update.curl_strength {
            p.curl_strength = at_least("curl_strength", v, 0.0, p.curl_strength);
        }
        if let Some(v) = update.splat_radius {
            p.splat_radius = at_least("splat_radius", v, MIN_SPLAT_RADIUS, p.splat_radius);
        }
        if let Some(v) = update.pressure_iterations {
            if v == 0 {
                log::warn!("pressure_iterations must be at least 1, clamping 0 to 1");
            }
            p.pressure_iterations = v.max(1);
        }
        if let Some(color) = update.fluid_color {
            p.fluid_color = color;
        }
    }

    pub fn set_json(&mut self, json: &str) -> Result<(), FluidError> {
        self.set(FluidParamsUpdate::from_json(json)?);
        Ok(())
    }

    /// `None` hands pointer tracking back to the pipeline.
    pub fn supply_pointer_sample(&mut self, sample: Option<PointerSample>) {
        self.params.pointer_sample = sample;
    }
}

fn unit(name: &str, value: f32, current: f32) -> f32 {
    if !value.is_finite() {
        log::warn!("ignoring non-finite {name} ({value}), keeping {current}");
        return current;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        log::warn!("{name} {value} outside [0, 1], clamping to {clamped}");
    }
    clamped
}

fn at_least(name: &str, value: f32, min: f32, current: f32) -> f32 {
    if !value.is_finite() {
        log::warn!("ignoring non-finite {name} ({value}), keeping {current}");
        return current;
    }
    if value < min {
        log::warn!("{name} {value} below {min}, clamping");
        return min;
    }
    value
}
