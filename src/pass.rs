//! Pass programs: the per-texel transformations the pipeline sequences.
//!
//! A `Pass` names a kernel together with the fields it samples and its scalar
//! uniforms. It never names its output; the target is handed to
//! [`RenderContext::run_pass`](crate::RenderContext::run_pass) separately and
//! exclusively, so a pass can never sample the buffer it is writing.

use glam::{Vec2, Vec3};

/// Kernel identity without its bindings, used for logging and instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Advect,
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Clear,
    Pressure,
    GradientSubtract,
}

impl PassKind {
    pub fn label(self) -> &'static str {
        match self {
            PassKind::Advect => "advect",
            PassKind::Splat => "splat",
            PassKind::Curl => "curl",
            PassKind::Vorticity => "vorticity",
            PassKind::Divergence => "divergence",
            PassKind::Clear => "clear",
            PassKind::Pressure => "pressure",
            PassKind::GradientSubtract => "gradient_subtract",
        }
    }
}

#[derive(Debug)]
pub enum Pass<'a, F> {
    /// Semi-Lagrangian back-trace of `source` along `velocity`.
    Advect {
        velocity: &'a F,
        source: &'a F,
        dt: f32,
        dissipation: f32,
    },
    /// Gaussian impulse added on top of `target`.
    ///
    /// `point` is in normalized device coordinates (-1..1 on both axes),
    /// `aspect` is width over height of the grid.
    Splat {
        target: &'a F,
        point: Vec2,
        color: Vec3,
        radius: f32,
        aspect: f32,
    },
    Curl {
        velocity: &'a F,
    },
    Vorticity {
        velocity: &'a F,
        curl: &'a F,
        strength: f32,
        dt: f32,
    },
    Divergence {
        velocity: &'a F,
    },
    /// Scales every texel of `source` by `value`.
    Clear {
        source: &'a F,
        value: f32,
    },
    /// One Jacobi relaxation step of the pressure Poisson equation.
    Pressure {
        pressure: &'a F,
        divergence: &'a F,
    },
    GradientSubtract {
        pressure: &'a F,
        velocity: &'a F,
    },
}

impl<'a, F> Pass<'a, F> {
    pub fn kind(&self) -> PassKind {
        match self {
            Pass::Advect { .. } => PassKind::Advect,
            Pass::Splat { .. } => PassKind::Splat,
            Pass::Curl { .. } => PassKind::Curl,
            Pass::Vorticity { .. } => PassKind::Vorticity,
            Pass::Divergence { .. } => PassKind::Divergence,
            Pass::Clear { .. } => PassKind::Clear,
            Pass::Pressure { .. } => PassKind::Pressure,
            Pass::GradientSubtract { .. } => PassKind::GradientSubtract,
        }
    }

    /// Every field this pass samples, in binding order.
    pub fn inputs(&self) -> Vec<&'a F> {
        match *self {
            Pass::Advect {
                velocity, source, ..
            } => vec![velocity, source],
            Pass::Splat { target, .. } => vec![target],
            Pass::Curl { velocity } => vec![velocity],
            Pass::Vorticity { velocity, curl, .. } => vec![velocity, curl],
            Pass::Divergence { velocity } => vec![velocity],
            Pass::Clear { source, .. } => vec![source],
            Pass::Pressure {
                pressure,
                divergence,
            } => vec![pressure, divergence],
            Pass::GradientSubtract { pressure, velocity } => vec![pressure, velocity],
        }
    }
}
