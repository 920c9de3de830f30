//! Per-frame orchestration of the fluid passes.

use crate::FluidError;
use crate::config::{FluidConfig, Viewport};
use crate::context::{FieldDescriptor, RenderContext};
use crate::field::{FieldBuffer, PingPong};
use crate::params::{FluidParams, FluidParamsUpdate, ParamStore};
use crate::pass::Pass;
use crate::pointer::{PointerSample, PointerTracker};
use glam::Vec2;

/// Wall-clock seconds per simulation second.
pub const TIME_STEP_DAMPING: f32 = 3.0;
/// Upper bound on `dt`, whatever the frame gap.
pub const MAX_TIME_STEP: f32 = 0.02;

/// What the host supplies once per rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Seconds since the host's clock started.
    pub elapsed_time: f32,
    pub viewport: Viewport,
    /// Pointer position in normalized device coordinates (-1..1).
    pub pointer: Vec2,
}

/// Turns host timestamps into a clamped simulation time step.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<f32>,
}

impl FrameClock {
    /// The first tick only records the baseline and returns 0.
    pub fn tick(&mut self, elapsed: f32) -> f32 {
        if !elapsed.is_finite() {
            return 0.0;
        }
        let last = self.last.replace(elapsed).unwrap_or(elapsed);
        ((elapsed - last) / TIME_STEP_DAMPING).clamp(0.0, MAX_TIME_STEP)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// All render targets of one simulation, allocated together.
struct FluidFields<F> {
    velocity: PingPong<F>,
    density: PingPong<F>,
    curl: FieldBuffer<F>,
    divergence: FieldBuffer<F>,
    pressure: PingPong<F>,
}

impl<F> FluidFields<F> {
    fn allocate<C>(ctx: &mut C, width: u32, height: u32) -> Result<Self, FluidError>
    where
        C: RenderContext<Field = F>,
    {
        let desc = |label: &'static str| FieldDescriptor {
            label,
            width,
            height,
        };
        // Each failure hands the fields created so far back to the context.
        let velocity = PingPong::new(ctx, desc("velocity"))?;
        let density = match PingPong::new(ctx, desc("density")) {
            Ok(density) => density,
            Err(err) => {
                velocity.release(ctx);
                return Err(err);
            }
        };
        let curl = match FieldBuffer::new(ctx, desc("curl")) {
            Ok(curl) => curl,
            Err(err) => {
                velocity.release(ctx);
                density.release(ctx);
                return Err(err);
            }
        };
        let divergence = match FieldBuffer::new(ctx, desc("divergence")) {
            Ok(divergence) => divergence,
            Err(err) => {
                velocity.release(ctx);
                density.release(ctx);
                curl.release(ctx);
                return Err(err);
            }
        };
        let pressure = match PingPong::new(ctx, desc("pressure")) {
            Ok(pressure) => pressure,
            Err(err) => {
                velocity.release(ctx);
                density.release(ctx);
                curl.release(ctx);
                divergence.release(ctx);
                return Err(err);
            }
        };

        Ok(Self {
            velocity,
            density,
            curl,
            divergence,
            pressure,
        })
    }

    fn release<C>(self, ctx: &mut C)
    where
        C: RenderContext<Field = F>,
    {
        self.velocity.release(ctx);
        self.density.release(ctx);
        self.curl.release(ctx);
        self.divergence.release(ctx);
        self.pressure.release(ctx);
    }
}

/// A stable-fluids simulation stepped once per host frame.
///
/// Generic over the field type of the [`RenderContext`] it was built with;
/// every call that touches the fields takes that context explicitly.
pub struct FluidPipeline<F> {
    fields: FluidFields<F>,
    config: FluidConfig,
    viewport: Viewport,
    grid: (u32, u32),
    params: ParamStore,
    pointer: PointerTracker,
    clock: FrameClock,
    last_dt: f32,
    frame: u64,
}

impl<F> FluidPipeline<F> {
    pub fn new<C>(ctx: &mut C, config: FluidConfig, viewport: Viewport) -> Result<Self, FluidError>
    where
        C: RenderContext<Field = F>,
    {
        if viewport.is_empty() {
            return Err(FluidError::EmptyViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let grid = config.grid_size(viewport);
        let fields = FluidFields::allocate(ctx, grid.0, grid.1)?;
        log::info!(
            "fluid pipeline created: viewport {}x{}, grid {}x{}",
            viewport.width,
            viewport.height,
            grid.0,
            grid.1
        );

        Ok(Self {
            fields,
            params: ParamStore::new(config.params.clone()),
            config,
            viewport,
            grid,
            pointer: PointerTracker::new(),
            clock: FrameClock::default(),
            last_dt: 0.0,
            frame: 0,
        })
    }

    /// Advances the simulation by one frame and returns the density field.
    ///
    /// A zero-sized viewport skips the frame and returns the previous output.
    pub fn update<C>(&mut self, ctx: &mut C, input: &FrameInput) -> Result<&F, FluidError>
    where
        C: RenderContext<Field = F>,
    {
        if input.viewport.is_empty() {
            log::debug!("skipping frame {}: empty viewport", self.frame);
            return Ok(self.output());
        }
        if self.config.resize_on_viewport_change && input.viewport != self.viewport {
            self.resize(ctx, input.viewport)?;
        }

        let dt = self.clock.tick(input.elapsed_time);
        let params = self.params.get().clone();
        let sample = match params.pointer_sample {
            Some(sample) => sample,
            None => self.pointer.update(input.pointer),
        };

        self.step(ctx, dt, &params, &sample, input.viewport)?;
        self.last_dt = dt;
        self.frame += 1;
        Ok(self.fields.density.read())
    }

    fn step<C>(
        &mut self,
        ctx: &mut C,
        dt: f32,
        params: &FluidParams,
        sample: &PointerSample,
        viewport: Viewport,
    ) -> Result<(), FluidError>
    where
        C: RenderContext<Field = F>,
    {
        let f = &mut self.fields;

        f.velocity.write(ctx, |read| Pass::Advect {
            velocity: read,
            source: read,
            dt,
            dissipation: params.velocity_dissipation,
        })?;

        let velocity = f.velocity.read();
        f.density.write(ctx, |read| Pass::Advect {
            velocity,
            source: read,
            dt,
            dissipation: params.density_dissipation,
        })?;

        if sample.moved {
            let aspect = self.grid.0 as f32 / self.grid.1 as f32;
            let force = sample.delta * viewport.size() * params.velocity_acceleration;
            f.velocity.write(ctx, |read| Pass::Splat {
                target: read,
                point: sample.current,
                color: force.extend(0.0),
                radius: params.splat_radius,
                aspect,
            })?;

            let color = params.fluid_color.resolve(sample.velocity);
            f.density.write(ctx, |read| Pass::Splat {
                target: read,
                point: sample.current,
                color,
                radius: params.splat_radius,
                aspect,
            })?;
        }

        let velocity = f.velocity.read();
        f.curl.write(ctx, Pass::Curl { velocity })?;

        let curl = f.curl.read();
        f.velocity.write(ctx, |read| Pass::Vorticity {
            velocity: read,
            curl,
            strength: params.curl_strength,
            dt,
        })?;

        let velocity = f.velocity.read();
        f.divergence.write(ctx, Pass::Divergence { velocity })?;

        f.pressure.write(ctx, |read| Pass::Clear {
            source: read,
            value: params.pressure_dissipation,
        })?;

        let divergence = f.divergence.read();
        for _ in 0..params.pressure_iterations.max(1) {
            f.pressure.write(ctx, |read| Pass::Pressure {
                pressure: read,
                divergence,
            })?;
        }

        let pressure = f.pressure.read();
        f.velocity.write(ctx, |read| Pass::GradientSubtract {
            pressure,
            velocity: read,
        })?;

        Ok(())
    }

    /// Reallocates every field for `viewport`; simulation content is lost.
    ///
    /// On failure the previous fields stay in place.
    pub fn resize<C>(&mut self, ctx: &mut C, viewport: Viewport) -> Result<(), FluidError>
    where
        C: RenderContext<Field = F>,
    {
        if viewport.is_empty() {
            return Err(FluidError::EmptyViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let grid = self.config.grid_size(viewport);
        let fresh = FluidFields::allocate(ctx, grid.0, grid.1)?;
        let stale = std::mem::replace(&mut self.fields, fresh);
        stale.release(ctx);

        log::info!(
            "fluid pipeline resized: viewport {}x{}, grid {}x{}",
            viewport.width,
            viewport.height,
            grid.0,
            grid.1
        );
        self.viewport = viewport;
        self.grid = grid;
        Ok(())
    }

    /// Hands every field back to the context.
    pub fn destroy<C>(self, ctx: &mut C)
    where
        C: RenderContext<Field = F>,
    {
        self.fields.release(ctx);
        log::info!("fluid pipeline destroyed after {} frames", self.frame);
    }

    pub fn set_params(&mut self, update: FluidParamsUpdate) {
        self.params.set(update);
    }

    pub fn set_params_json(&mut self, json: &str) -> Result<(), FluidError> {
        self.params.set_json(json)
    }

    /// Replaces internal pointer tracking with `sample` until cleared with
    /// `None`.
    pub fn supply_pointer_sample(&mut self, sample: Option<PointerSample>) {
        self.params.supply_pointer_sample(sample);
    }

    pub fn params(&self) -> &FluidParams {
        self.params.get()
    }

    /// The density field's current `read` buffer.
    pub fn output(&self) -> &F {
        self.fields.density.read()
    }

    pub fn velocity(&self) -> &PingPong<F> {
        &self.fields.velocity
    }

    pub fn velocity_mut(&mut self) -> &mut PingPong<F> {
        &mut self.fields.velocity
    }

    pub fn density(&self) -> &PingPong<F> {
        &self.fields.density
    }

    pub fn density_mut(&mut self) -> &mut PingPong<F> {
        &mut self.fields.density
    }

    pub fn pressure(&self) -> &PingPong<F> {
        &self.fields.pressure
    }

    pub fn curl(&self) -> &FieldBuffer<F> {
        &self.fields.curl
    }

    pub fn divergence(&self) -> &FieldBuffer<F> {
        &self.fields.divergence
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn grid_size(&self) -> (u32, u32) {
        self.grid
    }

    /// Time step used by the most recent update.
    pub fn last_dt(&self) -> f32 {
        self.last_dt
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}
