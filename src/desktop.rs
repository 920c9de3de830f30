use crate::config::{FluidConfig, Viewport};
use crate::cpu::CpuContext;
use crate::params::{FluidColor, FluidParamsUpdate};
use crate::pipeline::FrameInput;
use crate::render::Renderer;
use crate::{CpuPipeline, FluidError};
use eframe::egui;
use glam::{Vec2, Vec3};
use std::time::Instant;

/// Grid cells per viewport pixel for the interactive window; the CPU
/// evaluator is too slow at full resolution.
pub const DESKTOP_RESOLUTION_SCALE: f32 = 0.25;

/// Interactive window: the pointer stirs the fluid as it moves over the canvas.
pub struct DesktopApp {
    ctx: CpuContext,
    pipeline: CpuPipeline,
    config: FluidConfig,
    started: Instant,
    pointer: Vec2,
    texture: Option<egui::TextureHandle>,
    paused: bool,
    rainbow: bool,
    last_error: Option<String>,
}

impl DesktopApp {
    /// `config` with the resolution scale lowered for interactive use.
    pub fn default_config(config: FluidConfig) -> FluidConfig {
        FluidConfig {
            resolution_scale: DESKTOP_RESOLUTION_SCALE,
            ..config
        }
    }

    pub fn new(config: FluidConfig, viewport: Viewport) -> Result<Self, FluidError> {
        let mut ctx = CpuContext::new();
        let pipeline = CpuPipeline::new(&mut ctx, config.clone(), viewport)?;

        Ok(Self {
            ctx,
            pipeline,
            config,
            started: Instant::now(),
            pointer: Vec2::ZERO,
            texture: None,
            paused: false,
            rainbow: false,
            last_error: None,
        })
    }

    fn rebuild(&mut self) {
        let viewport = self.pipeline.viewport();
        match CpuPipeline::new(&mut self.ctx, self.config.clone(), viewport) {
            Ok(mut pipeline) => {
                // Carry the live parameters over to the new grid.
                pipeline.set_params(FluidParamsUpdate::from(self.pipeline.params()));
                let stale = std::mem::replace(&mut self.pipeline, pipeline);
                stale.destroy(&mut self.ctx);
            }
            Err(err) => {
                log::error!("failed to rebuild fluid pipeline: {err}");
                self.last_error = Some(err.to_string());
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let mut params = self.pipeline.params().clone();
        let mut update = FluidParamsUpdate::default();

        ui.horizontal(|ui| {
            if ui.button("Pause/Resume").clicked() {
                self.paused = !self.paused;
            }

            if ui.button("Random Color").clicked() {
                self.rainbow = false;
                update.fluid_color = Some(random_color());
            }

            if ui.checkbox(&mut self.rainbow, "Rainbow").changed() {
                update.fluid_color = Some(if self.rainbow {
                    rainbow_color()
                } else {
                    FluidColor::default()
                });
            }

            let resolution = egui::Slider::new(&mut self.config.resolution_scale, 0.1..=1.0)
                .text("Resolution");
            if ui.add(resolution).drag_stopped() {
                self.rebuild();
            }

            let (w, h) = self.pipeline.grid_size();
            ui.label(format!("{}x{} cells", w, h));
        });

        ui.horizontal(|ui| {
            if ui
                .add(egui::Slider::new(&mut params.density_dissipation, 0.9..=1.0).text("Dye Fade"))
                .changed()
            {
                update.density_dissipation = Some(params.density_dissipation);
            }
            let velocity_fade = egui::Slider::new(&mut params.velocity_dissipation, 0.9..=1.0)
                .text("Velocity Fade");
            if ui.add(velocity_fade).changed() {
                update.velocity_dissipation = Some(params.velocity_dissipation);
            }
            if ui
                .add(egui::Slider::new(&mut params.curl_strength, 0.0..=100.0).text("Curl"))
                .changed()
            {
                update.curl_strength = Some(params.curl_strength);
            }
            if ui
                .add(egui::Slider::new(&mut params.pressure_iterations, 1..=60).text("Iterations"))
                .changed()
            {
                update.pressure_iterations = Some(params.pressure_iterations);
            }
            if ui
                .add(
                    egui::Slider::new(&mut params.splat_radius, 0.0005..=0.02)
                        .logarithmic(true)
                        .text("Radius"),
                )
                .changed()
            {
                update.splat_radius = Some(params.splat_radius);
            }
        });

        self.pipeline.set_params(update);
    }
}

fn random_color() -> FluidColor {
    FluidColor::from(Vec3::new(rand::random(), rand::random(), rand::random()))
}

/// Dye hue follows the pointer's direction of travel.
fn rainbow_color() -> FluidColor {
    FluidColor::dynamic(|velocity| {
        let angle = velocity.y.atan2(velocity.x);
        let phase = |offset: f32| 0.5 + 0.5 * (angle + offset).cos();
        Vec3::new(phase(0.0), phase(2.094), phase(4.189))
    })
}

/// Canvas position to normalized device coordinates, y up.
fn to_ndc(pos: egui::Pos2, rect: egui::Rect) -> Vec2 {
    let x = (pos.x - rect.left()) / rect.width() * 2.0 - 1.0;
    let y = 1.0 - (pos.y - rect.top()) / rect.height() * 2.0;
    Vec2::new(x, y)
}

impl eframe::App for DesktopApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("inkflow");
            self.controls(ui);

            if let Some(err) = &self.last_error {
                ui.colored_label(egui::Color32::RED, err.as_str());
            }

            ui.separator();

            let (rect, response) =
                ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
            if let Some(pos) = response.hover_pos() {
                self.pointer = to_ndc(pos, rect);
            }

            let pixels = rect.size() * ctx.pixels_per_point();
            let viewport = Viewport::new(pixels.x.round() as u32, pixels.y.round() as u32);

            if !self.paused {
                let input = FrameInput {
                    elapsed_time: self.started.elapsed().as_secs_f32(),
                    viewport,
                    pointer: self.pointer,
                };
                if let Err(err) = self.pipeline.update(&mut self.ctx, &input) {
                    log::error!("fluid update failed: {err}");
                    self.last_error = Some(err.to_string());
                }
            }

            let density = self.pipeline.output();
            let image = Renderer::new(density.width(), density.height()).render_density(density);
            let color_image = egui::ColorImage::from_rgb(
                [image.width() as usize, image.height() as usize],
                image.as_raw(),
            );

            if let Some(texture) = &mut self.texture {
                texture.set(color_image, egui::TextureOptions::LINEAR);
            } else {
                self.texture =
                    Some(ctx.load_texture("density", color_image, egui::TextureOptions::LINEAR));
            }

            if let Some(texture) = &self.texture {
                ui.painter().image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
        });

        ctx.request_repaint();
    }
}
