use inkflow::{
    AnalysisRecorder, CpuContext, CpuPipeline, DesktopApp, FluidConfig, FluidParamsUpdate,
    FrameInput, ImageExporter, Viewport,
};
use std::path::{Path, PathBuf};

struct Options {
    headless: bool,
    frames: u32,
    viewport: Viewport,
    output_dir: PathBuf,
    params: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            headless: false,
            frames: 120,
            viewport: Viewport::new(256, 256),
            output_dir: PathBuf::from("."),
            params: None,
        }
    }
}

fn parse_args(args: &[String]) -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "headless" => options.headless = true,
            "--frames" => {
                options.frames = iter.next().ok_or("--frames needs a value")?.parse()?;
            }
            "--size" => {
                let value = iter.next().ok_or("--size needs WIDTHxHEIGHT")?;
                let (w, h) = value.split_once('x').ok_or("--size needs WIDTHxHEIGHT")?;
                options.viewport = Viewport::new(w.parse()?, h.parse()?);
            }
            "--out" => {
                options.output_dir = PathBuf::from(iter.next().ok_or("--out needs a directory")?);
            }
            "--params" => {
                options.params = Some(PathBuf::from(iter.next().ok_or("--params needs a file")?));
            }
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }

    Ok(options)
}

fn load_config(options: &Options) -> Result<FluidConfig, Box<dyn std::error::Error>> {
    let mut config = FluidConfig::default();
    if let Some(path) = &options.params {
        let json = std::fs::read_to_string(path)?;
        let update = FluidParamsUpdate::from_json(&json)?;
        let mut store = inkflow::ParamStore::new(config.params.clone());
        store.set(update);
        config.params = store.get().clone();
        log::info!("loaded parameters from {}", path.display());
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;
    let config = load_config(&options)?;

    if options.headless {
        run_headless(&options, config)?;
    } else {
        run_gui_app(config)?;
    }

    Ok(())
}

/// Drives the pointer around a circle and writes density/velocity PNGs.
fn run_headless(options: &Options, config: FluidConfig) -> Result<(), Box<dyn std::error::Error>> {
    log::info!(
        "running headless: {} frames at {}x{}",
        options.frames,
        options.viewport.width,
        options.viewport.height
    );

    let mut ctx = CpuContext::new();
    let mut pipeline = CpuPipeline::new(&mut ctx, config, options.viewport)?;
    let exporter = ImageExporter::new(options.viewport.width, options.viewport.height);
    let mut recorder = AnalysisRecorder::new();
    std::fs::create_dir_all(&options.output_dir)?;

    for frame in 0..options.frames {
        let elapsed = frame as f32 / 60.0;
        let angle = elapsed * std::f32::consts::TAU * 0.5;
        let input = FrameInput {
            elapsed_time: elapsed,
            viewport: options.viewport,
            pointer: glam::Vec2::new(angle.cos(), angle.sin()) * 0.5,
        };
        pipeline.update(&mut ctx, &input)?;

        recorder.record_frame(
            pipeline.velocity().read(),
            pipeline.density().read(),
            pipeline.frame_count(),
        );

        if frame % 10 == 0 {
            if let Some(metrics) = recorder.latest() {
                metrics.log_summary();
            }
            export_frame(&exporter, &pipeline, &options.output_dir, frame)?;
        }
    }

    export_frame(&exporter, &pipeline, &options.output_dir, options.frames)?;
    recorder.log_trends();
    pipeline.destroy(&mut ctx);

    log::info!("headless run complete, images in {}", options.output_dir.display());
    Ok(())
}

fn export_frame(
    exporter: &ImageExporter,
    pipeline: &CpuPipeline,
    dir: &Path,
    frame: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    exporter.export_density_png(pipeline.output(), &dir.join(format!("density_{:04}.png", frame)))?;
    exporter.export_velocity_png(
        pipeline.velocity().read(),
        &dir.join(format!("velocity_{:04}.png", frame)),
    )?;
    Ok(())
}

fn run_gui_app(config: FluidConfig) -> Result<(), Box<dyn std::error::Error>> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 800.0])
            .with_title("inkflow"),
        ..Default::default()
    };

    let app = DesktopApp::new(DesktopApp::default_config(config), Viewport::new(800, 700))?;
    eframe::run_native("inkflow", options, Box::new(|_cc| Box::new(app)))?;
    Ok(())
}
