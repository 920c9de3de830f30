//! Pointer-driven stable-fluids simulation for inkflow.
//!
//! The solver is a fixed sequence of full-grid passes over double-buffered
//! fields. Passes are plain descriptions ([`Pass`]) evaluated by a
//! [`RenderContext`]: the CPU reference evaluator in [`cpu`], or wgpu compute
//! shaders in [`gpu`] with the `gpu` feature.

pub mod analysis;
pub mod config;
pub mod context;
pub mod cpu;
pub mod desktop;
pub mod error;
pub mod export;
pub mod field;
pub mod kernels;
pub mod params;
pub mod pass;
pub mod pipeline;
pub mod pointer;
pub mod render;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use analysis::{AnalysisRecorder, FluidMetrics};
pub use config::{FluidConfig, Viewport};
pub use context::{FieldDescriptor, RenderContext};
pub use cpu::{CpuContext, CpuField};
pub use desktop::DesktopApp;
pub use error::FluidError;
pub use export::ImageExporter;
pub use field::{FieldBuffer, PingPong};
pub use params::{FluidColor, FluidParams, FluidParamsUpdate, ParamStore};
pub use pass::{Pass, PassKind};
pub use pipeline::{FluidPipeline, FrameClock, FrameInput};
pub use pointer::{PointerSample, PointerTracker};
pub use render::Renderer;

#[cfg(feature = "gpu")]
pub use gpu::{GpuContext, GpuField};

/// The pipeline as driven by the CPU reference evaluator.
pub type CpuPipeline = FluidPipeline<CpuField>;
