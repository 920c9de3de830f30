//! wgpu compute backend.
//!
//! Every field is an `Rgba32Float` texture; every pass is one dispatch of the
//! matching entry point in `shaders/fluid.wgsl`, submitted on its own so the
//! next pass sees its result.

use crate::FluidError;
use crate::context::{FieldDescriptor, RenderContext};
use crate::pass::{Pass, PassKind};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use std::collections::HashMap;
use std::num::NonZeroU64;
use tokio::sync::oneshot;
use wgpu::{BindGroupLayout, Buffer, ComputePipeline, Device, Queue, Texture, TextureView};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const BYTES_PER_TEXEL: u32 = 16;
const WORKGROUP_SIZE: u32 = 8;

const PASS_KINDS: [PassKind; 8] = [
    PassKind::Advect,
    PassKind::Splat,
    PassKind::Curl,
    PassKind::Vorticity,
    PassKind::Divergence,
    PassKind::Clear,
    PassKind::Pressure,
    PassKind::GradientSubtract,
];

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
struct PassUniforms {
    point: [f32; 2],
    texel_size: [f32; 2],
    color: [f32; 4],
    dt: f32,
    dissipation: f32,
    radius: f32,
    aspect: f32,
    strength: f32,
    value: f32,
    size: [u32; 2],
}

impl PassUniforms {
    fn for_pass(pass: &Pass<'_, GpuField>, target: &GpuField) -> Self {
        let mut uniforms = Self {
            texel_size: [1.0 / target.width as f32, 1.0 / target.height as f32],
            size: [target.width, target.height],
            ..Default::default()
        };
        match *pass {
            Pass::Advect {
                dt, dissipation, ..
            } => {
                uniforms.dt = dt;
                uniforms.dissipation = dissipation;
            }
            Pass::Splat {
                point,
                color,
                radius,
                aspect,
                ..
            } => {
                uniforms.point = point.to_array();
                uniforms.color = color.extend(0.0).to_array();
                uniforms.radius = radius;
                uniforms.aspect = aspect;
            }
            Pass::Vorticity { strength, dt, .. } => {
                uniforms.strength = strength;
                uniforms.dt = dt;
            }
            Pass::Clear { value, .. } => uniforms.value = value,
            Pass::Curl { .. }
            | Pass::Divergence { .. }
            | Pass::Pressure { .. }
            | Pass::GradientSubtract { .. } => {}
        }
        uniforms
    }
}

#[derive(Debug)]
pub struct GpuField {
    id: u64,
    width: u32,
    height: u32,
    texture: Texture,
    view: TextureView,
}

impl GpuField {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }
}

pub struct GpuContext {
    device: Device,
    queue: Queue,
    layout: BindGroupLayout,
    pipelines: HashMap<PassKind, ComputePipeline>,
    uniforms: Buffer,
    /// Bound to `input_b` by single-input passes.
    placeholder: GpuField,
    next_id: u64,
    live_fields: usize,
}

impl GpuContext {
    pub async fn new() -> Result<Self, FluidError> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(FluidError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("inkflow device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await?;

        log::info!("using GPU adapter {:?}", adapter.get_info().name);
        Ok(Self::from_device(device, queue))
    }

    /// Builds the pass pipelines on a device the host already owns.
    pub fn from_device(device: Device, queue: Queue) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fluid passes"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fluid.wgsl").into()),
        });

        let input_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fluid pass layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<PassUniforms>() as u64
                        ),
                    },
                    count: None,
                },
                input_entry(1),
                input_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fluid pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipelines = PASS_KINDS
            .iter()
            .map(|&kind| {
                let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(kind.label()),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point: kind.label(),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                });
                (kind, pipeline)
            })
            .collect();

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pass uniforms"),
            size: std::mem::size_of::<PassUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let placeholder = allocate(&device, 0, "placeholder", 1, 1);

        Self {
            device,
            queue,
            layout,
            pipelines,
            uniforms,
            placeholder,
            next_id: 0,
            live_fields: 0,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn live_fields(&self) -> usize {
        self.live_fields
    }

    /// Copies `field` back to host memory, row-major from the bottom row.
    pub async fn read_field(&self, field: &GpuField) -> Result<Vec<Vec4>, FluidError> {
        let unpadded = field.width * BYTES_PER_TEXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let read_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field readback"),
            size: padded as u64 * field.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("field readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &field.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &read_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(field.height),
                },
            },
            extent(field.width, field.height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = read_buffer.slice(..);
        let (sender, receiver) = oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver.await.map_err(|_| FluidError::ReadbackCancelled)??;

        let texels = {
            let data = slice.get_mapped_range();
            data.chunks_exact(padded as usize)
                .flat_map(|row| {
                    let floats: &[f32] = bytemuck::cast_slice(&row[..unpadded as usize]);
                    floats
                        .chunks_exact(4)
                        .map(Vec4::from_slice)
                        .collect::<Vec<_>>()
                })
                .collect()
        };
        read_buffer.unmap();
        Ok(texels)
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn allocate(device: &Device, id: u64, label: &str, width: u32, height: u32) -> GpuField {
    // wgpu zero-initializes new textures.
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    GpuField {
        id,
        width,
        height,
        texture,
        view,
    }
}

impl RenderContext for GpuContext {
    type Field = GpuField;

    fn create_field(&mut self, desc: &FieldDescriptor) -> Result<GpuField, FluidError> {
        let max = self.device.limits().max_texture_dimension_2d;
        let reason = if desc.width == 0 || desc.height == 0 {
            Some("field has no area".to_string())
        } else if desc.width > max || desc.height > max {
            Some(format!("exceeds device texture limit {}", max))
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
            "allocated {} texture #{} at {}x{}",
            desc.label,
            self.next_id,
            desc.width,
            desc.height
        );
        Ok(allocate(
            &self.device,
            self.next_id,
            desc.label,
            desc.width,
            desc.height,
        ))
    }

    fn run_pass(
        &mut self,
        pass: &Pass<'_, GpuField>,
        target: &mut GpuField,
    ) -> Result<(), FluidError> {
        let kind = pass.kind();
        let inputs = pass.inputs();
        let input_a = inputs.first().copied().unwrap_or(&self.placeholder);
        let input_b = inputs.get(1).copied().unwrap_or(&self.placeholder);

        let uniforms = PassUniforms::for_pass(pass, target);
        self.queue
            .write_buffer(&self.uniforms, 0, bytemuck::cast_slice(&[uniforms]));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kind.label()),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&input_a.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&input_b.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&target.view),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(kind.label()),
        });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kind.label()),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipelines[&kind]);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(
                target.width.div_ceil(WORKGROUP_SIZE),
                target.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        log::trace!("{} pass into texture #{}", kind.label(), target.id);
        Ok(())
    }

    fn upload(&mut self, field: &mut GpuField, texels: &[Vec4]) -> Result<(), FluidError> {
        let expected = field.width as usize * field.height as usize;
        if texels.len() != expected {
            return Err(FluidError::TexelCount {
                width: field.width,
                height: field.height,
                expected,
                actual: texels.len(),
            });
        }

        let data: Vec<f32> = texels.iter().flat_map(|t| t.to_array()).collect();
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &field.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&data),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(field.width * BYTES_PER_TEXEL),
                rows_per_image: Some(field.height),
            },
            extent(field.width, field.height),
        );
        Ok(())
    }

    fn release_field(&mut self, field: GpuField) {
        self.live_fields = self.live_fields.saturating_sub(1);
        log::debug!("released texture #{}", field.id);
        field.texture.destroy();
    }
}
