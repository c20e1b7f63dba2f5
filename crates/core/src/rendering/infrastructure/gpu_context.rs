use std::sync::Arc;
use wgpu::{self};

use crate::rendering::domain::render_backend::RenderError;

/// Compute entry points in `shaders/blur_passes.wgsl`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kernel {
    Blit,
    BoxBlur,
    GaussianBlur,
    KawaseDown,
    KawaseUp,
    Bokeh,
    Blend,
}

impl Kernel {
    pub const ALL: [Kernel; 7] = [
        Kernel::Blit,
        Kernel::BoxBlur,
        Kernel::GaussianBlur,
        Kernel::KawaseDown,
        Kernel::KawaseUp,
        Kernel::Bokeh,
        Kernel::Blend,
    ];

    pub fn entry_point(self) -> &'static str {
        match self {
            Kernel::Blit => "blit",
            Kernel::BoxBlur => "box_blur",
            Kernel::GaussianBlur => "gaussian_blur",
            Kernel::KawaseDown => "kawase_down",
            Kernel::KawaseUp => "kawase_up",
            Kernel::Bokeh => "bokeh",
            Kernel::Blend => "blend",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Shared GPU context for the render backend.
///
/// Holds the wgpu device, queue, bind group layout and one compute pipeline
/// per kernel so they can be reused across frames without re-initialization.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipelines: Vec<wgpu::ComputePipeline>,
}

/// Packed params matching the WGSL uniform layout (112 bytes, 28 x 4).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuPassParams {
    pub src_width: u32,
    pub src_height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    pub src_x: i32,
    pub src_y: i32,
    pub src_w: i32,
    pub src_h: i32,
    pub view_x: i32,
    pub view_y: i32,
    pub view_w: i32,
    pub view_h: i32,
    pub clip_x: i32,
    pub clip_y: i32,
    pub clip_w: i32,
    pub clip_h: i32,
    pub aux_width: u32,
    pub aux_height: u32,
    pub direction: u32,
    pub samples: u32,
    pub offset: f32,
    pub m00: f32,
    pub m01: f32,
    pub m10: f32,
    pub m11: f32,
    pub radius: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

/// Storage buffers bound to one dispatch.
pub struct DispatchBuffers<'a> {
    pub src: &'a wgpu::Buffer,
    pub dst: &'a wgpu::Buffer,
    pub aux: &'a wgpu::Buffer,
}

const WORKGROUP_EDGE: u32 = 8;

impl GpuContext {
    /// Create a new GPU context. Returns `None` if no suitable adapter is available.
    pub fn new() -> Option<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("backdrop-blur-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .ok()?;

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blur-passes-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blur_passes.wgsl").into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass-bind-group-layout"),
            entries: &[
                // params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // sampled surface
                storage(1, true),
                // bound target
                storage(2, false),
                // second input (blend backdrop)
                storage(3, true),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipelines = Kernel::ALL
            .iter()
            .map(|kernel| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(kernel.entry_point()),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point: Some(kernel.entry_point()),
                    compilation_options: Default::default(),
                    cache: None,
                })
            })
            .collect();

        Some(Self {
            device,
            queue,
            bind_group_layout,
            pipelines,
        })
    }

    /// Storage buffer large enough for `width x height` packed pixels.
    /// wgpu zero-initializes new buffers.
    pub fn create_surface_buffer(&self, width: u32, height: u32) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("surface"),
            size: surface_bytes(width, height),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Copies a buffer so it can be sampled while the original is written.
    pub fn duplicate(&self, buffer: &wgpu::Buffer) -> wgpu::Buffer {
        let copy = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sample-copy"),
            size: buffer.size(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("enc-copy"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &copy, 0, buffer.size());
        self.queue.submit(Some(encoder.finish()));
        copy
    }

    /// Runs one kernel over the clip rectangle in `params`.
    pub fn dispatch(&self, kernel: Kernel, params: &GpuPassParams, buffers: DispatchBuffers<'_>) {
        let params_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("params"),
            size: std::mem::size_of::<GpuPassParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&params_buf, 0, bytemuck::bytes_of(params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.entry_point()),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.src.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.dst.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.aux.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel.entry_point()),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines[kernel.index()]);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                (params.clip_w as u32).div_ceil(WORKGROUP_EDGE),
                (params.clip_h as u32).div_ceil(WORKGROUP_EDGE),
                1,
            );
        }
        self.queue.submit(Some(encoder.finish()));
    }

    /// Blocks until `buffer` is copied back to host memory.
    pub fn read_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>, RenderError> {
        let staging_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: buffer.size(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("enc-readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging_buf, 0, buffer.size());
        self.queue.submit(Some(encoder.finish()));

        let (tx, rx) = std::sync::mpsc::channel();
        let slice = staging_buf.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| RenderError::ReadbackIncomplete)?
            .map_err(RenderError::BufferMap)?;

        let mapped = slice.get_mapped_range();
        let result = mapped.to_vec();
        drop(mapped);
        staging_buf.unmap();
        Ok(result)
    }
}

pub fn surface_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * 4
}
