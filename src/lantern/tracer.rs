use std::iter;

use log::debug;
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, Color, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, Device, FragmentState, LoadOp, Maintain, MultisampleState,
    Operations, PipelineLayoutDescriptor, PrimitiveState, Queue, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor,
    ShaderSource, ShaderStages, Surface, SurfaceConfiguration, SurfaceError, TextureSampleType,
    TextureViewDescriptor, TextureViewDimension, VertexState,
};
use winit::dpi::PhysicalSize;

use crate::lantern::params::{CameraParams, RayTracingParams};
use crate::lantern::scheduler::FrameTarget;
use crate::lantern::serialize::{uniform_bytes, uniform_size, GpuSerializable};
use crate::lantern::texture::{RenderTarget, TARGET_FORMAT};

const TRACER_WGSL: &str = include_str!("tracer.wgsl");

// uniform blocks are padded to 16 bytes; the seed is a single u32
const SEED_BLOCK_SIZE: u64 = 16;

pub struct GpuTracer {
    surface: Surface,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,

    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    bind_group: Option<BindGroup>,

    geometry_buffer: Option<Buffer>,
    ray_tracing_buffer: Buffer,
    camera_buffer: Buffer,
    seed_buffer: Buffer,

    frame: Option<RenderTarget>,
    accumulation: Option<RenderTarget>,
}

impl GpuTracer {
    pub fn new(
        surface: Surface,
        device: Device,
        queue: Queue,
        config: SurfaceConfiguration,
    ) -> Self {
        surface.configure(&device, &config);

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Lantern Tracer"),
            source: ShaderSource::Wgsl(TRACER_WGSL.into()),
        });

        let uniform_entry = |binding: u32| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Lantern Bind Group Layout"),
            entries: &[
                // geometry
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                uniform_entry(1), // ray tracing params
                uniform_entry(2), // camera params
                uniform_entry(3), // seed
                // accumulation
                BindGroupLayoutEntry {
                    binding: 4,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Lantern Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Lantern Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "fs_main",
                // presented image and the copy source for accumulation
                targets: &[
                    Some(ColorTargetState {
                        format: config.format,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    }),
                    Some(ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    }),
                ],
            }),
            multiview: None,
        });

        let uniform_buffer = |label: &str, size: u64| {
            device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let ray_tracing_buffer = uniform_buffer(
            "Lantern Ray Tracing Params",
            uniform_size(RayTracingParams::default().encoded_size()),
        );
        let camera_buffer = uniform_buffer(
            "Lantern Camera Params",
            uniform_size(CameraParams::default().encoded_size()),
        );
        let seed_buffer = uniform_buffer("Lantern Seed", SEED_BLOCK_SIZE);

        Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            bind_group_layout,
            bind_group: None,
            geometry_buffer: None,
            ray_tracing_buffer,
            camera_buffer,
            seed_buffer,
            frame: None,
            accumulation: None,
        }
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    fn rebuild_bind_group(&mut self) {
        let (Some(geometry), Some(accumulation)) = (&self.geometry_buffer, &self.accumulation)
        else {
            return;
        };

        self.bind_group = Some(self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Lantern Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: geometry.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: self.ray_tracing_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: self.seed_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 4,
                    resource: BindingResource::TextureView(&accumulation.view),
                },
            ],
        }));
    }
}

impl FrameTarget for GpuTracer {
    type Error = SurfaceError;

    fn surface_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    fn allocate_accumulation(&mut self, size: PhysicalSize<u32>) {
        match (&mut self.frame, &mut self.accumulation) {
            (Some(frame), Some(accumulation)) => {
                frame.resize(&self.device, size);
                accumulation.resize(&self.device, size);
            }
            _ => {
                self.frame = Some(RenderTarget::frame(&self.device, size));
                self.accumulation = Some(RenderTarget::accumulation(&self.device, size));
            }
        }
        self.rebuild_bind_group();
    }

    fn upload_geometry(&mut self, encoded: &[u8]) {
        match &self.geometry_buffer {
            Some(buffer) if buffer.size() == encoded.len() as u64 => {
                self.queue.write_buffer(buffer, 0, encoded);
            }
            _ => {
                debug!("creating geometry buffer of {} bytes", encoded.len());
                self.geometry_buffer = Some(self.device.create_buffer_init(&BufferInitDescriptor {
                    label: Some("Lantern Geometry"),
                    contents: encoded,
                    usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
                }));
                self.rebuild_bind_group();
            }
        }
    }

    fn upload_params(&mut self, ray_tracing: &RayTracingParams, camera: &CameraParams) {
        self.queue
            .write_buffer(&self.ray_tracing_buffer, 0, &uniform_bytes(ray_tracing));
        self.queue
            .write_buffer(&self.camera_buffer, 0, &uniform_bytes(camera));
    }

    fn upload_seed(&mut self, seed: u32) {
        self.queue
            .write_buffer(&self.seed_buffer, 0, bytemuck::bytes_of(&seed));
    }

    fn submit_frame(&mut self) -> Result<(), SurfaceError> {
        let (Some(bind_group), Some(frame), Some(accumulation)) =
            (&self.bind_group, &self.frame, &self.accumulation)
        else {
            panic!("frame submitted before geometry and accumulation target were uploaded");
        };

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Lantern Frame Encoder"),
        });

        {
            let color = Operations {
                load: LoadOp::Clear(Color::BLACK),
                store: true,
            };
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Lantern Trace Pass"),
                color_attachments: &[
                    Some(RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: color,
                    }),
                    Some(RenderPassColorAttachment {
                        view: &frame.view,
                        resolve_target: None,
                        ops: color,
                    }),
                ],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            // one oversized triangle covers the screen
            render_pass.draw(0..3, 0..1);
        }

        encoder.copy_texture_to_texture(
            frame.gpu_texture.as_image_copy(),
            accumulation.gpu_texture.as_image_copy(),
            frame.gpu_texture.size(),
        );

        let submission = self.queue.submit(iter::once(encoder.finish()));
        // at most one frame in flight; buffers are rewritten only after this returns
        self.device.poll(Maintain::WaitForSubmissionIndex(submission));
        output.present();

        Ok(())
    }
}
