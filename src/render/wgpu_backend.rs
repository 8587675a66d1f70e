// SPDX-License-Identifier: GPL-3.0-only

//! Production GPU backend on wgpu
//!
//! Owns the wgpu device and queue and implements the [`Gpu`] seam with
//! offscreen RGBA8 targets. Draws are recorded as the compositor issues them
//! and encoded into one render pass per present. Error detection is gated by
//! the strict flag: in strict mode every operation runs inside a validation
//! error scope and failures surface as `GraphicsError`; otherwise validation
//! is skipped entirely for frame-rate.

use crate::errors::{GraphicsError, ShaderCompileError};
use crate::render::compositor::geometry;
use crate::render::gpu::{Gpu, ProgramBindings, ProgramId, TargetId, TextureId, UniformLocation};
use crate::render::matrix::Mat4;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Per-layer uniform data, laid out to match `LayerUniforms` in the shader
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LayerUniforms {
    mvp_matrix: Mat4,
    texture_transform: Mat4,
}

struct TextureEntry {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

struct TargetEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct ProgramEntry {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// One recorded layer draw, encoded at present time
struct DrawCall {
    texture: u64,
    uniforms: LayerUniforms,
    viewport: (u32, u32),
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    strict: bool,
    next_id: u64,
    textures: HashMap<u64, TextureEntry>,
    targets: HashMap<u64, TargetEntry>,
    program: Option<ProgramEntry>,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    tex_coord_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffers: Vec<wgpu::Buffer>,
    // Immediate-mode state mirrored from the trait calls
    current_target: Option<u64>,
    viewport: (u32, u32),
    current_mvp: Mat4,
    current_transform: Mat4,
    bound_texture: Option<u64>,
    pending_draws: Vec<DrawCall>,
}

impl WgpuBackend {
    /// Create the device and queue.
    ///
    /// `strict` enables per-operation validation; tests and debugging turn
    /// it on, normal runs leave it off.
    pub fn new(strict: bool) -> Result<Self, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| GraphicsError::new("request adapter", e.to_string()))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            strict,
            "GPU adapter selected"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("watermark-camera"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| GraphicsError::new("request device", e.to_string()))?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("layer sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad positions"),
            contents: bytemuck::cast_slice(&geometry::VERTEX_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tex_coord_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad tex coords"),
            contents: bytemuck::cast_slice(&geometry::TEX_COORDINATES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad indices"),
            contents: bytemuck::cast_slice(&geometry::DRAW_ORDER),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(Self {
            device,
            queue,
            strict,
            next_id: 1,
            textures: HashMap::new(),
            targets: HashMap::new(),
            program: None,
            sampler,
            vertex_buffer,
            tex_coord_buffer,
            index_buffer,
            uniform_buffers: Vec::new(),
            current_target: None,
            viewport: (0, 0),
            current_mvp: Mat4::IDENTITY,
            current_transform: Mat4::IDENTITY,
            bound_texture: None,
            pending_draws: Vec::new(),
        })
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push_scope(&self) {
        if self.strict {
            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        }
    }

    fn pop_scope(&self, operation: &'static str) -> Result<(), GraphicsError> {
        if !self.strict {
            return Ok(());
        }
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(GraphicsError::new(operation, error.to_string())),
            None => Ok(()),
        }
    }

    fn ensure_uniform_buffer(&mut self, index: usize) {
        while self.uniform_buffers.len() <= index {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("layer uniforms"),
                size: std::mem::size_of::<LayerUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.uniform_buffers.push(buffer);
        }
    }
}

impl Gpu for WgpuBackend {
    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramBindings, ShaderCompileError> {
        // The two stage assets form one WGSL module
        let source = format!("{}\n{}", vertex_src, fragment_src);

        // Always validate compilation, even outside strict mode; a broken
        // shader is unrecoverable at draw time
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("composite shader"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderCompileError {
                stage: "compile",
                log: error.to_string(),
            });
        }

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("layer bind group layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("composite pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("composite pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: 8,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &[wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 0,
                                shader_location: 0,
                            }],
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: 8,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &[wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 0,
                                shader_location: 1,
                            }],
                        },
                    ],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        // Premultiplied alpha: ONE, ONE_MINUS_SRC_ALPHA
                        blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderCompileError {
                stage: "link",
                log: error.to_string(),
            });
        }

        self.program = Some(ProgramEntry {
            pipeline,
            bind_group_layout,
        });
        debug!("Composite program compiled");

        Ok(ProgramBindings {
            program: ProgramId(1),
            position: 0,
            tex_coordinate: 1,
            mvp_matrix: UniformLocation(0),
            texture_transform: UniformLocation(1),
            sampler_unit: UniformLocation(2),
        })
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GraphicsError> {
        self.push_scope();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("layer texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.pop_scope("create texture")?;

        let id = self.alloc_id();
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                width,
                height,
            },
        );
        Ok(TextureId(id))
    }

    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), GraphicsError> {
        match self.textures.remove(&texture.0) {
            Some(entry) => {
                entry.texture.destroy();
                Ok(())
            }
            None if self.strict => Err(GraphicsError::new(
                "destroy texture",
                format!("unknown texture {:?}", texture),
            )),
            None => Ok(()),
        }
    }

    fn accept_frame(
        &mut self,
        texture: TextureId,
        data: &[u8],
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<(), GraphicsError> {
        let Some(entry) = self.textures.get(&texture.0) else {
            if self.strict {
                return Err(GraphicsError::new(
                    "accept frame",
                    format!("unknown texture {:?}", texture),
                ));
            }
            return Ok(());
        };
        if entry.width != width || entry.height != height {
            if self.strict {
                return Err(GraphicsError::new(
                    "accept frame",
                    format!(
                        "frame {}x{} does not match texture {}x{}",
                        width, height, entry.width, entry.height
                    ),
                ));
            }
            warn!(width, height, "Dropping frame with mismatched dimensions");
            return Ok(());
        }

        self.push_scope();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(stride),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.pop_scope("accept frame")
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetId, GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::new(
                "create target",
                format!("invalid target size {}x{}", width, height),
            ));
        }
        self.push_scope();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        self.pop_scope("create target")?;

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.alloc_id();
        self.targets.insert(
            id,
            TargetEntry {
                texture,
                view,
                width,
                height,
            },
        );
        Ok(TargetId(id))
    }

    fn destroy_target(&mut self, target: TargetId) -> Result<(), GraphicsError> {
        if self.current_target == Some(target.0) {
            self.current_target = None;
            self.pending_draws.clear();
        }
        match self.targets.remove(&target.0) {
            Some(entry) => {
                entry.texture.destroy();
                Ok(())
            }
            None if self.strict => Err(GraphicsError::new(
                "destroy target",
                format!("unknown target {:?}", target),
            )),
            None => Ok(()),
        }
    }

    fn make_current(&mut self, target: TargetId) -> Result<(), GraphicsError> {
        if !self.targets.contains_key(&target.0) {
            if self.strict {
                return Err(GraphicsError::new(
                    "make current",
                    format!("unknown target {:?}", target),
                ));
            }
            return Ok(());
        }
        // Draws never span a target switch
        self.pending_draws.clear();
        self.current_target = Some(target.0);
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if self.strict && (width == 0 || height == 0) {
            return Err(GraphicsError::new(
                "set viewport",
                format!("invalid viewport {}x{}", width, height),
            ));
        }
        self.viewport = (width, height);
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), GraphicsError> {
        if self.strict && (self.program.is_none() || program != ProgramId(1)) {
            return Err(GraphicsError::new(
                "use program",
                format!("unknown program {:?}", program),
            ));
        }
        Ok(())
    }

    fn set_matrix(
        &mut self,
        location: UniformLocation,
        matrix: &Mat4,
    ) -> Result<(), GraphicsError> {
        match location.0 {
            0 => self.current_mvp = *matrix,
            1 => self.current_transform = *matrix,
            other if self.strict => {
                return Err(GraphicsError::new(
                    "set matrix",
                    format!("unknown uniform location {}", other),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    fn bind_texture(&mut self, _unit: u32, texture: TextureId) -> Result<(), GraphicsError> {
        if !self.textures.contains_key(&texture.0) {
            if self.strict {
                return Err(GraphicsError::new(
                    "bind texture",
                    format!("unknown texture {:?}", texture),
                ));
            }
            self.bound_texture = None;
            return Ok(());
        }
        self.bound_texture = Some(texture.0);
        Ok(())
    }

    fn draw_quad(&mut self) -> Result<(), GraphicsError> {
        let Some(texture) = self.bound_texture else {
            if self.strict {
                return Err(GraphicsError::new("draw quad", "no texture bound"));
            }
            return Ok(());
        };
        if self.strict && self.current_target.is_none() {
            return Err(GraphicsError::new("draw quad", "no target current"));
        }
        self.pending_draws.push(DrawCall {
            texture,
            uniforms: LayerUniforms {
                mvp_matrix: self.current_mvp,
                texture_transform: self.current_transform,
            },
            viewport: self.viewport,
        });
        Ok(())
    }

    fn present(&mut self, target: TargetId) -> Result<(), GraphicsError> {
        if !self.targets.contains_key(&target.0) {
            if self.strict {
                return Err(GraphicsError::new(
                    "present",
                    format!("unknown target {:?}", target),
                ));
            }
            self.pending_draws.clear();
            return Ok(());
        }

        let draws = std::mem::take(&mut self.pending_draws);
        for (i, draw) in draws.iter().enumerate() {
            self.ensure_uniform_buffer(i);
            self.queue.write_buffer(
                &self.uniform_buffers[i],
                0,
                bytemuck::bytes_of(&draw.uniforms),
            );
        }
        let Some(entry) = self.targets.get(&target.0) else {
            return Ok(());
        };

        self.push_scope();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &entry.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.1,
                            b: 0.1,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(program) = self.program.as_ref() {
                pass.set_pipeline(&program.pipeline);
                pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, self.tex_coord_buffer.slice(..));
                pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

                for (i, draw) in draws.iter().enumerate() {
                    let Some(texture_entry) = self.textures.get(&draw.texture) else {
                        continue;
                    };
                    let view = texture_entry
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("layer bind group"),
                        layout: &program.bind_group_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: self.uniform_buffers[i].as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::TextureView(&view),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: wgpu::BindingResource::Sampler(&self.sampler),
                            },
                        ],
                    });
                    let (vw, vh) = (
                        draw.viewport.0.min(entry.width).max(1),
                        draw.viewport.1.min(entry.height).max(1),
                    );
                    pass.set_viewport(0.0, 0.0, vw as f32, vh as f32, 0.0, 1.0);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.draw_indexed(0..geometry::DRAW_ORDER.len() as u32, 0, 0..1);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.pop_scope("present")
    }

    fn read_back(&mut self, target: TargetId) -> Result<Vec<u8>, GraphicsError> {
        let Some(entry) = self.targets.get(&target.0) else {
            return Err(GraphicsError::new(
                "read back",
                format!("unknown target {:?}", target),
            ));
        };
        let (width, height) = (entry.width, entry.height);

        // Buffer copies need 256-byte row alignment; rows are unpadded after
        // the copy-out below
        let unpadded = width as u64 * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read back"),
            size: padded * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read back"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| GraphicsError::new("read back", "map callback dropped"))?
            .map_err(|e| GraphicsError::new("read back", e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut rgba = Vec::with_capacity((unpadded * height as u64) as usize);
        for row in 0..height as u64 {
            let start = (row * padded) as usize;
            rgba.extend_from_slice(&mapped[start..start + unpadded as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(rgba)
    }

    fn strict_error_checking(&self) -> bool {
        self.strict
    }
}
