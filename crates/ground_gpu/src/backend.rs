//! wgpu render backend
//!
//! Draws into RGBA8 + depth textures, one pair for the visible frame and one
//! for picking. Each draw records its own render pass; the first pass of a
//! frame clears. Vertex buffers and textures are uploaded lazily per
//! [`MeshId`] / [`TextureId`] and dropped once a visible frame no longer uses
//! them. Only the texture on unit 0 is sampled.

use std::hash::Hash;
use std::sync::Arc;

use ground_3d::geometry::{Mesh, MeshId, Vertex};
use ground_3d::render::{
    CullMode, DepthCompare, DrawCall, DrawPass, FrameTarget, FrameUniforms, FrontFace, RenderBackend, RenderState,
};
use ground_3d::shaders::{ProgramId, ShaderProgram};
use ground_3d::texture::{TextureId, TextureImage};
use ground_3d::SceneError;
use ground_core::Color;
use image::{ImageBuffer, Rgba, RgbaImage};
use rustc_hash::{FxHashMap, FxHashSet};
use wgpu::util::DeviceExt;

use crate::error::{GpuError, Result};
use crate::uniforms::{FrameUniform, ObjectUniform};

/// Color format of both render targets
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth format of both render targets
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

/// Calculate padded bytes per row (must be multiple of 256 for wgpu)
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    ((unpadded + align - 1) / align) * align
}

/// Drop the row padding of a read-back buffer
pub fn unpad_rows(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let padded = padded_bytes_per_row(width) as usize;
    let row = width as usize * 4;
    let mut out = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        out.extend_from_slice(&data[y * padded..y * padded + row]);
    }
    out
}

/// Drop every cache entry not in `used`, returning how many went
fn evict_unused<K: Eq + Hash, V>(cache: &mut FxHashMap<K, V>, used: FxHashSet<K>) -> usize {
    let before = cache.len();
    cache.retain(|id, _| used.contains(id));
    before - cache.len()
}

fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

fn depth_compare(compare: DepthCompare) -> wgpu::CompareFunction {
    match compare {
        DepthCompare::Less => wgpu::CompareFunction::Less,
        DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthCompare::Always => wgpu::CompareFunction::Always,
    }
}

fn cull_face(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

fn front_face(face: FrontFace) -> wgpu::FrontFace {
    match face {
        FrontFace::Ccw => wgpu::FrontFace::Ccw,
        FrontFace::Cw => wgpu::FrontFace::Cw,
    }
}

fn clear_color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64,
        g: c.g as f64,
        b: c.b as f64,
        a: c.a as f64,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resources
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    pass: DrawPass,
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    fill_indices: wgpu::Buffer,
    fill_count: u32,
    outline_indices: wgpu::Buffer,
    outline_count: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, mesh: &Mesh) -> Self {
        let vertices = mesh.expanded_vertices();
        let fill = mesh.triangle_indices();
        let outline = mesh.outline_indices();

        Self {
            vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Ground Mesh Vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            fill_indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Ground Mesh Fill Indices"),
                contents: bytemuck::cast_slice(&fill),
                usage: wgpu::BufferUsages::INDEX,
            }),
            fill_count: fill.len() as u32,
            outline_indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Ground Mesh Outline Indices"),
                contents: bytemuck::cast_slice(&outline),
                usage: wgpu::BufferUsages::INDEX,
            }),
            outline_count: outline.len() as u32,
        }
    }
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuTexture {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue, image: &TextureImage, label: &str) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: image.width(),
                    height: image.height(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image.pixels(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

struct RenderTarget {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Ground Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            width,
            height,
        }
    }
}

struct ActiveFrame {
    target: FrameTarget,
    encoder: wgpu::CommandEncoder,
    frame_bind_group: wgpu::BindGroup,
    clear: wgpu::Color,
    cleared: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Render backend on a wgpu device
pub struct GpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    frame_layout: wgpu::BindGroupLayout,
    object_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    white: GpuTexture,
    state: RenderState,
    modules: FxHashMap<ProgramId, wgpu::ShaderModule>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    meshes: FxHashMap<MeshId, GpuMesh>,
    meshes_used: FxHashSet<MeshId>,
    textures: FxHashMap<TextureId, GpuTexture>,
    textures_used: FxHashSet<TextureId>,
    screen: Option<RenderTarget>,
    pick: Option<RenderTarget>,
    frame: Option<ActiveFrame>,
}

impl GpuBackend {
    /// Create a backend on a headless device, blocking until it is ready
    pub fn new_headless() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Create a backend on a new headless device
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::AdapterNotFound)?;

        let info = adapter.get_info();
        tracing::debug!(adapter = %info.name, backend = ?info.backend, "GPU adapter selected");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ground GPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        Ok(Self::with_device(Arc::new(device), Arc::new(queue)))
    }

    /// Create a backend on an existing device
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Ground Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Ground Object Bind Group Layout"),
            entries: &[
                // Object uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Texture unit 0
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
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ground Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Ground Texture Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // bound when a draw has no texture, the layout always needs one
        let white = GpuTexture::new(&device, &queue, &TextureImage::solid([255; 4]), "Ground White Texture");

        Self {
            device,
            queue,
            frame_layout,
            object_layout,
            pipeline_layout,
            sampler,
            white,
            state: RenderState::default(),
            modules: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            meshes: FxHashMap::default(),
            meshes_used: FxHashSet::default(),
            textures: FxHashMap::default(),
            textures_used: FxHashSet::default(),
            screen: None,
            pick: None,
            frame: None,
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Number of meshes with live GPU buffers
    pub fn cached_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Number of textures with live GPU copies
    pub fn cached_textures(&self) -> usize {
        self.textures.len()
    }

    /// Read the whole visible frame back into an image
    pub fn read_frame(&self) -> Result<RgbaImage> {
        let target = self.screen.as_ref().ok_or(GpuError::NoFrame("visible"))?;
        let data = self.read_region(&target.color, 0, 0, target.width, target.height)?;

        let mut img: RgbaImage = ImageBuffer::new(target.width, target.height);
        for (i, px) in data.chunks_exact(4).enumerate() {
            let x = i as u32 % target.width;
            let y = i as u32 / target.width;
            img.put_pixel(x, y, Rgba([px[0], px[1], px[2], px[3]]));
        }
        Ok(img)
    }

    fn read_region(&self, texture: &wgpu::Texture, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        let bytes_per_row = padded_bytes_per_row(width);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Ground Read-back Buffer"),
            size: (bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Ground Read-back Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
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

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| GpuError::ChannelClosed)??;

        let data = buffer_slice.get_mapped_range();
        let pixels = unpad_rows(&data, width, height);
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }

    fn ensure_target(&mut self, target: FrameTarget) {
        let (width, height) = target.size();
        let (slot, label) = match target {
            FrameTarget::Screen { .. } => (&mut self.screen, "Ground Screen Target"),
            FrameTarget::Offscreen { .. } => (&mut self.pick, "Ground Pick Target"),
        };
        let stale = slot
            .as_ref()
            .map_or(true, |t| t.width != width || t.height != height);
        if stale {
            tracing::debug!(width, height, target = label, "creating render target");
            *slot = Some(RenderTarget::new(&self.device, width, height, label));
        }
    }

    fn ensure_pipeline(&mut self, program: &ShaderProgram, pass: DrawPass) -> Result<PipelineKey> {
        let key = PipelineKey {
            program: program.id(),
            pass,
        };
        if self.pipelines.contains_key(&key) {
            return Ok(key);
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = &*self.modules.entry(program.id()).or_insert_with(|| {
            tracing::debug!(program = program.name(), "creating shader module");
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.name()),
                source: wgpu::ShaderSource::Wgsl(program.source().into()),
            })
        });

        let (topology, cull_mode, bias) = match pass {
            DrawPass::Fill => (
                wgpu::PrimitiveTopology::TriangleList,
                cull_face(self.state.cull_mode),
                wgpu::DepthBiasState {
                    constant: self.state.polygon_offset.units as i32,
                    slope_scale: self.state.polygon_offset.factor,
                    clamp: 0.0,
                },
            ),
            // depth bias is only valid for triangles
            DrawPass::Outline => (wgpu::PrimitiveTopology::LineList, None, wgpu::DepthBiasState::default()),
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(program.name()),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some(program.vertex_entry()),
                buffers: &[vertex_buffer_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(program.fragment_entry()),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: front_face(self.state.front_face),
                cull_mode,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: depth_compare(self.state.depth_compare),
                stencil: wgpu::StencilState::default(),
                bias,
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            self.modules.remove(&program.id());
            return Err(GpuError::Validation(err.to_string()));
        }

        tracing::debug!(program = program.name(), ?pass, "created render pipeline");
        self.pipelines.insert(key, pipeline);
        Ok(key)
    }

    fn ensure_mesh(&mut self, mesh: &Mesh) {
        self.meshes_used.insert(mesh.id());
        if !self.meshes.contains_key(&mesh.id()) {
            tracing::debug!(mesh = mesh.id().0, vertices = mesh.vertex_count(), "uploading mesh");
            self.meshes.insert(mesh.id(), GpuMesh::new(&self.device, mesh));
        }
    }

    fn ensure_texture(&mut self, id: TextureId, image: &TextureImage) {
        self.textures_used.insert(id);
        if !self.textures.contains_key(&id) {
            tracing::debug!(texture = id.0, width = image.width(), height = image.height(), "uploading texture");
            let texture = GpuTexture::new(&self.device, &self.queue, image, "Ground Texture");
            self.textures.insert(id, texture);
        }
    }

    fn record_draw(&mut self, call: &DrawCall<'_>) -> Result<()> {
        if self.frame.is_none() {
            return Err(GpuError::Frame("draw called outside of a frame"));
        }

        self.ensure_mesh(call.mesh);
        if call.textures.len() > 1 {
            tracing::warn!(
                bound = call.textures.len(),
                mesh = call.mesh.id().0,
                "only texture unit 0 is sampled, extra textures ignored"
            );
        }
        let bound = call.textures.first();
        if let Some(bound) = bound {
            self.ensure_texture(bound.id, bound.image);
        }
        let key = self.ensure_pipeline(call.shading.program(), call.pass)?;

        let uniform = ObjectUniform::new(
            call.model,
            &call.shading,
            bound.is_some(),
            call.mesh.layout().has_normals(),
        );
        let object_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Object Uniforms"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let texture_view = bound
            .and_then(|b| self.textures.get(&b.id))
            .map_or(&self.white.view, |t| &t.view);
        let object_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ground Object Bind Group"),
            layout: &self.object_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: object_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let (Some(frame), Some(pipeline), Some(mesh)) = (
            self.frame.as_mut(),
            self.pipelines.get(&key),
            self.meshes.get(&call.mesh.id()),
        ) else {
            return Err(GpuError::Frame("draw resources missing"));
        };
        let target = match frame.target {
            FrameTarget::Screen { .. } => self.screen.as_ref(),
            FrameTarget::Offscreen { .. } => self.pick.as_ref(),
        }
        .ok_or(GpuError::Frame("frame target missing"))?;

        let (indices, count) = match call.pass {
            DrawPass::Fill => (&mesh.fill_indices, mesh.fill_count),
            DrawPass::Outline => (&mesh.outline_indices, mesh.outline_count),
        };
        if count == 0 {
            return Ok(());
        }

        let (color_load, depth_load) = if frame.cleared {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        } else {
            (wgpu::LoadOp::Clear(frame.clear), wgpu::LoadOp::Clear(1.0))
        };
        frame.cleared = true;

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Ground Draw Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &frame.frame_bind_group, &[]);
        pass.set_bind_group(1, &object_bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.vertices.slice(..));
        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..count, 0, 0..1);

        tracing::trace!(mesh = call.mesh.id().0, draw_pass = ?call.pass, count, "recorded draw");
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<()> {
        let mut frame = self
            .frame
            .take()
            .ok_or(GpuError::Frame("end_frame without begin_frame"))?;

        if !frame.cleared {
            // nothing was drawn, the target still has to be cleared
            let target = match frame.target {
                FrameTarget::Screen { .. } => self.screen.as_ref(),
                FrameTarget::Offscreen { .. } => self.pick.as_ref(),
            }
            .ok_or(GpuError::Frame("frame target missing"))?;
            let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Ground Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        self.queue.submit(std::iter::once(frame.encoder.finish()));

        // picking frames draw a subset, only screen frames decide what is stale
        if !frame.target.is_offscreen() {
            let evicted = evict_unused(&mut self.meshes, std::mem::take(&mut self.meshes_used));
            if evicted > 0 {
                tracing::debug!(evicted, "evicted unused meshes");
            }
            let evicted = evict_unused(&mut self.textures, std::mem::take(&mut self.textures_used));
            if evicted > 0 {
                tracing::debug!(evicted, "evicted unused textures");
            }
        }
        Ok(())
    }
}

impl RenderBackend for GpuBackend {
    fn init_state(&mut self, state: &RenderState) {
        if self.state != *state {
            self.pipelines.clear();
        }
        tracing::debug!(?state, "GPU backend state initialised");
        self.state = *state;
    }

    fn begin_frame(
        &mut self,
        target: FrameTarget,
        uniforms: &FrameUniforms,
        clear: Color,
    ) -> ground_3d::Result<()> {
        if self.frame.is_some() {
            return Err(GpuError::Frame("begin_frame while a frame is active").into());
        }
        let (width, height) = target.size();
        if width == 0 || height == 0 {
            return Err(SceneError::Backend(format!("invalid frame size {}x{}", width, height)));
        }
        self.ensure_target(target);

        let frame_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ground Frame Uniforms"),
            contents: bytemuck::bytes_of(&FrameUniform::new(uniforms)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let frame_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ground Frame Bind Group"),
            layout: &self.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });
        let encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Ground Frame Encoder"),
        });

        self.frame = Some(ActiveFrame {
            target,
            encoder,
            frame_bind_group,
            clear: clear_color(clear),
            cleared: false,
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> ground_3d::Result<()> {
        Ok(self.record_draw(call)?)
    }

    fn end_frame(&mut self) -> ground_3d::Result<()> {
        Ok(self.finish_frame()?)
    }

    fn read_pixel(&mut self, x: u32, y: u32) -> ground_3d::Result<[u8; 4]> {
        let target = self.pick.as_ref().ok_or(GpuError::NoFrame("picking"))?;
        if x >= target.width || y >= target.height {
            return Err(GpuError::OutOfBounds {
                x,
                y,
                width: target.width,
                height: target.height,
            }
            .into());
        }
        let data = self.read_region(&target.color, x, y, 1, 1)?;
        Ok([data[0], data[1], data[2], data[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evict_unused() {
        let mut cache: FxHashMap<TextureId, &str> = FxHashMap::default();
        cache.insert(TextureId(1), "checker");
        cache.insert(TextureId(2), "brick");
        cache.insert(TextureId(3), "stale");

        let used: FxHashSet<TextureId> = [TextureId(1), TextureId(2)].into_iter().collect();
        assert_eq!(evict_unused(&mut cache, used), 1);
        assert!(!cache.contains_key(&TextureId(3)));

        assert_eq!(evict_unused(&mut cache, FxHashSet::default()), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn test_unpad_rows() {
        let mut data = vec![0u8; 256 * 2];
        data[0..4].copy_from_slice(&[1, 2, 3, 4]);
        data[256..260].copy_from_slice(&[5, 6, 7, 8]);
        assert_eq!(unpad_rows(&data, 1, 2), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_vertex_layout_matches_vertex() {
        let layout = vertex_buffer_layout();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
        assert_eq!(layout.attributes[2].shader_location, 2);
    }

    #[test]
    fn test_state_mapping() {
        let state = RenderState::default();
        assert_eq!(depth_compare(state.depth_compare), wgpu::CompareFunction::LessEqual);
        assert_eq!(cull_face(state.cull_mode), Some(wgpu::Face::Back));
        assert_eq!(front_face(state.front_face), wgpu::FrontFace::Ccw);
        assert_eq!(cull_face(CullMode::None), None);
    }
}
