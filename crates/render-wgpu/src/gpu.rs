use crate::shaders;
use bytemuck::{Pod, Zeroable};
use cubebatch_render::{
    BackendError, BatchHandle, DrawState, Quad, QuadSink, RenderBackend, TextureFilter, TextureId,
    TextureUpload, TextureWrap,
};
use glam::Mat4;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, thiserror::Error)]
pub enum WgpuBackendError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("readback mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("readback channel closed before mapping finished")]
    MapChannelClosed,
    #[error("offscreen readback needs an Rgba8 target, got {0:?}")]
    UnreadableFormat(wgpu::TextureFormat),
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

/// Two counter-clockwise triangles per quad.
pub(crate) fn quad_vertices(quad: &Quad) -> [Vertex; 6] {
    let v = |i: usize| Vertex {
        position: quad.corners[i].to_array(),
        normal: quad.normal.to_array(),
        uv: quad.uvs[i].to_array(),
    };
    [v(0), v(1), v(2), v(2), v(3), v(0)]
}

/// Row pitch of a readback buffer, padded to wgpu's copy alignment.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Replay-side command deferred until the frame is encoded.
#[derive(Debug, Clone, Copy)]
enum Command {
    Clear([f32; 4]),
    Bind(Option<TextureId>),
    State(DrawState),
    Draw(BatchHandle),
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Default)]
struct GpuBatch {
    buffer: Option<wgpu::Buffer>,
    vertex_count: u32,
}

/// Counters for one encoded frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub draws: usize,
    pub vertices: u64,
}

/// wgpu implementation of [`RenderBackend`].
///
/// Compiled batches are retained vertex buffers. Replay calls are queued and
/// turned into one render pass by [`encode_frame`](Self::encode_frame).
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    /// Indexed by `depth_write as usize * 2 + blending as usize`.
    pipelines: [wgpu::RenderPipeline; 4],
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    white: GpuTexture,
    textures: Vec<GpuTexture>,
    batches: Vec<GpuBatch>,
    open: Option<(BatchHandle, Vec<Vertex>)>,
    commands: Vec<Command>,
    depth: Option<(u32, u32, wgpu::TextureView)>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, target_format: wgpu::TextureFormat) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform_buffer"),
            contents: bytemuck::bytes_of(&Uniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("batch_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("batch_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::BATCH_SHADER.into()),
        });

        let pipeline = |depth_write: bool, blending: bool| {
            create_pipeline(
                &device,
                &pipeline_layout,
                &shader,
                target_format,
                depth_write,
                blending,
            )
        };
        let pipelines = [
            pipeline(false, false),
            pipeline(false, true),
            pipeline(true, false),
            pipeline(true, true),
        ];

        let white = create_texture(
            &device,
            &queue,
            &texture_layout,
            &TextureUpload {
                width: 1,
                height: 1,
                has_alpha: false,
                rgba: &[255; 4],
                filter: TextureFilter::Nearest,
                wrap: TextureWrap::ClampToEdge,
            },
        );

        tracing::info!(format = ?target_format, "wgpu batch backend ready");
        Self {
            device,
            queue,
            target_format,
            pipelines,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            white,
            textures: Vec::new(),
            batches: Vec::new(),
            open: None,
            commands: Vec::new(),
            depth: None,
        }
    }

    /// Backend on the default adapter with no surface, rendering to
    /// `Rgba8UnormSrgb` targets.
    pub fn headless() -> Result<Self, WgpuBackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(WgpuBackendError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cubebatch_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        tracing::debug!(adapter = ?adapter.get_info().name, "headless device acquired");
        Ok(Self::new(device, queue, wgpu::TextureFormat::Rgba8UnormSrgb))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    pub fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Number of replay commands waiting for [`encode_frame`](Self::encode_frame).
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Encode and submit every queued replay command as one render pass into
    /// `target`.
    pub fn encode_frame(
        &mut self,
        target: &wgpu::TextureView,
        width: u32,
        height: u32,
        view_proj: Mat4,
    ) -> FrameReport {
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                view_proj: view_proj.to_cols_array_2d(),
            }),
        );
        self.ensure_depth(width, height);

        let commands = std::mem::take(&mut self.commands);
        let clear = commands.iter().find_map(|c| match c {
            Command::Clear(color) => Some(*color),
            _ => None,
        });
        let color_load = match clear {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };
        let depth_load = if clear.is_some() {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let mut report = FrameReport::default();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("batch_encoder"),
            });

        if let Some((_, _, depth_view)) = &self.depth {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("batch_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            let mut state = DrawState::default();
            let mut texture: Option<TextureId> = None;
            for command in commands {
                match command {
                    Command::Clear(_) => {}
                    Command::Bind(t) => texture = t,
                    Command::State(s) => state = s,
                    Command::Draw(handle) => {
                        let Some(batch) = self.batches.get(handle.0 as usize) else {
                            continue;
                        };
                        let Some(buffer) = &batch.buffer else {
                            continue;
                        };
                        let bound = match texture {
                            Some(id) if state.texturing => self
                                .textures
                                .get(id.0 as usize)
                                .map_or(&self.white.bind_group, |t| &t.bind_group),
                            _ => &self.white.bind_group,
                        };
                        let index = state.depth_write as usize * 2 + state.blending as usize;
                        pass.set_pipeline(&self.pipelines[index]);
                        pass.set_bind_group(1, bound, &[]);
                        pass.set_vertex_buffer(0, buffer.slice(..));
                        pass.draw(0..batch.vertex_count, 0..1);
                        report.draws += 1;
                        report.vertices += batch.vertex_count as u64;
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(draws = report.draws, vertices = report.vertices, "frame encoded");
        report
    }

    /// Render the queued commands into an offscreen texture and read it back
    /// as tightly packed RGBA rows, top row first.
    pub fn render_offscreen(
        &mut self,
        width: u32,
        height: u32,
        view_proj: Mat4,
    ) -> Result<Vec<u8>, WgpuBackendError> {
        if !matches!(
            self.target_format,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
        ) {
            return Err(WgpuBackendError::UnreadableFormat(self.target_format));
        }
        let (width, height) = (width.max(1), height.max(1));
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.target_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&Default::default());
        self.encode_frame(&view, width, height, view_proj);

        let padded = padded_bytes_per_row(width);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen_readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            size,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| WgpuBackendError::MapChannelClosed)??;

        let mapped = slice.get_mapped_range();
        let row = width as usize * 4;
        let mut pixels = Vec::with_capacity(row * height as usize);
        for chunk in mapped.chunks(padded as usize) {
            pixels.extend_from_slice(&chunk[..row]);
        }
        drop(mapped);
        readback.unmap();
        Ok(pixels)
    }

    fn ensure_depth(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if matches!(&self.depth, Some((w, h, _)) if *w == width && *h == height) {
            return;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.depth = Some((width, height, texture.create_view(&Default::default())));
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    depth_write: bool,
    blending: bool,
) -> wgpu::RenderPipeline {
    let blend = if blending {
        wgpu::BlendState::ALPHA_BLENDING
    } else {
        wgpu::BlendState::REPLACE
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("batch_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x3,
                    2 => Float32x2,
                ],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    upload: &TextureUpload<'_>,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: upload.width,
        height: upload.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("atlas_texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        upload.rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(upload.width * 4),
            rows_per_image: Some(upload.height),
        },
        size,
    );

    let filter = match upload.filter {
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        TextureFilter::Linear => wgpu::FilterMode::Linear,
    };
    let wrap = match upload.wrap {
        TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
    };
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("atlas_sampler"),
        address_mode_u: wrap,
        address_mode_v: wrap,
        address_mode_w: wrap,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let view = texture.create_view(&Default::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("atlas_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });
    GpuTexture {
        _texture: texture,
        bind_group,
    }
}

impl QuadSink for WgpuBackend {
    fn push_quad(&mut self, quad: Quad) {
        match &mut self.open {
            Some((_, vertices)) => vertices.extend_from_slice(&quad_vertices(&quad)),
            None => tracing::warn!("quad pushed outside of a batch recording, dropped"),
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn upload_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, BackendError> {
        if upload.width == 0 || upload.height == 0 {
            return Err(BackendError::EmptyTexture);
        }
        let limit = self.max_texture_size();
        if upload.width > limit || upload.height > limit {
            return Err(BackendError::TextureTooLarge {
                width: upload.width,
                height: upload.height,
                limit,
            });
        }
        let expected = upload.width as usize * upload.height as usize * 4;
        if upload.rgba.len() != expected {
            return Err(BackendError::TextureSize {
                expected,
                actual: upload.rgba.len(),
            });
        }

        let texture = create_texture(&self.device, &self.queue, &self.texture_layout, upload);
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(texture);
        tracing::debug!(?id, width = upload.width, height = upload.height, "texture uploaded");
        Ok(id)
    }

    fn allocate_batches(&mut self, count: usize) -> Result<Vec<BatchHandle>, BackendError> {
        let first = self.batches.len() as u32;
        self.batches.resize_with(self.batches.len() + count, GpuBatch::default);
        Ok((0..count as u32).map(|i| BatchHandle(first + i)).collect())
    }

    fn begin_batch(&mut self, handle: BatchHandle) -> Result<(), BackendError> {
        if let Some((open, _)) = self.open {
            return Err(BackendError::BatchAlreadyOpen(open));
        }
        if handle.0 as usize >= self.batches.len() {
            return Err(BackendError::UnknownBatch(handle));
        }
        self.open = Some((handle, Vec::new()));
        Ok(())
    }

    fn end_batch(&mut self) -> Result<(), BackendError> {
        let (handle, vertices) = self.open.take().ok_or(BackendError::NoOpenBatch)?;
        let buffer = (!vertices.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("batch_vertex_buffer"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });
        let batch = self
            .batches
            .get_mut(handle.0 as usize)
            .ok_or(BackendError::UnknownBatch(handle))?;
        batch.buffer = buffer;
        batch.vertex_count = vertices.len() as u32;
        Ok(())
    }

    fn abort_batch(&mut self) {
        self.open = None;
    }

    fn call_batch(&mut self, handle: BatchHandle) -> Result<(), BackendError> {
        if handle.0 as usize >= self.batches.len() {
            return Err(BackendError::UnknownBatch(handle));
        }
        self.commands.push(Command::Draw(handle));
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(Command::Clear(color));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) -> Result<(), BackendError> {
        if let Some(id) = texture {
            if id.0 as usize >= self.textures.len() {
                return Err(BackendError::UnknownTexture(id));
            }
        }
        self.commands.push(Command::Bind(texture));
        Ok(())
    }

    fn set_draw_state(&mut self, state: DrawState) {
        self.commands.push(Command::State(state));
    }
}
