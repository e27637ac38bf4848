//! wgpu backend implementation

mod program;

pub use program::{
    compile_program, CompiledProgram, ProgramInterface, UniformKind, UniformMember, ENTRY_POINT,
};

use crate::backend::traits::*;
use crate::backend::types::*;
use glam::Mat4;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const MIN_UNIFORM_ARENA_SIZE: u64 = 4096;

/// Linked program with its layouts and the pipelines built for it so far
struct ProgramEntry {
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    interface: ProgramInterface,
    /// Current uniform values, laid out like the uniform block
    uniform_data: Vec<u8>,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: Option<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    /// Keyed by vertex layout id
    pipelines: HashMap<u64, wgpu::RenderPipeline>,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Attribute state of a vertex layout object
#[derive(Default)]
struct LayoutEntry {
    attributes: Vec<VertexAttribute>,
    vertex_buffer: Option<u64>,
    index_buffer: Option<u64>,
}

/// Buffered draw, replayed in `end_frame`
struct DrawCommand {
    program: u64,
    layout: u64,
    vertex_buffer: u64,
    index_buffer: u64,
    uniform_offset: u32,
    textures: Option<wgpu::BindGroup>,
    index_count: u32,
}

struct PendingFrame {
    surface_texture: wgpu::SurfaceTexture,
    clear: ClearColor,
    /// Per-draw uniform snapshots, each aligned for dynamic offsets
    uniforms: Vec<u8>,
    draws: Vec<DrawCommand>,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    uniform_alignment: usize,
    uniform_arena: Option<wgpu::Buffer>,

    // Resource storage
    programs: HashMap<u64, ProgramEntry>,
    buffers: HashMap<u64, wgpu::Buffer>,
    layouts: HashMap<u64, LayoutEntry>,
    textures: HashMap<u64, TextureEntry>,

    // Handle counters
    next_program_id: u64,
    next_buffer_id: u64,
    next_layout_id: u64,
    next_texture_id: u64,

    // Binding state
    current_program: Option<u64>,
    bound_layout: Option<u64>,
    current_vertex_buffer: Option<u64>,
    texture_units: HashMap<u32, u64>,

    frame: Option<PendingFrame>,
}

/// Clear colors are given in sRGB; an sRGB target expects linear values
fn clear_value(color: ClearColor, srgb_target: bool) -> wgpu::Color {
    let [r, g, b, a] = color.map(f64::from);
    if !srgb_target {
        return wgpu::Color { r, g, b, a };
    }
    wgpu::Color {
        r: srgb_to_linear(r),
        g: srgb_to_linear(g),
        b: srgb_to_linear(b),
        a,
    }
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

impl WgpuBackend {
    /// Create the backend for a window, blocking on adapter and device requests
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let (instance, surface, adapter, device, queue) = Self::init_native(window.clone()).await?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("wgpu error: {error}");
        }));

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| {
                BackendError::SurfaceCreationFailed("Surface reports no formats".into())
            })?;

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let (width, height) = Self::clamp_size(&device, size.width, size.height);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = Self::create_depth_view(&device, width, height);
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as usize;

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            depth_view,
            uniform_alignment,
            uniform_arena: None,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            layouts: HashMap::new(),
            textures: HashMap::new(),
            next_program_id: 1,
            next_buffer_id: 1,
            next_layout_id: 1,
            next_texture_id: 1,
            current_program: None,
            bound_layout: None,
            current_vertex_buffer: None,
            texture_units: HashMap::new(),
            frame: None,
        })
    }

    async fn init_native(
        window: Arc<winit::window::Window>,
    ) -> BackendResult<(
        wgpu::Instance,
        wgpu::Surface<'static>,
        wgpu::Adapter,
        wgpu::Device,
        wgpu::Queue,
    )> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok((instance, surface, adapter, device, queue))
    }

    /// Clamp to device limits while maintaining aspect ratio
    fn clamp_size(device: &wgpu::Device, width: u32, height: u32) -> (u32, u32) {
        let max_size = device.limits().max_texture_dimension_2d;
        if width > max_size || height > max_size {
            let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
            (
                ((width as f32 * scale) as u32).max(1),
                ((height as f32 * scale) as u32).max(1),
            )
        } else {
            (width.max(1), height.max(1))
        }
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
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
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Run `f` inside a validation error scope
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    fn vertex_format(components: u32) -> BackendResult<wgpu::VertexFormat> {
        match components {
            1 => Ok(wgpu::VertexFormat::Float32),
            2 => Ok(wgpu::VertexFormat::Float32x2),
            3 => Ok(wgpu::VertexFormat::Float32x3),
            4 => Ok(wgpu::VertexFormat::Float32x4),
            n => Err(BackendError::PipelineCreationFailed(format!(
                "unsupported attribute component count {n}"
            ))),
        }
    }

    fn convert_filter(filter: TextureFilter) -> wgpu::FilterMode {
        match filter {
            TextureFilter::Linear => wgpu::FilterMode::Linear,
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        }
    }

    fn write_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        kind: UniformKind,
        bytes: &[u8],
    ) {
        let Some(entry) = self.programs.get_mut(&program.0) else {
            log::warn!("Uniform set on unknown program {:?}", program);
            return;
        };
        let Some(member) = entry.interface.uniforms.get(location.0 as usize) else {
            return;
        };
        if member.kind != kind {
            log::warn!("Uniform `{}` is not a {:?}, ignoring", member.name, kind);
            return;
        }
        let start = member.offset as usize;
        if let Some(slot) = entry.uniform_data.get_mut(start..start + bytes.len()) {
            slot.copy_from_slice(bytes);
        }
    }

    /// Build the pipeline for a (program, vertex layout) pair on first use
    fn ensure_pipeline(&mut self, program_id: u64, layout_id: u64) -> BackendResult<()> {
        let program = self
            .programs
            .get(&program_id)
            .ok_or_else(|| BackendError::InvalidState("program in use was destroyed".into()))?;
        if program.pipelines.contains_key(&layout_id) {
            return Ok(());
        }
        let layout = self
            .layouts
            .get(&layout_id)
            .ok_or_else(|| BackendError::InvalidState("bound vertex layout was destroyed".into()))?;

        for location in &program.interface.vertex_inputs {
            if !layout.attributes.iter().any(|a| a.index == *location) {
                return Err(BackendError::PipelineCreationFailed(format!(
                    "vertex input {location} has no attribute in the bound layout"
                )));
            }
        }
        let stride = layout.attributes.first().map_or(0, |a| a.stride);
        if layout.attributes.iter().any(|a| a.stride != stride) {
            return Err(BackendError::PipelineCreationFailed(
                "vertex attributes must share one stride".into(),
            ));
        }
        let attributes = layout
            .attributes
            .iter()
            .map(|a| {
                Ok(wgpu::VertexAttribute {
                    format: Self::vertex_format(a.components)?,
                    offset: a.offset,
                    shader_location: a.index,
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let color_format = self.surface_config.format;
        let pipeline = self
            .scoped(|device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Model Pipeline"),
                    layout: Some(&program.pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &program.vertex_module,
                        entry_point: ENTRY_POINT,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        buffers: &[wgpu::VertexBufferLayout {
                            array_stride: stride as u64,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &attributes,
                        }],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &program.fragment_module,
                        entry_point: ENTRY_POINT,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: color_format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                })
            })
            .map_err(BackendError::PipelineCreationFailed)?;

        log::debug!("Built pipeline for program {program_id}, layout {layout_id}");
        if let Some(program) = self.programs.get_mut(&program_id) {
            program.pipelines.insert(layout_id, pipeline);
        }
        Ok(())
    }

    fn texture_bind_group(&self, program_id: u64) -> BackendResult<Option<wgpu::BindGroup>> {
        let Some(program) = self.programs.get(&program_id) else {
            return Ok(None);
        };
        let Some(layout) = &program.texture_layout else {
            return Ok(None);
        };

        let mut entries = Vec::with_capacity(program.interface.texture_units.len() * 2);
        for unit in &program.interface.texture_units {
            let texture = self
                .texture_units
                .get(unit)
                .and_then(|id| self.textures.get(id))
                .ok_or_else(|| {
                    BackendError::InvalidState(format!("no texture bound at unit {unit}"))
                })?;
            entries.push(wgpu::BindGroupEntry {
                binding: unit * 2,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: unit * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }

        Ok(Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Bind Group"),
            layout,
            entries: &entries,
        })))
    }

    fn ensure_uniform_arena(&mut self, size: u64) {
        let capacity = self.uniform_arena.as_ref().map_or(0, |buffer| buffer.size());
        if capacity >= size {
            return;
        }
        let size = size.next_power_of_two().max(MIN_UNIFORM_ARENA_SIZE);
        self.uniform_arena = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Arena"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
    }

    fn uniform_bind_group(&self, program: &ProgramEntry) -> wgpu::BindGroup {
        let block_size = program.interface.block_size as u64;
        let entries: Vec<wgpu::BindGroupEntry> = match &self.uniform_arena {
            Some(arena) if block_size > 0 => vec![wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: arena,
                    offset: 0,
                    size: NonZeroU64::new(block_size),
                }),
            }],
            _ => Vec::new(),
        };
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &program.uniform_layout,
            entries: &entries,
        })
    }
}

impl GraphicsBackend for WgpuBackend {
    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> BackendResult<ProgramHandle> {
        let compiled = compile_program(vertex_source, fragment_source)?;

        let vertex_wgsl = compiled.vertex_wgsl;
        let vertex_module = self
            .scoped(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Vertex Shader"),
                    source: wgpu::ShaderSource::Wgsl(vertex_wgsl.into()),
                })
            })
            .map_err(|log| BackendError::ShaderCompilationFailed {
                stage: ShaderStage::Vertex,
                log,
            })?;
        let fragment_wgsl = compiled.fragment_wgsl;
        let fragment_module = self
            .scoped(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Fragment Shader"),
                    source: wgpu::ShaderSource::Wgsl(fragment_wgsl.into()),
                })
            })
            .map_err(|log| BackendError::ShaderCompilationFailed {
                stage: ShaderStage::Fragment,
                log,
            })?;

        let interface = compiled.interface;
        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = if interface.block_size > 0 {
            vec![wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(interface.block_size as u64),
                },
                count: None,
            }]
        } else {
            Vec::new()
        };
        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Layout"),
                entries: &uniform_entries,
            });

        let texture_layout = (!interface.texture_units.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = interface
                .texture_units
                .iter()
                .flat_map(|unit| {
                    [
                        wgpu::BindGroupLayoutEntry {
                            binding: unit * 2,
                            visibility,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: unit * 2 + 1,
                            visibility,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ]
                })
                .collect();
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Texture Layout"),
                    entries: &entries,
                })
        });

        let mut bind_group_layouts = vec![&uniform_layout];
        if let Some(layout) = &texture_layout {
            bind_group_layouts.push(layout);
        }
        let pipeline_layout = self
            .scoped(|device| {
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Program Layout"),
                    bind_group_layouts: &bind_group_layouts,
                    push_constant_ranges: &[],
                })
            })
            .map_err(BackendError::ProgramLinkFailed)?;

        let id = self.next_program_id;
        self.next_program_id += 1;
        self.programs.insert(
            id,
            ProgramEntry {
                vertex_module,
                fragment_module,
                uniform_data: vec![0; interface.block_size as usize],
                interface,
                uniform_layout,
                texture_layout,
                pipeline_layout,
                pipelines: HashMap::new(),
            },
        );

        Ok(ProgramHandle(id))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program.0);
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program.0)?
            .interface
            .uniform(name)
            .map(|(index, _)| UniformLocation(index as u32))
    }

    fn set_uniform_i32(&mut self, program: ProgramHandle, location: UniformLocation, value: i32) {
        self.write_uniform(program, location, UniformKind::Int, bytemuck::bytes_of(&value));
    }

    fn set_uniform_mat4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: &Mat4,
    ) {
        self.write_uniform(program, location, UniformKind::Mat4, bytemuck::bytes_of(value));
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
        if self.current_program == Some(program.0) {
            self.current_program = None;
        }
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BackendResult<BufferHandle> {
        let (label, usage) = match target {
            BufferTarget::Vertex => ("Vertex Buffer", wgpu::BufferUsages::VERTEX),
            BufferTarget::Index => ("Index Buffer", wgpu::BufferUsages::INDEX),
        };
        let buffer = self
            .scoped(|device| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: data,
                    usage,
                })
            })
            .map_err(BackendError::BufferCreationFailed)?;

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, buffer);

        match target {
            BufferTarget::Vertex => self.current_vertex_buffer = Some(id),
            BufferTarget::Index => {
                if let Some(layout) = self
                    .bound_layout
                    .and_then(|layout| self.layouts.get_mut(&layout))
                {
                    layout.index_buffer = Some(id);
                }
            }
        }

        Ok(BufferHandle(id))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&buffer.0) {
            buffer.destroy();
        }
        if self.current_vertex_buffer == Some(buffer.0) {
            self.current_vertex_buffer = None;
        }
    }

    fn create_vertex_layout(&mut self) -> BackendResult<VertexLayoutHandle> {
        let id = self.next_layout_id;
        self.next_layout_id += 1;
        self.layouts.insert(id, LayoutEntry::default());
        Ok(VertexLayoutHandle(id))
    }

    fn bind_vertex_layout(&mut self, layout: Option<VertexLayoutHandle>) {
        self.bound_layout = layout.map(|layout| layout.0);
    }

    fn set_vertex_attribute(&mut self, attribute: &VertexAttribute) {
        let Some(layout_id) = self.bound_layout else {
            log::warn!("Vertex attribute {} set with no layout bound", attribute.index);
            return;
        };
        if !(1..=4).contains(&attribute.components) {
            log::warn!(
                "Vertex attribute {} has {} components, ignoring",
                attribute.index,
                attribute.components
            );
            return;
        }
        let vertex_buffer = self.current_vertex_buffer;
        if let Some(layout) = self.layouts.get_mut(&layout_id) {
            layout.attributes.retain(|a| a.index != attribute.index);
            layout.attributes.push(*attribute);
            layout.vertex_buffer = vertex_buffer;
            // Pipelines depend on the attribute set.
            for program in self.programs.values_mut() {
                program.pipelines.remove(&layout_id);
            }
        }
    }

    fn destroy_vertex_layout(&mut self, layout: VertexLayoutHandle) {
        self.layouts.remove(&layout.0);
        for program in self.programs.values_mut() {
            program.pipelines.remove(&layout.0);
        }
        if self.bound_layout == Some(layout.0) {
            self.bound_layout = None;
        }
    }

    fn create_texture(
        &mut self,
        image: &TextureImage,
        unit: u32,
        filter: TextureFilter,
    ) -> BackendResult<TextureHandle> {
        if image.width == 0 || image.height == 0 || image.levels.is_empty() {
            return Err(BackendError::TextureCreationFailed("empty image".into()));
        }
        for (level, pixels) in image.levels.iter().enumerate() {
            let (width, height) = image.level_size(level as u32);
            if pixels.len() != (width * height * 4) as usize {
                return Err(BackendError::TextureCreationFailed(format!(
                    "mip level {level} holds {} bytes, expected {}",
                    pixels.len(),
                    width * height * 4
                )));
            }
        }

        let texture = self
            .scoped(|device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Model Texture"),
                    size: wgpu::Extent3d {
                        width: image.width,
                        height: image.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: image.level_count(),
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8UnormSrgb,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                })
            })
            .map_err(BackendError::TextureCreationFailed)?;

        for (level, pixels) in image.levels.iter().enumerate() {
            let (width, height) = image.level_size(level as u32);
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mode = Self::convert_filter(filter);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Model Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: mode,
            min_filter: mode,
            mipmap_filter: mode,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                sampler,
            },
        );
        self.texture_units.insert(unit, id);

        Ok(TextureHandle(id))
    }

    fn bind_texture(&mut self, texture: TextureHandle, unit: u32) {
        self.texture_units.insert(unit, texture.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(entry) = self.textures.remove(&texture.0) {
            entry.texture.destroy();
        }
        self.texture_units.retain(|_, bound| *bound != texture.0);
    }

    fn begin_frame(&mut self, clear: ClearColor) -> BackendResult<()> {
        if self.frame.is_some() {
            return Err(BackendError::InvalidState("frame already in progress".into()));
        }
        let surface_texture = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => BackendError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
            _ => BackendError::AcquireImageFailed(e.to_string()),
        })?;

        self.frame = Some(PendingFrame {
            surface_texture,
            clear,
            uniforms: Vec::new(),
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32) -> BackendResult<()> {
        if index_count == 0 {
            return Ok(());
        }
        if self.frame.is_none() {
            return Err(BackendError::InvalidState("draw outside of a frame".into()));
        }
        let program_id = self
            .current_program
            .ok_or_else(|| BackendError::InvalidState("no program in use".into()))?;
        let layout_id = self
            .bound_layout
            .ok_or_else(|| BackendError::InvalidState("no vertex layout bound".into()))?;
        let (vertex_buffer, index_buffer) = self
            .layouts
            .get(&layout_id)
            .and_then(|layout| layout.vertex_buffer.zip(layout.index_buffer))
            .ok_or_else(|| {
                BackendError::InvalidState("vertex layout has no vertex or index buffer".into())
            })?;

        self.ensure_pipeline(program_id, layout_id)?;
        let textures = self.texture_bind_group(program_id)?;

        let alignment = self.uniform_alignment.max(1);
        let (Some(program), Some(frame)) = (self.programs.get(&program_id), self.frame.as_mut())
        else {
            return Err(BackendError::InvalidState("program in use was destroyed".into()));
        };
        let uniform_offset = if program.uniform_data.is_empty() {
            0
        } else {
            let offset = frame.uniforms.len().div_ceil(alignment) * alignment;
            frame.uniforms.resize(offset, 0);
            frame.uniforms.extend_from_slice(&program.uniform_data);
            offset as u32
        };

        frame.draws.push(DrawCommand {
            program: program_id,
            layout: layout_id,
            vertex_buffer,
            index_buffer,
            uniform_offset,
            textures,
            index_count,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };

        if !frame.uniforms.is_empty() {
            self.ensure_uniform_arena(frame.uniforms.len() as u64);
            if let Some(arena) = &self.uniform_arena {
                self.queue.write_buffer(arena, 0, &frame.uniforms);
            }
        }

        let mut uniform_groups: HashMap<u64, wgpu::BindGroup> = HashMap::new();
        for draw in &frame.draws {
            if uniform_groups.contains_key(&draw.program) {
                continue;
            }
            if let Some(program) = self.programs.get(&draw.program) {
                uniform_groups.insert(draw.program, self.uniform_bind_group(program));
            }
        }

        let view = frame
            .surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let clear = clear_value(frame.clear, self.surface_config.format.is_srgb());
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Model Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &frame.draws {
                let (Some(program), Some(vertex_buffer), Some(index_buffer), Some(uniforms)) = (
                    self.programs.get(&draw.program),
                    self.buffers.get(&draw.vertex_buffer),
                    self.buffers.get(&draw.index_buffer),
                    uniform_groups.get(&draw.program),
                ) else {
                    log::warn!("Skipping draw whose resources were released mid-frame");
                    continue;
                };
                let Some(pipeline) = program.pipelines.get(&draw.layout) else {
                    continue;
                };

                render_pass.set_pipeline(pipeline);
                if program.interface.block_size > 0 {
                    render_pass.set_bind_group(0, uniforms, &[draw.uniform_offset]);
                } else {
                    render_pass.set_bind_group(0, uniforms, &[]);
                }
                if let Some(textures) = &draw.textures {
                    render_pass.set_bind_group(1, textures, &[]);
                }
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.surface_texture.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            let (width, height) = Self::clamp_size(&self.device, width, height);
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
            self.depth_view = Self::create_depth_view(&self.device, width, height);
        }
    }
}
