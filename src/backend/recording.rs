//! Recording backend for testing and development.
//!
//! This backend doesn't perform any GPU work. It hands out handles, keeps just enough
//! binding state to validate draws, and records every call so tests can assert on the
//! exact sequence of device operations. Individual operations can be told to fail.

use crate::backend::traits::*;
use crate::backend::types::*;
use glam::Mat4;
use std::collections::{HashMap, HashSet};

/// Uniforms every program declares unless configured otherwise
pub const DEFAULT_UNIFORMS: [&str; 4] = ["cameraProjection", "cameraView", "model", "uTexture"];

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    SetUniformI32 {
        program: ProgramHandle,
        name: String,
        value: i32,
    },
    SetUniformMat4 {
        program: ProgramHandle,
        name: String,
        value: Mat4,
    },
    DestroyProgram(ProgramHandle),
    CreateBuffer {
        buffer: BufferHandle,
        target: BufferTarget,
        size: usize,
    },
    DestroyBuffer(BufferHandle),
    CreateVertexLayout(VertexLayoutHandle),
    BindVertexLayout(Option<VertexLayoutHandle>),
    SetVertexAttribute {
        layout: VertexLayoutHandle,
        attribute: VertexAttribute,
    },
    DestroyVertexLayout(VertexLayoutHandle),
    CreateTexture {
        texture: TextureHandle,
        unit: u32,
        filter: TextureFilter,
        width: u32,
        height: u32,
        levels: u32,
    },
    BindTexture {
        texture: TextureHandle,
        unit: u32,
    },
    DestroyTexture(TextureHandle),
    BeginFrame(ClearColor),
    DrawIndexed {
        program: ProgramHandle,
        layout: VertexLayoutHandle,
        index_count: u32,
    },
    EndFrame,
    Resize {
        width: u32,
        height: u32,
    },
}

/// Operation the backend should fail on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Compilation of the given stage
    Compile(ShaderStage),
    /// Program linking
    Link,
    /// Vertex layout allocation
    VertexLayout,
    /// The n-th buffer creation (0-based)
    Buffer(usize),
    /// Texture creation
    Texture,
}

/// Attribute and buffer state captured by a vertex layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutState {
    pub attributes: Vec<VertexAttribute>,
    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
}

/// Backend that records calls instead of talking to a GPU
#[derive(Debug)]
pub struct RecordingBackend {
    calls: Vec<Call>,
    uniforms: Vec<String>,
    fail_points: HashSet<FailPoint>,

    programs: HashSet<u64>,
    buffers: HashMap<u64, BufferTarget>,
    layouts: HashMap<u64, LayoutState>,
    textures: HashSet<u64>,
    invalid_releases: usize,

    current_program: Option<ProgramHandle>,
    bound_layout: Option<VertexLayoutHandle>,
    current_vertex_buffer: Option<BufferHandle>,
    texture_units: HashMap<u32, TextureHandle>,
    buffers_created: usize,
    in_frame: bool,

    next_id: u64,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            uniforms: DEFAULT_UNIFORMS.iter().map(|name| name.to_string()).collect(),
            fail_points: HashSet::new(),
            programs: HashSet::new(),
            buffers: HashMap::new(),
            layouts: HashMap::new(),
            textures: HashSet::new(),
            invalid_releases: 0,
            current_program: None,
            bound_layout: None,
            current_vertex_buffer: None,
            texture_units: HashMap::new(),
            buffers_created: 0,
            in_frame: false,
            next_id: 1,
        }
    }

    /// Replace the set of uniform names programs declare
    pub fn with_uniforms(mut self, names: &[&str]) -> Self {
        self.uniforms = names.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Make the given operation fail
    pub fn fail_on(mut self, point: FailPoint) -> Self {
        self.fail_points.insert(point);
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of handles created and not yet released
    pub fn live_resources(&self) -> usize {
        self.programs.len() + self.buffers.len() + self.layouts.len() + self.textures.len()
    }

    /// Number of release calls for handles that were not live
    pub fn invalid_releases(&self) -> usize {
        self.invalid_releases
    }

    pub fn layout_state(&self, layout: VertexLayoutHandle) -> Option<&LayoutState> {
        self.layouts.get(&layout.0)
    }

    pub fn bound_layout(&self) -> Option<VertexLayoutHandle> {
        self.bound_layout
    }

    pub fn texture_at(&self, unit: u32) -> Option<TextureHandle> {
        self.texture_units.get(&unit).copied()
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn uniform_name(&self, location: UniformLocation) -> Option<String> {
        self.uniforms.get(location.0 as usize).cloned()
    }

    fn note_release(&mut self, released: bool, what: &str) {
        if !released {
            log::trace!("RecordingBackend: releasing {what} that is not live");
            self.invalid_releases += 1;
        }
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_program(
        &mut self,
        _vertex_source: &str,
        _fragment_source: &str,
    ) -> BackendResult<ProgramHandle> {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if self.fail_points.contains(&FailPoint::Compile(stage)) {
                return Err(BackendError::ShaderCompilationFailed {
                    stage,
                    log: "injected failure".into(),
                });
            }
        }
        if self.fail_points.contains(&FailPoint::Link) {
            return Err(BackendError::ProgramLinkFailed("injected failure".into()));
        }

        let program = ProgramHandle(self.next_handle());
        log::trace!("RecordingBackend: creating program {:?}", program);
        self.programs.insert(program.0);
        self.calls.push(Call::CreateProgram(program));
        Ok(program)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.calls.push(Call::UseProgram(program));
    }

    fn uniform_location(&self, _program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|uniform| uniform == name)
            .map(|index| UniformLocation(index as u32))
    }

    fn set_uniform_i32(&mut self, program: ProgramHandle, location: UniformLocation, value: i32) {
        if let Some(name) = self.uniform_name(location) {
            self.calls.push(Call::SetUniformI32 {
                program,
                name,
                value,
            });
        }
    }

    fn set_uniform_mat4(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: &Mat4,
    ) {
        if let Some(name) = self.uniform_name(location) {
            self.calls.push(Call::SetUniformMat4 {
                program,
                name,
                value: *value,
            });
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        let released = self.programs.remove(&program.0);
        self.note_release(released, "program");
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.calls.push(Call::DestroyProgram(program));
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BackendResult<BufferHandle> {
        let nth = self.buffers_created;
        self.buffers_created += 1;
        if self.fail_points.contains(&FailPoint::Buffer(nth)) {
            return Err(BackendError::BufferCreationFailed("injected failure".into()));
        }

        let buffer = BufferHandle(self.next_handle());
        log::trace!(
            "RecordingBackend: creating {:?} buffer {:?} (size: {})",
            target,
            buffer,
            data.len()
        );
        self.buffers.insert(buffer.0, target);
        match target {
            BufferTarget::Vertex => self.current_vertex_buffer = Some(buffer),
            BufferTarget::Index => {
                if let Some(state) = self
                    .bound_layout
                    .and_then(|layout| self.layouts.get_mut(&layout.0))
                {
                    state.index_buffer = Some(buffer);
                }
            }
        }
        self.calls.push(Call::CreateBuffer {
            buffer,
            target,
            size: data.len(),
        });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        let released = self.buffers.remove(&buffer.0).is_some();
        self.note_release(released, "buffer");
        if self.current_vertex_buffer == Some(buffer) {
            self.current_vertex_buffer = None;
        }
        self.calls.push(Call::DestroyBuffer(buffer));
    }

    fn create_vertex_layout(&mut self) -> BackendResult<VertexLayoutHandle> {
        if self.fail_points.contains(&FailPoint::VertexLayout) {
            return Err(BackendError::VertexLayoutCreationFailed(
                "injected failure".into(),
            ));
        }
        let layout = VertexLayoutHandle(self.next_handle());
        log::trace!("RecordingBackend: creating vertex layout {:?}", layout);
        self.layouts.insert(layout.0, LayoutState::default());
        self.calls.push(Call::CreateVertexLayout(layout));
        Ok(layout)
    }

    fn bind_vertex_layout(&mut self, layout: Option<VertexLayoutHandle>) {
        self.bound_layout = layout;
        self.calls.push(Call::BindVertexLayout(layout));
    }

    fn set_vertex_attribute(&mut self, attribute: &VertexAttribute) {
        let Some(layout) = self.bound_layout else {
            log::warn!("Vertex attribute {} set with no layout bound", attribute.index);
            return;
        };
        let vertex_buffer = self.current_vertex_buffer;
        if let Some(state) = self.layouts.get_mut(&layout.0) {
            state.attributes.retain(|a| a.index != attribute.index);
            state.attributes.push(*attribute);
            state.vertex_buffer = vertex_buffer;
        }
        self.calls.push(Call::SetVertexAttribute {
            layout,
            attribute: *attribute,
        });
    }

    fn destroy_vertex_layout(&mut self, layout: VertexLayoutHandle) {
        let released = self.layouts.remove(&layout.0).is_some();
        self.note_release(released, "vertex layout");
        if self.bound_layout == Some(layout) {
            self.bound_layout = None;
        }
        self.calls.push(Call::DestroyVertexLayout(layout));
    }

    fn create_texture(
        &mut self,
        image: &TextureImage,
        unit: u32,
        filter: TextureFilter,
    ) -> BackendResult<TextureHandle> {
        if self.fail_points.contains(&FailPoint::Texture) {
            return Err(BackendError::TextureCreationFailed("injected failure".into()));
        }
        let texture = TextureHandle(self.next_handle());
        log::trace!(
            "RecordingBackend: creating texture {:?} ({}x{}, {} levels)",
            texture,
            image.width,
            image.height,
            image.level_count()
        );
        self.textures.insert(texture.0);
        self.texture_units.insert(unit, texture);
        self.calls.push(Call::CreateTexture {
            texture,
            unit,
            filter,
            width: image.width,
            height: image.height,
            levels: image.level_count(),
        });
        Ok(texture)
    }

    fn bind_texture(&mut self, texture: TextureHandle, unit: u32) {
        self.texture_units.insert(unit, texture);
        self.calls.push(Call::BindTexture { texture, unit });
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        let released = self.textures.remove(&texture.0);
        self.note_release(released, "texture");
        self.texture_units.retain(|_, bound| *bound != texture);
        self.calls.push(Call::DestroyTexture(texture));
    }

    fn begin_frame(&mut self, clear: ClearColor) -> BackendResult<()> {
        self.in_frame = true;
        self.calls.push(Call::BeginFrame(clear));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32) -> BackendResult<()> {
        if index_count == 0 {
            return Ok(());
        }
        if !self.in_frame {
            return Err(BackendError::InvalidState("draw outside of a frame".into()));
        }
        let program = self
            .current_program
            .ok_or_else(|| BackendError::InvalidState("no program in use".into()))?;
        let layout = self
            .bound_layout
            .ok_or_else(|| BackendError::InvalidState("no vertex layout bound".into()))?;
        self.calls.push(Call::DrawIndexed {
            program,
            layout,
            index_count,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.in_frame = false;
        self.calls.push(Call::EndFrame);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Resize { width, height });
    }
}
