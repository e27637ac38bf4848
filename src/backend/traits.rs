//! Core backend abstraction traits
//!
//! Every device call made by the viewer goes through [`GraphicsBackend`], so GPU-owning
//! resources never touch global device state and tests can swap in a recording backend.

use crate::backend::types::*;
use glam::Mat4;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("{stage} shader compilation failed:\n{log}")]
    ShaderCompilationFailed { stage: ShaderStage, log: String },
    #[error("Shader program linking failed:\n{0}")]
    ProgramLinkFailed(String),
    #[error("Failed to create vertex layout: {0}")]
    VertexLayoutCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Invalid draw state: {0}")]
    InvalidState(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a vertex layout object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayoutHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Location of a uniform inside one program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

/// Device operations used by the viewer
///
/// The model mirrors a classic immediate-mode API: a program is made current with
/// [`use_program`](Self::use_program), a vertex layout is bound, and
/// [`draw_indexed`](Self::draw_indexed) consumes whatever is bound at that moment.
pub trait GraphicsBackend {
    // === Shader programs ===

    /// Compile both stages and link them into one program
    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> BackendResult<ProgramHandle>;

    /// Make a program current for subsequent draws
    fn use_program(&mut self, program: ProgramHandle);

    /// Resolve a uniform by name. `None` when the program declares no such uniform.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn set_uniform_i32(&mut self, program: ProgramHandle, location: UniformLocation, value: i32);

    fn set_uniform_mat4(&mut self, program: ProgramHandle, location: UniformLocation, value: &Mat4);

    fn destroy_program(&mut self, program: ProgramHandle);

    // === Buffers ===

    /// Allocate a buffer, upload `data` once and bind it to `target`
    ///
    /// A vertex buffer becomes the source for later
    /// [`set_vertex_attribute`](Self::set_vertex_attribute) calls; an index buffer is
    /// captured by the currently bound vertex layout.
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BackendResult<BufferHandle>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    // === Vertex layouts ===

    fn create_vertex_layout(&mut self) -> BackendResult<VertexLayoutHandle>;

    /// Bind a layout, or unbind with `None`
    fn bind_vertex_layout(&mut self, layout: Option<VertexLayoutHandle>);

    /// Declare and enable one attribute on the bound layout, reading from the current vertex buffer
    fn set_vertex_attribute(&mut self, attribute: &VertexAttribute);

    fn destroy_vertex_layout(&mut self, layout: VertexLayoutHandle);

    // === Textures ===

    /// Upload every mip level of `image` and bind the texture at `unit`
    fn create_texture(
        &mut self,
        image: &TextureImage,
        unit: u32,
        filter: TextureFilter,
    ) -> BackendResult<TextureHandle>;

    fn bind_texture(&mut self, texture: TextureHandle, unit: u32);

    fn destroy_texture(&mut self, texture: TextureHandle);

    // === Frame ===

    /// Acquire the frame target and clear color and depth
    fn begin_frame(&mut self, clear: ClearColor) -> BackendResult<()>;

    /// Issue one indexed triangle-list draw with the current bindings
    fn draw_indexed(&mut self, index_count: u32) -> BackendResult<()>;

    /// Submit recorded work and present
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Reconfigure the presentation surface
    fn resize(&mut self, width: u32, height: u32);
}

/// Shared, single-threaded handle to a backend
///
/// Resources keep a clone so they can release their handle when dropped.
pub struct RenderContext<B: GraphicsBackend> {
    backend: Rc<RefCell<B>>,
}

impl<B: GraphicsBackend> RenderContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Rc::new(RefCell::new(backend)),
        }
    }

    pub fn borrow(&self) -> Ref<'_, B> {
        self.backend.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, B> {
        self.backend.borrow_mut()
    }

    /// Run a release callback from a `Drop` impl without panicking if the backend is busy
    pub(crate) fn release(&self, what: &str, f: impl FnOnce(&mut B)) {
        match self.backend.try_borrow_mut() {
            Ok(mut backend) => f(&mut backend),
            Err(_) => log::error!("Backend busy, leaking {what}"),
        }
    }
}

impl<B: GraphicsBackend> Clone for RenderContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Rc::clone(&self.backend),
        }
    }
}
