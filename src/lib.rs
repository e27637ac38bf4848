//! Model Viewer - a minimal real-time viewer for one textured model
//!
//! The crate loads a glTF or OBJ asset, flattens it into a single indexed mesh,
//! uploads it with a texture and draws it every frame through a free-fly camera.
//!
//! # Layers
//! - [`backend`]: the [`GraphicsBackend`](backend::GraphicsBackend) trait with a wgpu
//!   implementation and a recording implementation for tests
//! - [`resources`]: owning wrappers for shader programs, buffers, vertex layouts,
//!   textures and meshes, each releasing its device object on drop
//! - [`asset`]: file loaders and conversion to flat vertex/index data
//! - [`scene`]: camera and model
//! - [`viewer`]: the per-frame driver

pub mod asset;
pub mod backend;
pub mod error;
pub mod resources;
pub mod scene;
pub mod viewer;
pub mod window;

pub use backend::wgpu_backend::WgpuBackend;
pub use error::{ViewerError, ViewerResult};
pub use viewer::Viewer;
pub use window::Window;

use backend::types::ClearColor;
use std::path::PathBuf;

/// Configuration for the viewer and its window
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// glTF/GLB or OBJ file
    pub model_path: PathBuf,
    pub texture_path: PathBuf,
    pub texture_unit: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub clear_color: ClearColor,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "opengl test window".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            vertex_shader: PathBuf::from("shaders/vertex.glsl"),
            fragment_shader: PathBuf::from("shaders/fragment.glsl"),
            model_path: PathBuf::from("data/car.glb"),
            texture_path: PathBuf::from("data/car_texture.png"),
            texture_unit: 0,
            fov_degrees: 60.0,
            clear_color: [245.0 / 255.0, 245.0 / 255.0, 250.0 / 255.0, 1.0],
        }
    }
}

impl ViewerConfig {
    /// Aspect ratio of the initial window size
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
