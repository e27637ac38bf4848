//! Shader programs

use crate::backend::traits::*;
use crate::error::{ViewerError, ViewerResult};
use glam::Mat4;
use std::path::Path;

/// Uniform names the viewer's shaders declare
pub const PROJECTION_UNIFORM: &str = "cameraProjection";
pub const VIEW_UNIFORM: &str = "cameraView";
pub const MODEL_UNIFORM: &str = "model";
pub const TEXTURE_UNIFORM: &str = "uTexture";

/// A linked vertex + fragment program
///
/// The program is released when this value is dropped.
pub struct ShaderProgram<B: GraphicsBackend> {
    context: RenderContext<B>,
    handle: ProgramHandle,
}

impl<B: GraphicsBackend> ShaderProgram<B> {
    /// Read both stages from disk, compile and link them
    pub fn from_files(
        context: &RenderContext<B>,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> ViewerResult<Self> {
        let vertex_source = read_source(vertex_path.as_ref())?;
        let fragment_source = read_source(fragment_path.as_ref())?;
        let program = Self::from_sources(context, &vertex_source, &fragment_source)?;
        log::info!(
            "Loaded shader program from {} and {}",
            vertex_path.as_ref().display(),
            fragment_path.as_ref().display()
        );
        Ok(program)
    }

    pub fn from_sources(
        context: &RenderContext<B>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> BackendResult<Self> {
        let handle = context
            .borrow_mut()
            .create_program(vertex_source, fragment_source)
            .map_err(|e| {
                log::error!("{e}");
                e
            })?;

        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Make this the active program
    pub fn use_program(&self) {
        self.context.borrow_mut().use_program(self.handle);
    }

    /// Set an `int` uniform. An unknown name is logged and ignored.
    pub fn set_uniform_integer(&self, name: &str, value: i32) {
        let mut backend = self.context.borrow_mut();
        match backend.uniform_location(self.handle, name) {
            Some(location) => backend.set_uniform_i32(self.handle, location, value),
            None => log::warn!("Uniform `{name}` not found in shader program"),
        }
    }

    /// Set a `mat4` uniform. An unknown name is logged and ignored.
    pub fn set_uniform_mat4(&self, name: &str, value: &Mat4) {
        let mut backend = self.context.borrow_mut();
        match backend.uniform_location(self.handle, name) {
            Some(location) => backend.set_uniform_mat4(self.handle, location, value),
            None => log::warn!("Uniform `{name}` not found in shader program"),
        }
    }
}

impl<B: GraphicsBackend> Drop for ShaderProgram<B> {
    fn drop(&mut self) {
        let handle = self.handle;
        self.context
            .release("shader program", |backend| backend.destroy_program(handle));
    }
}

fn read_source(path: &Path) -> ViewerResult<String> {
    std::fs::read_to_string(path).map_err(|source| ViewerError::Io {
        path: path.to_path_buf(),
        source,
    })
}
