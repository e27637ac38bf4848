//! Textured model built from an asset file

use crate::asset::{flatten, AssetLoader, ConversionOptions, DefaultLoader, RawAsset};
use crate::backend::traits::*;
use crate::backend::types::TextureFilter;
use crate::error::ViewerResult;
use crate::resources::{Mesh, ShaderProgram, Texture, MODEL_UNIFORM};
use glam::Mat4;
use std::path::Path;

/// A single merged mesh with one texture and a model transform
pub struct Model<B: GraphicsBackend> {
    mesh: Mesh<B>,
    transform: Mat4,
}

impl<B: GraphicsBackend> Model<B> {
    /// Load an asset and texture from disk with default conversion
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        context: &RenderContext<B>,
        asset_path: P,
        texture_path: Q,
        texture_unit: u32,
    ) -> ViewerResult<Self> {
        Self::load_with(
            context,
            &DefaultLoader,
            asset_path.as_ref(),
            texture_path.as_ref(),
            texture_unit,
            &ConversionOptions::default(),
        )
    }

    pub fn load_with(
        context: &RenderContext<B>,
        loader: &dyn AssetLoader,
        asset_path: &Path,
        texture_path: &Path,
        texture_unit: u32,
        options: &ConversionOptions,
    ) -> ViewerResult<Self> {
        let asset = loader.load(asset_path)?;
        let texture =
            Texture::from_file(context, texture_path, texture_unit, TextureFilter::Linear)?;
        Self::from_asset(context, &asset, texture, options)
    }

    /// Flatten an already parsed asset and upload it
    pub fn from_asset(
        context: &RenderContext<B>,
        asset: &RawAsset,
        texture: Texture<B>,
        options: &ConversionOptions,
    ) -> ViewerResult<Self> {
        let data = flatten(asset, options)?;
        let mesh = Mesh::new(context, data, texture)?;
        Ok(Self {
            mesh,
            transform: Mat4::IDENTITY,
        })
    }

    /// Upload the model matrix, then draw the mesh
    pub fn draw(&self, shader: &ShaderProgram<B>) -> BackendResult<()> {
        shader.use_program();
        shader.set_uniform_mat4(MODEL_UNIFORM, &self.transform);
        self.mesh.draw(shader)
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn mesh(&self) -> &Mesh<B> {
        &self.mesh
    }
}
