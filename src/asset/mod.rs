//! Asset loading and conversion to flat mesh data
//!
//! Loaders parse a model file into [`RawAsset`]: per sub-mesh flat float arrays as the
//! file stores them. [`flatten`] merges those sub-meshes into one [`MeshData`].

mod gltf_loader;
mod obj_loader;

pub use gltf_loader::GltfLoader;
pub use obj_loader::ObjLoader;

use crate::backend::types::Vertex;
use crate::resources::{MeshData, MeshError};
use glam::{Vec2, Vec3};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Failed to load glTF asset {}: {source}", .path.display())]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("Failed to load OBJ asset {}: {source}", .path.display())]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("Unsupported asset format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("Mesh {mesh} primitive {primitive} has no POSITION attribute")]
    MissingPositions { mesh: usize, primitive: usize },
    #[error("Mesh {mesh} primitive {primitive} uses unsupported topology {mode}")]
    UnsupportedTopology {
        mesh: usize,
        primitive: usize,
        mode: String,
    },
    #[error("Sub-mesh {sub_mesh}: position array length {len} is not a multiple of 3")]
    MalformedPositions { sub_mesh: usize, len: usize },
    #[error("Sub-mesh {sub_mesh}: {attribute} array holds {actual} floats, expected {expected}")]
    AttributeLength {
        sub_mesh: usize,
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Asset holds more vertices than 32-bit indices can address")]
    TooManyVertices,
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// One parsed sub-mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSubMesh {
    /// 3 floats per vertex
    pub positions: Vec<f32>,
    /// 2 floats per vertex, V measured from the top of the image
    pub texcoords: Option<Vec<f32>>,
    /// 3 floats per vertex
    pub normals: Option<Vec<f32>>,
    /// 3 indices per triangle, relative to this sub-mesh
    pub indices: Vec<u32>,
}

impl RawSubMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// A parsed model file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAsset {
    pub meshes: Vec<RawSubMesh>,
}

/// Parses model files into [`RawAsset`]
pub trait AssetLoader {
    fn load(&self, path: &Path) -> Result<RawAsset, AssetError>;
}

/// Picks a loader by file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoader;

impl AssetLoader for DefaultLoader {
    fn load(&self, path: &Path) -> Result<RawAsset, AssetError> {
        load_asset(path)
    }
}

/// Load `.gltf`/`.glb` or `.obj` files
pub fn load_asset(path: &Path) -> Result<RawAsset, AssetError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let asset = match extension.as_deref() {
        Some("gltf") | Some("glb") => GltfLoader.load(path)?,
        Some("obj") => ObjLoader.load(path)?,
        _ => return Err(AssetError::UnsupportedFormat(path.to_path_buf())),
    };

    log::info!(
        "Loaded asset {} ({} sub-meshes)",
        path.display(),
        asset.meshes.len()
    );
    Ok(asset)
}

/// How sub-mesh indices are written into the merged index list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Shift each sub-mesh's indices by the number of vertices emitted before it
    #[default]
    OffsetBySubMesh,
    /// Copy indices unchanged. Only correct for single sub-mesh assets.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    pub index_mode: IndexMode,
    /// Copy source normals when present, otherwise normals stay zero
    pub copy_normals: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            index_mode: IndexMode::OffsetBySubMesh,
            copy_normals: true,
        }
    }
}

/// Merge every sub-mesh into one vertex/index list
///
/// UVs get their V component inverted (`v' = 1 - v`); missing texcoords give a zero UV.
pub fn flatten(asset: &RawAsset, options: &ConversionOptions) -> Result<MeshData, AssetError> {
    let total: usize = asset.meshes.iter().map(RawSubMesh::vertex_count).sum();
    if u32::try_from(total).is_err() {
        return Err(AssetError::TooManyVertices);
    }

    let mut vertices = Vec::with_capacity(total);
    let mut indices = Vec::with_capacity(asset.meshes.iter().map(|m| m.indices.len()).sum());

    for (sub_mesh, raw) in asset.meshes.iter().enumerate() {
        if raw.positions.len() % 3 != 0 {
            return Err(AssetError::MalformedPositions {
                sub_mesh,
                len: raw.positions.len(),
            });
        }
        let vertex_count = raw.vertex_count();
        check_length(sub_mesh, "texcoord", raw.texcoords.as_deref(), vertex_count * 2)?;
        check_length(sub_mesh, "normal", raw.normals.as_deref(), vertex_count * 3)?;

        // Cannot truncate: the total was checked above.
        let base = vertices.len() as u32;

        for v in 0..vertex_count {
            let position = Vec3::from_slice(&raw.positions[v * 3..v * 3 + 3]);
            let uv = raw
                .texcoords
                .as_ref()
                .map_or(Vec2::ZERO, |uv| Vec2::new(uv[v * 2], 1.0 - uv[v * 2 + 1]));
            let normal = match &raw.normals {
                Some(normals) if options.copy_normals => {
                    Vec3::from_slice(&normals[v * 3..v * 3 + 3])
                }
                _ => Vec3::ZERO,
            };
            vertices.push(Vertex::new(position, normal, uv));
        }

        match options.index_mode {
            IndexMode::OffsetBySubMesh => {
                indices.extend(raw.indices.iter().map(|index| index.saturating_add(base)));
            }
            IndexMode::Raw => indices.extend_from_slice(&raw.indices),
        }
    }

    Ok(MeshData::new(vertices, indices)?)
}

fn check_length(
    sub_mesh: usize,
    attribute: &'static str,
    values: Option<&[f32]>,
    expected: usize,
) -> Result<(), AssetError> {
    match values {
        Some(values) if values.len() != expected => Err(AssetError::AttributeLength {
            sub_mesh,
            attribute,
            expected,
            actual: values.len(),
        }),
        _ => Ok(()),
    }
}
