use super::{AssetError, AssetLoader, RawAsset, RawSubMesh};
use gltf::mesh::Mode;
use std::path::Path;

/// Loads `.gltf` and `.glb` files, one sub-mesh per triangle-list primitive
///
/// Node transforms are not applied; positions are taken as stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    fn load(&self, path: &Path) -> Result<RawAsset, AssetError> {
        let (document, buffers, _images) =
            gltf::import(path).map_err(|source| AssetError::Gltf {
                path: path.to_path_buf(),
                source,
            })?;

        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    return Err(AssetError::UnsupportedTopology {
                        mesh: mesh.index(),
                        primitive: primitive.index(),
                        mode: format!("{:?}", primitive.mode()),
                    });
                }

                let reader = primitive
                    .reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

                let positions: Vec<f32> = reader
                    .read_positions()
                    .ok_or(AssetError::MissingPositions {
                        mesh: mesh.index(),
                        primitive: primitive.index(),
                    })?
                    .flatten()
                    .collect();
                let vertex_count = positions.len() / 3;

                let texcoords = reader
                    .read_tex_coords(0)
                    .map(|coords| coords.into_f32().flatten().collect());
                let normals = reader.read_normals().map(|normals| normals.flatten().collect());
                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..vertex_count as u32).collect(),
                };

                log::debug!(
                    "glTF mesh {:?} primitive {}: {} vertices, {} indices",
                    mesh.name(),
                    primitive.index(),
                    vertex_count,
                    indices.len()
                );

                meshes.push(RawSubMesh {
                    positions,
                    texcoords,
                    normals,
                    indices,
                });
            }
        }

        Ok(RawAsset { meshes })
    }
}
