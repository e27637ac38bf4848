use super::{AssetError, AssetLoader, RawAsset, RawSubMesh};
use std::path::Path;

/// Loads Wavefront `.obj` files, one sub-mesh per object/group
///
/// Faces are triangulated and attributes re-indexed to a single index stream.
/// Materials are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjLoader;

impl AssetLoader for ObjLoader {
    fn load(&self, path: &Path) -> Result<RawAsset, AssetError> {
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(path, &options).map_err(|source| AssetError::Obj {
            path: path.to_path_buf(),
            source,
        })?;

        let meshes = models
            .into_iter()
            .map(|model| {
                let mesh = model.mesh;
                log::debug!(
                    "OBJ object {:?}: {} vertices, {} indices",
                    model.name,
                    mesh.positions.len() / 3,
                    mesh.indices.len()
                );
                // OBJ measures V from the bottom of the image
                let texcoords = (!mesh.texcoords.is_empty()).then(|| {
                    mesh.texcoords
                        .chunks_exact(2)
                        .flat_map(|uv| [uv[0], 1.0 - uv[1]])
                        .collect()
                });
                let normals = (!mesh.normals.is_empty()).then_some(mesh.normals);
                RawSubMesh {
                    positions: mesh.positions,
                    texcoords,
                    normals,
                    indices: mesh.indices,
                }
            })
            .collect();

        Ok(RawAsset { meshes })
    }
}
