//! Asset loading from files through to uploaded meshes.

mod common;

use approx::assert_relative_eq;
use image::{Rgba, RgbaImage};
use rstest::rstest;

use common::{calls, recording_context, TempDir, QUAD_OBJ, TRIANGLE_GLTF, TWO_OBJECTS_OBJ};
use model_viewer::asset::{flatten, load_asset, AssetError, ConversionOptions, IndexMode};
use model_viewer::backend::recording::Call;
use model_viewer::backend::{TextureFilter, TextureImage};
use model_viewer::resources::Texture;
use model_viewer::scene::Model;
use model_viewer::ViewerError;

#[test]
fn test_obj_quad_end_to_end() {
    let dir = TempDir::new("obj-quad");
    let path = dir.write("quad.obj", QUAD_OBJ);

    let asset = load_asset(&path).unwrap();
    assert_eq!(asset.meshes.len(), 1);

    let data = flatten(&asset, &ConversionOptions::default()).unwrap();
    assert_eq!(data.vertex_count(), 4);
    assert_eq!(data.index_count(), 6);
    for vertex in data.vertices() {
        // OBJ and the flipped texture both measure V from the bottom
        assert_relative_eq!(vertex.uv.x, vertex.position.x);
        assert_relative_eq!(vertex.uv.y, vertex.position.y);
        assert_relative_eq!(vertex.normal.z, 1.0);
    }
}

#[rstest]
#[case::offset(IndexMode::OffsetBySubMesh, vec![0, 1, 2, 3, 4, 5])]
#[case::raw(IndexMode::Raw, vec![0, 1, 2, 0, 1, 2])]
fn test_obj_objects_become_sub_meshes(#[case] index_mode: IndexMode, #[case] expected: Vec<u32>) {
    let dir = TempDir::new("obj-objects");
    let path = dir.write("two.obj", TWO_OBJECTS_OBJ);

    let asset = load_asset(&path).unwrap();
    assert_eq!(asset.meshes.len(), 2);
    assert!(asset.meshes.iter().all(|mesh| mesh.texcoords.is_none()));

    let options = ConversionOptions {
        index_mode,
        ..Default::default()
    };
    let data = flatten(&asset, &options).unwrap();
    assert_eq!(data.indices(), expected.as_slice());
    assert!(data.vertices().iter().all(|v| v.uv == glam::Vec2::ZERO));
}

#[test]
fn test_gltf_triangle() {
    let dir = TempDir::new("gltf");
    let path = dir.write("triangle.gltf", TRIANGLE_GLTF);

    let asset = load_asset(&path).unwrap();
    assert_eq!(asset.meshes.len(), 1);
    let sub_mesh = &asset.meshes[0];
    assert_eq!(sub_mesh.vertex_count(), 3);
    assert!(sub_mesh.normals.is_none());
    // No index accessor: the primitive is drawn in vertex order
    assert_eq!(sub_mesh.indices, vec![0, 1, 2]);

    let data = flatten(&asset, &ConversionOptions::default()).unwrap();
    let uvs: Vec<_> = data.vertices().iter().map(|v| (v.uv.x, v.uv.y)).collect();
    assert_eq!(uvs, vec![(0.0, 1.0), (1.0, 1.0), (0.0, 0.0)]);
}

#[test]
fn test_missing_asset_file() {
    let dir = TempDir::new("missing-asset");
    let result = load_asset(&dir.path().join("car.glb"));
    assert!(matches!(result, Err(AssetError::Gltf { .. })));

    let result = load_asset(&dir.path().join("car.obj"));
    assert!(matches!(result, Err(AssetError::Obj { .. })));
}

#[test]
fn test_texture_rows_are_flipped() {
    let dir = TempDir::new("flip");
    let mut image = RgbaImage::new(1, 2);
    image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
    let path = dir.write_png("two_rows.png", &image);

    let texture = TextureImage::from_file(&path, TextureFilter::Nearest).unwrap();

    assert_eq!((texture.width, texture.height), (1, 2));
    assert_eq!(texture.level_count(), 2);
    // Bottom row of the file comes first
    assert_eq!(&texture.levels[0][..4], &[0, 0, 255, 255]);
    assert_eq!(&texture.levels[0][4..], &[255, 0, 0, 255]);
    assert_eq!(texture.levels[1].len(), 4);
}

#[test]
fn test_texture_upload_records_mip_chain() {
    let dir = TempDir::new("texture-upload");
    let path = dir.write_png("checker.png", &RgbaImage::new(16, 4));
    let ctx = recording_context();

    let texture = Texture::from_file(&ctx, &path, 2, TextureFilter::Linear).unwrap();

    assert_eq!(
        calls(&ctx),
        vec![Call::CreateTexture {
            texture: texture.handle(),
            unit: 2,
            filter: TextureFilter::Linear,
            width: 16,
            height: 4,
            levels: 5,
        }]
    );
    assert_eq!(ctx.borrow().texture_at(2), Some(texture.handle()));
}

#[test]
fn test_missing_texture_file() {
    let dir = TempDir::new("missing-texture");
    let ctx = recording_context();
    let result = Texture::from_file(&ctx, dir.path().join("nope.png"), 0, TextureFilter::Linear);
    assert!(matches!(result, Err(ViewerError::Image { .. })));
}

#[test]
fn test_model_load_from_files() {
    let dir = TempDir::new("model");
    let obj = dir.write("quad.obj", QUAD_OBJ);
    let png = dir.write_png("quad.png", &RgbaImage::new(8, 8));
    let ctx = recording_context();

    let model = Model::load(&ctx, &obj, &png, 0).unwrap();

    assert_eq!(model.mesh().data().triangle_count(), 2);
    assert_eq!((model.mesh().vertex_count(), model.mesh().index_count()), (4, 6));
    assert_eq!(model.mesh().texture().size(), (8, 8));
    assert_eq!(model.mesh().vertex_buffer().size(), 4 * 32);
    assert_eq!(ctx.borrow().live_resources(), 4);
}

#[test]
fn test_unsupported_model_format() {
    let dir = TempDir::new("unsupported");
    let fbx = dir.write("model.fbx", "");
    let png = dir.write_png("tex.png", &RgbaImage::new(1, 1));
    let ctx = recording_context();

    let result = Model::load(&ctx, &fbx, &png, 0);

    assert!(matches!(
        result,
        Err(ViewerError::Asset(AssetError::UnsupportedFormat(_)))
    ));
    assert_eq!(ctx.borrow().live_resources(), 0);
}
