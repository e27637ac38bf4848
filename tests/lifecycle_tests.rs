//! Resource ownership tests: every device object is released exactly once,
//! including when construction fails part way through.

mod common;

use rstest::rstest;

use common::{
    assert_all_released, calls, failing_context, quad_data, recording_context, solid_texture,
    TempDir, QUAD_OBJ,
};
use model_viewer::asset::{ConversionOptions, DefaultLoader};
use model_viewer::backend::recording::{Call, FailPoint};
use model_viewer::backend::{BackendError, BufferTarget, ShaderStage};
use model_viewer::resources::{GpuBuffer, Mesh, ShaderProgram, VertexLayout};
use model_viewer::scene::Model;
use model_viewer::{Viewer, ViewerConfig, ViewerError};

#[test]
fn test_each_resource_released_once() {
    let ctx = recording_context();
    {
        let _program = ShaderProgram::from_sources(&ctx, "", "").unwrap();
        let _buffer = GpuBuffer::new(&ctx, BufferTarget::Vertex, &[0; 16]).unwrap();
        let _layout = VertexLayout::new(&ctx).unwrap();
        let _texture = solid_texture(&ctx, 0);
        assert_eq!(ctx.borrow().live_resources(), 4);
    }
    assert_all_released(&ctx);
}

#[test]
fn test_mesh_creation_order() {
    let ctx = recording_context();
    let texture = solid_texture(&ctx, 0);
    ctx.borrow_mut().clear_calls();

    let mesh = Mesh::new(&ctx, quad_data(), texture).unwrap();
    let layout = mesh.layout().handle();
    let recorded = calls(&ctx);

    assert_eq!(recorded[0], Call::CreateVertexLayout(layout));
    assert_eq!(recorded[1], Call::BindVertexLayout(Some(layout)));
    assert!(matches!(
        recorded[2],
        Call::CreateBuffer { target: BufferTarget::Vertex, size: 128, .. }
    ));
    assert!(matches!(
        recorded[3],
        Call::CreateBuffer { target: BufferTarget::Index, size: 24, .. }
    ));
    let attributes: Vec<_> = recorded[4..7]
        .iter()
        .map(|call| match call {
            Call::SetVertexAttribute { layout: l, attribute } => {
                assert_eq!(*l, layout);
                (attribute.index, attribute.components, attribute.stride, attribute.offset)
            }
            other => panic!("expected attribute setup, got {other:?}"),
        })
        .collect();
    assert_eq!(attributes, vec![(0, 3, 32, 0), (1, 3, 32, 12), (2, 2, 32, 24)]);
    assert_eq!(recorded[7], Call::BindVertexLayout(None));
    assert_eq!(recorded.len(), 8);

    // The layout captured both buffers while bound
    let backend = ctx.borrow();
    let state = backend.layout_state(layout).unwrap();
    assert_eq!(state.vertex_buffer, Some(mesh.vertex_buffer().handle()));
    assert_eq!(state.index_buffer, Some(mesh.index_buffer().handle()));
    assert_eq!(backend.bound_layout(), None);
}

#[test]
fn test_mesh_teardown_order() {
    let ctx = recording_context();
    let mesh = Mesh::new(&ctx, quad_data(), solid_texture(&ctx, 0)).unwrap();
    let layout = mesh.layout().handle();
    let vbo = mesh.vertex_buffer().handle();
    let ebo = mesh.index_buffer().handle();
    let texture = mesh.texture().handle();
    ctx.borrow_mut().clear_calls();

    drop(mesh);

    assert_eq!(
        calls(&ctx),
        vec![
            Call::DestroyVertexLayout(layout),
            Call::DestroyBuffer(vbo),
            Call::DestroyBuffer(ebo),
            Call::DestroyTexture(texture),
        ]
    );
    assert_all_released(&ctx);
}

#[rstest]
#[case::layout(FailPoint::VertexLayout)]
#[case::vertex_buffer(FailPoint::Buffer(0))]
#[case::index_buffer(FailPoint::Buffer(1))]
fn test_failed_mesh_releases_partial_resources(#[case] point: FailPoint) {
    let ctx = failing_context(point);
    let texture = solid_texture(&ctx, 0);

    let result = Mesh::new(&ctx, quad_data(), texture);

    assert!(result.is_err());
    assert_all_released(&ctx);
}

#[rstest]
#[case::vertex(FailPoint::Compile(ShaderStage::Vertex), ShaderStage::Vertex)]
#[case::fragment(FailPoint::Compile(ShaderStage::Fragment), ShaderStage::Fragment)]
fn test_compile_error_names_stage(#[case] point: FailPoint, #[case] expected: ShaderStage) {
    let ctx = failing_context(point);
    match ShaderProgram::from_sources(&ctx, "", "") {
        Err(BackendError::ShaderCompilationFailed { stage, log }) => {
            assert_eq!(stage, expected);
            assert!(!log.is_empty());
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("compilation should fail"),
    }
    assert_all_released(&ctx);
}

#[test]
fn test_compile_error_message_is_tagged() {
    let error = BackendError::ShaderCompilationFailed {
        stage: ShaderStage::Fragment,
        log: "0:3: syntax error".into(),
    };
    assert!(error.to_string().starts_with("fragment shader compilation failed"));
}

#[test]
fn test_link_error_propagates() {
    let ctx = failing_context(FailPoint::Link);
    let result = ShaderProgram::from_sources(&ctx, "", "");
    assert!(matches!(result, Err(BackendError::ProgramLinkFailed(_))));
}

#[test]
fn test_missing_shader_file_is_io_error() {
    let dir = TempDir::new("missing-shader");
    let ctx = recording_context();
    let result = ShaderProgram::from_files(
        &ctx,
        dir.path().join("nope.vert"),
        dir.path().join("nope.frag"),
    );
    match result {
        Err(ViewerError::Io { path, .. }) => assert!(path.ends_with("nope.vert")),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("loading should fail"),
    }
    assert_eq!(ctx.borrow().calls().len(), 0);
}

#[test]
fn test_failed_texture_releases_nothing_else() {
    let dir = TempDir::new("texture-fail");
    let obj = dir.write("quad.obj", QUAD_OBJ);
    let png = dir.write_png("quad.png", &image::RgbaImage::new(2, 2));
    let ctx = failing_context(FailPoint::Texture);

    let options = ConversionOptions::default();
    let result = Model::load_with(&ctx, &DefaultLoader, &obj, &png, 0, &options);

    assert!(matches!(
        result,
        Err(ViewerError::Backend(BackendError::TextureCreationFailed(_)))
    ));
    assert_all_released(&ctx);
}

#[test]
fn test_viewer_setup_failure_unwinds() {
    let dir = TempDir::new("viewer-fail");
    let config = ViewerConfig {
        vertex_shader: dir.write("vertex.glsl", common::VERTEX_SHADER),
        fragment_shader: dir.write("fragment.glsl", common::FRAGMENT_SHADER),
        model_path: dir.write("quad.obj", QUAD_OBJ),
        texture_path: dir.write_png("quad.png", &image::RgbaImage::new(2, 2)),
        ..Default::default()
    };
    // The program and texture exist by the time the index buffer fails
    let ctx = failing_context(FailPoint::Buffer(1));

    let result = Viewer::new(&ctx, &config);

    assert!(matches!(
        result,
        Err(ViewerError::Backend(BackendError::BufferCreationFailed(_)))
    ));
    assert_all_released(&ctx);
}

#[test]
fn test_viewer_teardown_releases_everything() {
    let dir = TempDir::new("viewer-drop");
    let config = ViewerConfig {
        vertex_shader: dir.write("vertex.glsl", common::VERTEX_SHADER),
        fragment_shader: dir.write("fragment.glsl", common::FRAGMENT_SHADER),
        model_path: dir.write("quad.obj", QUAD_OBJ),
        texture_path: dir.write_png("quad.png", &image::RgbaImage::new(2, 2)),
        ..Default::default()
    };
    let ctx = recording_context();

    let viewer = Viewer::new(&ctx, &config).unwrap();
    assert_eq!(ctx.borrow().live_resources(), 5);
    let program = viewer.shader().handle();
    drop(viewer);

    assert_eq!(calls(&ctx).last(), Some(&Call::DestroyProgram(program)));
    assert_all_released(&ctx);
}
