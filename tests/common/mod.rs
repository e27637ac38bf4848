//! Shared fixtures for the integration tests.
//!
//! Everything runs against [`RecordingBackend`], so no GPU is required. Files are
//! written into a per-test directory under the system temp dir.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};
use model_viewer::backend::recording::{Call, FailPoint, RecordingBackend};
use model_viewer::backend::{RenderContext, TextureFilter, TextureImage, Vertex};
use model_viewer::resources::{MeshData, Texture};

pub type TestContext = RenderContext<RecordingBackend>;

pub fn recording_context() -> TestContext {
    RenderContext::new(RecordingBackend::new())
}

pub fn failing_context(point: FailPoint) -> TestContext {
    RenderContext::new(RecordingBackend::new().fail_on(point))
}

pub fn calls(ctx: &TestContext) -> Vec<Call> {
    ctx.borrow().calls().to_vec()
}

/// Every created handle was released exactly once
pub fn assert_all_released(ctx: &TestContext) {
    let backend = ctx.borrow();
    assert_eq!(backend.live_resources(), 0, "leaked resources");
    assert_eq!(backend.invalid_releases(), 0, "double or unknown releases");
}

// ============================================================================
// Temp files
// ============================================================================

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Directory removed on drop
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "model-viewer-{}-{}-{}",
            name,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).expect("Failed to create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path.join(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    pub fn write_png(&self, name: &str, image: &RgbaImage) -> PathBuf {
        let path = self.path.join(name);
        image.save(&path).expect("Failed to write PNG fixture");
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Unit quad in the XY plane; texcoords equal the XY position
pub const QUAD_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

/// Two objects with one triangle each
pub const TWO_OBJECTS_OBJ: &str = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o second
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
";

/// One non-indexed triangle with positions and texcoords (0,0), (1,0), (0,1)
pub const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "buffers": [{
    "byteLength": 60,
    "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAIA/"
  }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 24 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }
  ],
  "meshes": [{
    "primitives": [{ "attributes": { "POSITION": 0, "TEXCOORD_0": 1 } }]
  }],
  "nodes": [{ "mesh": 0 }],
  "scenes": [{ "nodes": [0] }],
  "scene": 0
}"#;

pub const VERTEX_SHADER: &str = include_str!("../../shaders/vertex.glsl");
pub const FRAGMENT_SHADER: &str = include_str!("../../shaders/fragment.glsl");

pub fn quad_data() -> MeshData {
    let vertices = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        .into_iter()
        .map(|(x, y)| Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec2::new(x, y)))
        .collect();
    MeshData::new(vertices, vec![0, 1, 2, 0, 2, 3]).expect("valid quad")
}

pub fn solid_image(width: u32, height: u32) -> TextureImage {
    TextureImage::with_mipmaps(
        RgbaImage::from_pixel(width, height, Rgba([128, 64, 32, 255])),
        TextureFilter::Linear,
    )
}

pub fn solid_texture(ctx: &TestContext, unit: u32) -> Texture<RecordingBackend> {
    Texture::new(ctx, &solid_image(4, 4), unit, TextureFilter::Linear).expect("texture")
}
