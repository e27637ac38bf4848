//! Common types shared between backends

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use std::fmt;

/// Kind of data a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data
    Vertex,
    /// 32-bit triangle-list indices
    Index,
}

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Texture filtering policy. Both variants sample from a full mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    /// Linear min/mag filtering, linear between mip levels
    #[default]
    Linear,
    /// Nearest min/mag filtering, nearest mip level
    Nearest,
}

/// One float-typed vertex attribute read from the current vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input slot
    pub index: u32,
    /// Number of 32-bit float components (1..=4)
    pub components: u32,
    /// Distance in bytes between consecutive vertices
    pub stride: u32,
    /// Byte offset of the first component inside a vertex
    pub offset: u64,
}

/// RGBA8 pixel data for a texture and all of its mip levels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// Level 0 first. Level `i` is `max(1, width >> i)` by `max(1, height >> i)` texels.
    pub levels: Vec<Vec<u8>>,
}

impl TextureImage {
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Dimensions of the given mip level
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

/// Clear color in linear RGBA
pub type ClearColor = [f32; 4];

/// Interleaved vertex with position, normal and UV
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub const POSITION_SLOT: u32 = 0;
    pub const NORMAL_SLOT: u32 = 1;
    pub const UV_SLOT: u32 = 2;

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Attribute layout matching the vertex attribute slots shaders declare
    pub fn attributes() -> [VertexAttribute; 3] {
        let stride = std::mem::size_of::<Self>() as u32;
        [
            VertexAttribute {
                index: Self::POSITION_SLOT,
                components: 3,
                stride,
                offset: std::mem::offset_of!(Vertex, position) as u64,
            },
            VertexAttribute {
                index: Self::NORMAL_SLOT,
                components: 3,
                stride,
                offset: std::mem::offset_of!(Vertex, normal) as u64,
            },
            VertexAttribute {
                index: Self::UV_SLOT,
                components: 2,
                stride,
                offset: std::mem::offset_of!(Vertex, uv) as u64,
            },
        ]
    }
}
