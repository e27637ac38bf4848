//! Mesh data and drawable meshes

use crate::backend::traits::*;
use crate::backend::types::{BufferTarget, Vertex};
use crate::resources::{GpuBuffer, ShaderProgram, Texture, VertexLayout, TEXTURE_UNIFORM};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("Index count {0} is not a multiple of 3")]
    NotTriangleList(usize),
    #[error("Index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// Validated triangle-list geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshData {
    /// Every index must reference a vertex and the index count must be a multiple of 3
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::NotTriangleList(indices.len()));
        }
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|(_, index)| **index as usize >= vertices.len())
        {
            return Err(MeshError::IndexOutOfRange {
                position,
                index,
                vertex_count: vertices.len(),
            });
        }
        Ok(Self { vertices, indices })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// One drawable primitive: geometry, its GPU buffers and layout, and its texture
pub struct Mesh<B: GraphicsBackend> {
    context: RenderContext<B>,
    data: MeshData,
    layout: VertexLayout<B>,
    vertex_buffer: GpuBuffer<B>,
    index_buffer: GpuBuffer<B>,
    texture: Texture<B>,
}

impl<B: GraphicsBackend> Mesh<B> {
    /// Upload geometry and configure the position/normal/uv attributes
    ///
    /// Anything created before a failure is released on the way out.
    pub fn new(
        context: &RenderContext<B>,
        data: MeshData,
        texture: Texture<B>,
    ) -> BackendResult<Self> {
        let layout = VertexLayout::new(context)?;
        layout.bind();

        let vertex_buffer = GpuBuffer::new(context, BufferTarget::Vertex, data.vertex_bytes())?;
        let index_buffer = GpuBuffer::new(context, BufferTarget::Index, data.index_bytes())?;

        for attribute in Vertex::attributes() {
            layout.set_data(
                attribute.index,
                attribute.components,
                attribute.stride,
                attribute.offset,
            );
        }
        layout.unbind();

        log::debug!(
            "Uploaded mesh: {} vertices, {} triangles",
            data.vertex_count(),
            data.triangle_count()
        );

        Ok(Self {
            context: context.clone(),
            data,
            layout,
            vertex_buffer,
            index_buffer,
            texture,
        })
    }

    /// Bind texture and layout, then issue one indexed draw over all indices
    pub fn draw(&self, shader: &ShaderProgram<B>) -> BackendResult<()> {
        self.texture.bind();
        shader.use_program();
        shader.set_uniform_integer(TEXTURE_UNIFORM, self.texture.unit() as i32);

        self.layout.bind();
        let result = draw_count(self.data.index_count())
            .and_then(|count| self.context.borrow_mut().draw_indexed(count));
        self.layout.unbind();
        result
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    pub fn vertex_count(&self) -> usize {
        self.data.vertex_count()
    }

    pub fn index_count(&self) -> usize {
        self.data.index_count()
    }

    pub fn texture(&self) -> &Texture<B> {
        &self.texture
    }

    pub fn vertex_buffer(&self) -> &GpuBuffer<B> {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &GpuBuffer<B> {
        &self.index_buffer
    }

    pub fn layout(&self) -> &VertexLayout<B> {
        &self.layout
    }
}

/// Index counts past `u32::MAX` cannot be issued in one draw
fn draw_count(index_count: usize) -> BackendResult<u32> {
    u32::try_from(index_count).map_err(|_| {
        BackendError::InvalidState(format!("{index_count} indices exceed a single draw"))
    })
}
