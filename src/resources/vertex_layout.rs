//! Vertex layout objects

use crate::backend::traits::*;
use crate::backend::types::VertexAttribute;

/// Describes how bytes of the current vertex buffer map onto shader inputs
pub struct VertexLayout<B: GraphicsBackend> {
    context: RenderContext<B>,
    handle: VertexLayoutHandle,
}

impl<B: GraphicsBackend> VertexLayout<B> {
    pub fn new(context: &RenderContext<B>) -> BackendResult<Self> {
        let handle = context.borrow_mut().create_vertex_layout().map_err(|e| {
            log::error!("{e}");
            e
        })?;
        Ok(Self {
            context: context.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> VertexLayoutHandle {
        self.handle
    }

    /// Declare and enable a float attribute. The layout must be bound.
    pub fn set_data(&self, index: u32, components: u32, stride: u32, offset: u64) {
        self.context
            .borrow_mut()
            .set_vertex_attribute(&VertexAttribute {
                index,
                components,
                stride,
                offset,
            });
    }

    pub fn bind(&self) {
        self.context.borrow_mut().bind_vertex_layout(Some(self.handle));
    }

    pub fn unbind(&self) {
        self.context.borrow_mut().bind_vertex_layout(None);
    }
}

impl<B: GraphicsBackend> Drop for VertexLayout<B> {
    fn drop(&mut self) {
        let handle = self.handle;
        self.context
            .release("vertex layout", |backend| backend.destroy_vertex_layout(handle));
    }
}
