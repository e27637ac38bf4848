//! Immutable GPU buffers

use crate::backend::traits::*;
use crate::backend::types::BufferTarget;

/// A vertex or index buffer uploaded once at creation
pub struct GpuBuffer<B: GraphicsBackend> {
    context: RenderContext<B>,
    handle: BufferHandle,
    target: BufferTarget,
    size: usize,
}

impl<B: GraphicsBackend> GpuBuffer<B> {
    pub fn new(
        context: &RenderContext<B>,
        target: BufferTarget,
        data: &[u8],
    ) -> BackendResult<Self> {
        let handle = context.borrow_mut().create_buffer(target, data)?;
        Ok(Self {
            context: context.clone(),
            handle,
            target,
            size: data.len(),
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<B: GraphicsBackend> Drop for GpuBuffer<B> {
    fn drop(&mut self) {
        let handle = self.handle;
        self.context
            .release("buffer", |backend| backend.destroy_buffer(handle));
    }
}
