//! GPU resources
//!
//! Each type owns exactly one device object (or, for [`Mesh`], a fixed set of them)
//! and releases it when dropped.

mod buffer;
mod mesh;
mod shader;
mod texture;
mod vertex_layout;

pub use buffer::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;
pub use vertex_layout::*;
