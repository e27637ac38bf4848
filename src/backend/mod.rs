//! Backend abstraction layer
//!
//! Provides the device trait the viewer talks to, the wgpu implementation used at
//! runtime and a recording implementation used by tests.

pub mod recording;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;
