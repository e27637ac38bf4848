//! Top-level error type

use crate::asset::AssetError;
use crate::backend::BackendError;
use crate::resources::MeshError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("Event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
