//! Scene: camera and model

mod camera;
mod model;

pub use camera::*;
pub use model::*;
