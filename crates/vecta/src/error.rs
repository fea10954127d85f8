//! Engine error type

use thiserror::Error;
use vecta_core::GeometryError;
use vecta_gpu::{DeviceError, TessellationError};
use vecta_text::TextError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Tessellation(#[from] TessellationError),

    #[error(transparent)]
    Text(#[from] TextError),

    #[error("image {width}x{height} could not be staged as a texture")]
    TextureUnavailable { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, EngineError>;
