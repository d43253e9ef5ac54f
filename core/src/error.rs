//! Error types for benchmark orchestration.

use thiserror::Error;
use vkbench_graphics::GraphicsError;

/// Errors raised while selecting a window system or running scenes.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    #[error("{0}")]
    WindowSystem(String),
    #[error("no usable window system found, try specifying search directory")]
    NoUsableWindowSystem,
    #[error("Failed to load window system '{0}'")]
    WindowSystemNotFound(String),
    #[error("Invalid window system option '{0}'")]
    InvalidWindowSystemOption(String),
    #[error("Invalid value '{value}' for option '{name}'")]
    InvalidOptionValue { name: String, value: String },
    #[error("{0}")]
    Scene(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
