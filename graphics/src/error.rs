//! Graphics error types.

use std::fmt;

use ash::vk;

/// Errors that can occur while setting up or driving the Vulkan device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    InitializationFailed(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// A requested feature is not supported.
    FeatureNotSupported(String),
    /// No physical device matched the selection strategy.
    NoDevice(String),
    /// The GPU device was lost.
    DeviceLost,
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// The operation needs a real Vulkan device but the context has none.
    NoVulkanContext,
    /// An internal error occurred.
    Internal(String),
}

impl GraphicsError {
    /// Wraps a failed Vulkan call, naming the operation that failed.
    pub fn vk(what: &str, result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            other => Self::Internal(format!("{what}: {other:?}")),
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::NoDevice(msg) => write!(f, "{msg}"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::NoVulkanContext => write!(f, "no Vulkan device available in this context"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}
