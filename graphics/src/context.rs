//! The graphics context handed to scenes.

use crate::error::GraphicsError;
use crate::vulkan::VulkanState;

/// Either a real Vulkan device or a stand-in used where no GPU is needed.
///
/// Scenes that only exercise the benchmark machinery accept the dummy
/// context; anything that records commands asks for [`GpuContext::vulkan`].
pub enum GpuContext {
    Dummy,
    Vulkan(VulkanState),
}

impl GpuContext {
    pub fn vulkan(&self) -> Result<&VulkanState, GraphicsError> {
        match self {
            Self::Vulkan(state) => Ok(state),
            Self::Dummy => Err(GraphicsError::NoVulkanContext),
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, Self::Dummy)
    }
}

impl From<VulkanState> for GpuContext {
    fn from(state: VulkanState) -> Self {
        Self::Vulkan(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_context_has_no_device() {
        let ctx = GpuContext::Dummy;
        assert!(ctx.is_dummy());
        assert_eq!(ctx.vulkan().err(), Some(GraphicsError::NoVulkanContext));
    }
}
