//! # vkbench graphics
//!
//! Vulkan plumbing shared by the benchmark core, the window systems and the
//! scenes.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`VulkanState`] - instance, device, queue, command pool and allocator
//! - [`VulkanWsi`] - what a window system requires from device creation
//! - [`VulkanImage`] - a render target with its synchronization handles
//! - [`GpuContext`] - the context scenes draw with, with a dummy variant for tests
//! - [`DeviceUuid`] - device selection by pipeline cache UUID

pub mod context;
pub mod error;
pub mod format;
pub mod image;
pub mod uuid;
pub mod vulkan;
pub mod wsi;

pub use ash;
pub use ash::vk;

pub use context::GpuContext;
pub use error::GraphicsError;
pub use image::VulkanImage;
pub use uuid::DeviceUuid;
pub use vulkan::{PhysicalDeviceStrategy, VulkanState};
pub use wsi::{Extensions, VulkanInstance, VulkanWsi};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
