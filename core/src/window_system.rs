//! The acquire/draw/present contract every window system backend offers.

use vkbench_graphics::{VulkanImage, VulkanState, VulkanWsi};

use crate::error::CoreResult;

/// A presentation backend.
///
/// The device is created from [`WindowSystem::vulkan_wsi`], then the backend
/// gets `init_vulkan` once and `deinit_vulkan` once before the device goes
/// away. All images and surfaces the backend makes live inside that bracket.
pub trait WindowSystem {
    fn vulkan_wsi(&self) -> &dyn VulkanWsi;

    fn init_vulkan(&mut self, vulkan: &VulkanState) -> CoreResult<()>;

    /// Release everything made in `init_vulkan`. Waits for the device to go
    /// idle and is a no-op when `init_vulkan` never ran.
    fn deinit_vulkan(&mut self);

    /// Acquire the next image to render into.
    fn next_vulkan_image(&mut self) -> CoreResult<VulkanImage>;

    /// Display `image` once the semaphore (or fence) attached to it signals.
    fn present_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()>;

    /// Give back an image from `next_vulkan_image` that will not be presented,
    /// e.g. because drawing into it failed. Consumes the image's semaphore and
    /// signals its fence so the slot can be acquired again.
    fn recycle_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()>;

    /// Every image the backend cycles through, without synchronization.
    fn vulkan_images(&self) -> Vec<VulkanImage>;

    /// Non-blocking poll for a user request to quit.
    fn should_quit(&mut self) -> bool;
}
