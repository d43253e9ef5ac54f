//! Platform surfaces that a [`SwapchainWindowSystem`] presents to.
//!
//! [`SwapchainWindowSystem`]: crate::swapchain::SwapchainWindowSystem

use std::ffi::CStr;

use vkbench_core::CoreResult;
use vkbench_graphics::{VulkanInstance, VulkanState, vk};

/// The platform half of a swapchain backend: where the surface comes from
/// and how the user asks to quit.
pub trait NativeSystem {
    /// Instance extensions needed to create the surface.
    fn instance_extensions(&self) -> Vec<&'static CStr>;

    /// A queue family of `physical_device` that can present to this system,
    /// if there is one.
    fn presentation_queue_family_index(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Option<u32>;

    fn should_quit(&mut self) -> bool;

    /// Size of the surface; meaningful after `create_vk_surface`.
    fn vk_extent(&self) -> vk::Extent2D;

    /// Create the surface. The caller owns it and destroys it with the
    /// surface extension of `vulkan`'s instance.
    fn create_vk_surface(&mut self, vulkan: &VulkanState) -> CoreResult<vk::SurfaceKHR>;
}

/// The first queue family with at least one queue.
///
/// For surfaces that are not tied to a window, any queue can present; the
/// swapchain still checks surface support before creating itself.
pub fn first_queue_family(
    instance: &VulkanInstance,
    physical_device: vk::PhysicalDevice,
) -> Option<u32> {
    let families = unsafe {
        instance
            .instance
            .get_physical_device_queue_family_properties(physical_device)
    };
    families
        .iter()
        .position(|family| family.queue_count > 0)
        .map(|index| index as u32)
}

/// Window extent from the `--size` option, with `fallback` standing in for
/// fullscreen.
pub fn extent_from_size(size: (i32, i32), fallback: vk::Extent2D) -> vk::Extent2D {
    match size {
        (width, height) if width > 0 && height > 0 => vk::Extent2D {
            width: width as u32,
            height: height as u32,
        },
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FALLBACK: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    #[rstest]
    #[case::windowed((1024, 768), (1024, 768))]
    #[case::fullscreen((-1, -1), (800, 600))]
    #[case::zero((0, 10), (800, 600))]
    fn test_extent_from_size(#[case] size: (i32, i32), #[case] expected: (u32, u32)) {
        let extent = extent_from_size(size, FALLBACK);
        assert_eq!((extent.width, extent.height), expected);
    }
}
