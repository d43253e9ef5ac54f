//! Presentation to a `VK_EXT_headless_surface`, for drivers that support it
//! without any display.

use std::ffi::CStr;

use vkbench_core::{CoreResult, Options, PROBE_BAD, WindowSystem, WindowSystemPlugin};
use vkbench_graphics::{GraphicsError, VulkanInstance, VulkanState, ash, vk};

use crate::native::{NativeSystem, extent_from_size, first_queue_family};
use crate::swapchain::SwapchainWindowSystem;

const DEFAULT_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

pub struct HeadlessNativeSystem {
    extent: vk::Extent2D,
}

impl HeadlessNativeSystem {
    pub fn new(extent: vk::Extent2D) -> Self {
        Self { extent }
    }
}

impl NativeSystem for HeadlessNativeSystem {
    fn instance_extensions(&self) -> Vec<&'static CStr> {
        vec![ash::ext::headless_surface::NAME]
    }

    fn presentation_queue_family_index(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Option<u32> {
        first_queue_family(instance, physical_device)
    }

    fn should_quit(&mut self) -> bool {
        false
    }

    fn vk_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn create_vk_surface(&mut self, vulkan: &VulkanState) -> CoreResult<vk::SurfaceKHR> {
        let loader = ash::ext::headless_surface::Instance::new(vulkan.entry(), vulkan.instance());
        let info = vk::HeadlessSurfaceCreateInfoEXT::default();
        let surface = unsafe { loader.create_headless_surface(&info, None) }
            .map_err(|e| GraphicsError::vk("Failed to create headless surface", e))?;
        Ok(surface)
    }
}

fn create(options: &Options) -> CoreResult<Box<dyn WindowSystem>> {
    let native = HeadlessNativeSystem::new(extent_from_size(options.size, DEFAULT_EXTENT));
    Ok(Box::new(SwapchainWindowSystem::new(
        Box::new(native),
        options.present_mode,
        options.pixel_format,
    )))
}

/// Never chosen by probing; only used when asked for with `--winsys`.
pub const PLUGIN: WindowSystemPlugin = WindowSystemPlugin {
    name: "headless",
    load_options: |_| {},
    probe: |_| PROBE_BAD,
    create,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_never_probes() {
        assert_eq!((PLUGIN.probe)(&Options::default()), PROBE_BAD);
    }

    #[test]
    fn test_headless_native() {
        let mut native = HeadlessNativeSystem::new(vk::Extent2D {
            width: 320,
            height: 200,
        });
        assert_eq!(native.instance_extensions(), vec![c"VK_EXT_headless_surface"]);
        assert_eq!(native.vk_extent().width, 320);
        assert!(!native.should_quit());
    }
}
