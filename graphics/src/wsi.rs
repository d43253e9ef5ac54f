//! The contract between a window system and Vulkan device creation.

use std::ffi::CStr;

use ash::vk;

/// Extensions a window system needs enabled on the instance and device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    pub instance: Vec<&'static CStr>,
    pub device: Vec<&'static CStr>,
}

/// Loader entry points and an instance, shared with window systems while
/// they make device selection decisions.
#[derive(Clone)]
pub struct VulkanInstance {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
}

/// What a window system must answer before a device can be created for it.
pub trait VulkanWsi {
    fn required_extensions(&self) -> Extensions;

    fn is_physical_device_supported(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> bool;

    /// Extra queue families the device must expose for presentation.
    fn physical_device_queue_family_indices(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<u32>;
}
