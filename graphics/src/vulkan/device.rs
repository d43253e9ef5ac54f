//! Vulkan physical and logical device management.

use std::ffi::{CStr, c_char};

use ash::vk;

use crate::error::GraphicsError;
use crate::uuid::DeviceUuid;
use crate::wsi::{VulkanInstance, VulkanWsi};

/// How to pick a physical device among those the window system supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhysicalDeviceStrategy {
    /// The first device exposing a graphics queue.
    #[default]
    FirstSupported,
    /// The device whose pipeline cache UUID matches.
    ByUuid(DeviceUuid),
}

/// The pipeline cache UUID of a physical device.
pub fn device_uuid(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> DeviceUuid {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    DeviceUuid::from_bytes(properties.pipeline_cache_uuid)
}

/// Physical devices the window system can present from.
pub fn available_devices(
    vk_instance: &VulkanInstance,
    wsi: &dyn VulkanWsi,
) -> Result<Vec<vk::PhysicalDevice>, GraphicsError> {
    let instance = &vk_instance.instance;
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!(
            "Failed to enumerate physical devices: {:?}",
            e
        ))
    })?;

    Ok(devices
        .into_iter()
        .filter(|&device| {
            let supported = wsi.is_physical_device_supported(vk_instance, device);
            if !supported {
                log::debug!(
                    "Device with uuid {} is not supported by window system integration layer",
                    device_uuid(instance, device)
                );
            }
            supported
        })
        .collect())
}

/// Pick a physical device from `devices` according to `strategy`.
pub fn select_physical_device(
    instance: &ash::Instance,
    devices: &[vk::PhysicalDevice],
    strategy: PhysicalDeviceStrategy,
) -> Result<vk::PhysicalDevice, GraphicsError> {
    match strategy {
        PhysicalDeviceStrategy::FirstSupported => {
            log::debug!("Trying to use first supported device");
            for &device in devices {
                if find_graphics_queue_family(instance, device).is_some() {
                    log::debug!("First supported device chosen");
                    return Ok(device);
                }
                log::debug!(
                    "Device with uuid {} skipped",
                    device_uuid(instance, device)
                );
            }
            Err(GraphicsError::NoDevice(
                "No suitable Vulkan physical devices found".to_string(),
            ))
        }
        PhysicalDeviceStrategy::ByUuid(uuid) => {
            log::debug!("Trying to use device with specified UUID {}", uuid);
            // A device the window system rejects shows up in --list-devices
            // but is not selectable here.
            devices
                .iter()
                .copied()
                .find(|&device| device_uuid(instance, device) == uuid)
                .inspect(|_| log::debug!("Device found by UUID"))
                .ok_or_else(|| {
                    GraphicsError::NoDevice(
                        "Device specified by uuid is not available".to_string(),
                    )
                })
        }
    }
}

/// Find a queue family that supports graphics operations.
pub fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Option<u32> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    queue_families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

/// Create a logical device with one queue from the graphics family and from
/// each family the window system asked for.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_queue_family: u32,
    wsi_queue_families: &[u32],
    device_extensions: &[&CStr],
) -> Result<ash::Device, GraphicsError> {
    if let Some(first) = wsi_queue_families.first() {
        log::debug!(
            "VulkanState: Using queue family index {} for WSI operations",
            first
        );
    }
    log::debug!(
        "VulkanState: Using queue family index {} for rendering",
        graphics_queue_family
    );

    let mut families = wsi_queue_families.to_vec();
    families.push(graphics_queue_family);
    families.sort_unstable();
    families.dedup();

    let queue_priorities = [1.0f32];
    let queue_create_infos: Vec<_> = families
        .iter()
        .map(|&index| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(index)
                .queue_priorities(&queue_priorities)
        })
        .collect();

    let extensions: Vec<*const c_char> = device_extensions.iter().map(|e| e.as_ptr()).collect();

    let supported = unsafe { instance.get_physical_device_features(physical_device) };
    let features =
        vk::PhysicalDeviceFeatures::default().sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    let device =
        unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
        })?;

    Ok(device)
}
