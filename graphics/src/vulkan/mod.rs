//! Vulkan device state shared by window systems and scenes.
//!
//! [`VulkanState`] owns the instance, the selected physical device, the
//! logical device with its graphics queue, a command pool and the memory
//! allocator. It is created once from the window system's [`VulkanWsi`]
//! requirements and lives until the benchmark run ends.

pub mod allocator;
pub mod barriers;
pub mod command;
mod debug;
pub mod device;
pub mod instance;
pub mod sync;

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::uuid::DeviceUuid;
use crate::wsi::{VulkanInstance, VulkanWsi};

pub use device::PhysicalDeviceStrategy;

/// The Vulkan objects every benchmark component works against.
pub struct VulkanState {
    vk_instance: VulkanInstance,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    graphics_queue_family_index: u32,
    graphics_queue: vk::Queue,
    command_pool: vk::CommandPool,
    allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
}

impl VulkanState {
    /// Create the instance, pick a device with `strategy` among the devices
    /// `wsi` supports and create the logical device.
    pub fn new(
        wsi: &dyn VulkanWsi,
        strategy: PhysicalDeviceStrategy,
        debug: bool,
    ) -> Result<Self, GraphicsError> {
        let entry = instance::load_entry()?;
        let extensions = wsi.required_extensions();
        let (instance, debug_messenger) =
            instance::create_instance(&entry, &extensions.instance, debug)?;
        let vk_instance = VulkanInstance { entry, instance };

        // Everything below is destroyed by the partially built state on error.
        let mut partial = PartialState {
            vk_instance: &vk_instance,
            debug_messenger: debug_messenger.as_ref(),
            device: None,
            command_pool: vk::CommandPool::null(),
            armed: true,
        };

        let devices = device::available_devices(&vk_instance, wsi)?;
        let physical_device =
            device::select_physical_device(&vk_instance.instance, &devices, strategy)?;

        let graphics_queue_family_index =
            device::find_graphics_queue_family(&vk_instance.instance, physical_device)
                .ok_or_else(|| {
                    GraphicsError::InitializationFailed(
                        "selected physical device does not provide graphics queue".to_string(),
                    )
                })?;

        let wsi_families =
            wsi.physical_device_queue_family_indices(&vk_instance, physical_device);
        let device = device::create_logical_device(
            &vk_instance.instance,
            physical_device,
            graphics_queue_family_index,
            &wsi_families,
            &extensions.device,
        )?;
        partial.device = Some(device.clone());

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family_index, 0) };
        let command_pool = command::create_command_pool(&device, graphics_queue_family_index)?;
        partial.command_pool = command_pool;

        let allocator =
            allocator::create_allocator(&vk_instance.instance, physical_device, device.clone())?;

        partial.disarm();
        Ok(Self {
            vk_instance,
            debug_messenger,
            physical_device,
            device,
            graphics_queue_family_index,
            graphics_queue,
            command_pool,
            allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.vk_instance.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.vk_instance.instance
    }

    pub fn vulkan_instance(&self) -> &VulkanInstance {
        &self.vk_instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn graphics_queue_family_index(&self) -> u32 {
        self.graphics_queue_family_index
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn allocator(&self) -> &Arc<Mutex<Allocator>> {
        &self.allocator
    }

    /// Wait until the device has finished all submitted work.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| GraphicsError::vk("Failed to wait for device idle", e))
    }

    /// Log the selected device.
    pub fn log_info(&self) {
        log_device_info(self.instance(), self.physical_device);
    }

    /// Log every physical device, whether or not the window system supports it.
    pub fn log_all_devices(&self) -> Result<(), GraphicsError> {
        let devices = unsafe { self.instance().enumerate_physical_devices() }.map_err(|e| {
            GraphicsError::InitializationFailed(format!(
                "Failed to enumerate physical devices: {:?}",
                e
            ))
        })?;

        for (i, &device) in devices.iter().enumerate() {
            log::info!("=== Physical Device {} ===", i);
            log_device_info(self.instance(), device);
        }
        Ok(())
    }
}

fn log_device_info(instance: &ash::Instance, physical_device: vk::PhysicalDevice) {
    let props = unsafe { instance.get_physical_device_properties(physical_device) };
    let name = props
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    log::info!("    Vendor ID:      0x{:X}", props.vendor_id);
    log::info!("    Device ID:      0x{:X}", props.device_id);
    log::info!("    Device Name:    {}", name);
    log::info!("    Driver Version: {}", props.driver_version);
    log::info!(
        "    Device UUID:    {}",
        DeviceUuid::from_bytes(props.pipeline_cache_uuid)
    );
}

impl Drop for VulkanState {
    fn drop(&mut self) {
        // SAFETY: window systems and scenes release their resources before
        // the state drops, and the device is idle after the wait.
        unsafe {
            let _ = self.device.device_wait_idle();

            // The allocator frees its memory blocks through the device, so it
            // has to go before the device does.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);

            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.vk_instance.instance.destroy_instance(None);
        }
    }
}

/// Cleans up a half-constructed [`VulkanState`] when construction bails out.
struct PartialState<'a> {
    vk_instance: &'a VulkanInstance,
    debug_messenger: Option<&'a (ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    device: Option<ash::Device>,
    command_pool: vk::CommandPool,
    armed: bool,
}

impl PartialState<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialState<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // SAFETY: nothing was submitted to the half-built device yet.
        unsafe {
            if let Some(device) = self.device.take() {
                if self.command_pool != vk::CommandPool::null() {
                    device.destroy_command_pool(self.command_pool, None);
                }
                device.destroy_device(None);
            }
            if let Some((debug_utils, messenger)) = self.debug_messenger {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.vk_instance.instance.destroy_instance(None);
        }
    }
}
