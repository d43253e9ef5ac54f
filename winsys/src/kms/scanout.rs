//! Vulkan images the display controller can scan out.
//!
//! Each image is linear and backed by dedicated memory exported as a dma-buf.
//! The dma-buf is imported into the card as a GEM handle and wrapped in a DRM
//! framebuffer.

use std::os::fd::{AsFd, FromRawFd, OwnedFd};
use std::rc::Rc;

use drm::buffer::{self, DrmFourcc};
use drm::control::{Device as ControlDevice, framebuffer};

use vkbench_core::{CoreError, CoreResult};
use vkbench_graphics::{GraphicsError, VulkanState, ash, vk};

use super::card::{Card, drm_error};

/// Scanout format; matches `DrmFourcc::Xrgb8888` byte for byte.
pub const SCANOUT_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
pub const SCANOUT_IMAGE_COUNT: usize = 2;
const SCANOUT_DEPTH: u32 = 24;
const SCANOUT_BPP: u32 = 32;

/// First memory type allowed by `type_bits` that has all of `flags`.
pub fn memory_type_index(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..properties.memory_type_count).find(|&i| {
        type_bits & (1 << i) != 0
            && properties.memory_types[i as usize]
                .property_flags
                .contains(flags)
    })
}

/// A GEM buffer as `add_framebuffer` sees it.
struct GemBuffer {
    handle: buffer::Handle,
    size: (u32, u32),
    pitch: u32,
}

impl buffer::Buffer for GemBuffer {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn format(&self) -> DrmFourcc {
        DrmFourcc::Xrgb8888
    }

    fn pitch(&self) -> u32 {
        self.pitch
    }

    fn handle(&self) -> buffer::Handle {
        self.handle
    }
}

/// A Vulkan image shared with the display controller.
pub struct ScanoutImage {
    device: ash::Device,
    card: Rc<Card>,
    pub image: vk::Image,
    memory: vk::DeviceMemory,
    gem: Option<buffer::Handle>,
    framebuffer: Option<framebuffer::Handle>,
}

impl ScanoutImage {
    pub fn new(vulkan: &VulkanState, card: &Rc<Card>, extent: vk::Extent2D) -> CoreResult<Self> {
        let device = vulkan.device();

        let mut external_info = vk::ExternalMemoryImageCreateInfo::default()
            .handle_types(vk::ExternalMemoryHandleTypeFlags::DMA_BUF_EXT);
        let image_info = vk::ImageCreateInfo::default()
            .push_next(&mut external_info)
            .image_type(vk::ImageType::TYPE_2D)
            .format(SCANOUT_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::LINEAR)
            .usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        // SAFETY: `scanout` takes ownership right after and destroys the image.
        let image = unsafe { device.create_image(&image_info, None) }
            .map_err(|e| GraphicsError::vk("Failed to create scanout image", e))?;

        // From here on, drop releases whatever was created.
        let mut scanout = Self {
            device: device.clone(),
            card: Rc::clone(card),
            image,
            memory: vk::DeviceMemory::null(),
            gem: None,
            framebuffer: None,
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_properties = unsafe {
            vulkan
                .instance()
                .get_physical_device_memory_properties(vulkan.physical_device())
        };
        let memory_type = memory_type_index(
            &memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .ok_or_else(|| CoreError::WindowSystem("Couldn't find matching memory type".to_string()))?;

        let mut export_info = vk::ExportMemoryAllocateInfo::default()
            .handle_types(vk::ExternalMemoryHandleTypeFlags::DMA_BUF_EXT);
        let mut dedicated_info = vk::MemoryDedicatedAllocateInfo::default().image(image);
        let allocate_info = vk::MemoryAllocateInfo::default()
            .push_next(&mut export_info)
            .push_next(&mut dedicated_info)
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        // SAFETY: the image is unbound and the dedicated allocation names it.
        scanout.memory = unsafe { device.allocate_memory(&allocate_info, None) }
            .map_err(|e| GraphicsError::vk("Failed to allocate scanout memory", e))?;
        unsafe { device.bind_image_memory(image, scanout.memory, 0) }
            .map_err(|e| GraphicsError::vk("Failed to bind scanout memory", e))?;

        let layout = unsafe {
            device.get_image_subresource_layout(
                image,
                vk::ImageSubresource {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    array_layer: 0,
                },
            )
        };

        let memory_fd = ash::khr::external_memory_fd::Device::new(vulkan.instance(), device);
        let fd_info = vk::MemoryGetFdInfoKHR::default()
            .memory(scanout.memory)
            .handle_type(vk::ExternalMemoryHandleTypeFlags::DMA_BUF_EXT);
        // SAFETY: the memory was allocated exportable as a dma-buf.
        let raw_fd = unsafe { memory_fd.get_memory_fd(&fd_info) }
            .map_err(|e| GraphicsError::vk("Failed to export scanout memory", e))?;
        // SAFETY: vkGetMemoryFdKHR hands over a new fd that nothing else owns.
        let dma_buf = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        let gem = card
            .prime_fd_to_buffer(dma_buf.as_fd())
            .map_err(|e| drm_error("Failed to import dma-buf", e))?;
        scanout.gem = Some(gem);

        let buffer = GemBuffer {
            handle: gem,
            size: (extent.width, extent.height),
            pitch: layout.row_pitch as u32,
        };
        let framebuffer = card
            .add_framebuffer(&buffer, SCANOUT_DEPTH, SCANOUT_BPP)
            .map_err(|e| drm_error("Failed to add drm fb", e))?;
        scanout.framebuffer = Some(framebuffer);

        Ok(scanout)
    }

    pub fn framebuffer(&self) -> CoreResult<framebuffer::Handle> {
        self.framebuffer
            .ok_or_else(|| CoreError::WindowSystem("Scanout image has no framebuffer".to_string()))
    }
}

impl Drop for ScanoutImage {
    fn drop(&mut self) {
        if let Some(framebuffer) = self.framebuffer.take()
            && let Err(e) = self.card.destroy_framebuffer(framebuffer)
        {
            log::warn!("Failed to remove drm fb: {}", e);
        }
        if let Some(gem) = self.gem.take()
            && let Err(e) = self.card.close_buffer(gem)
        {
            log::warn!("Failed to close GEM handle: {}", e);
        }
        // SAFETY: the owning window system waits for the device to go idle
        // before its images drop.
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (slot, &property_flags) in properties.memory_types.iter_mut().zip(flags) {
            slot.property_flags = property_flags;
        }
        properties
    }

    #[test]
    fn test_memory_type_index() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        let device_local = vk::MemoryPropertyFlags::DEVICE_LOCAL;

        assert_eq!(memory_type_index(&properties, 0b111, device_local), Some(1));
        assert_eq!(memory_type_index(&properties, 0b101, device_local), Some(2));
        assert_eq!(memory_type_index(&properties, 0b001, device_local), None);
    }
}
