//! GPU memory allocation for offscreen render targets using gpu-allocator.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use parking_lot::Mutex;

use crate::error::GraphicsError;

/// Create a memory allocator for the Vulkan device.
pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
) -> Result<Allocator, GraphicsError> {
    let allocator = Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device,
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create memory allocator: {}", e))
    })?;

    Ok(allocator)
}

/// Parameters for a 2D single-sample color image.
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub tiling: vk::ImageTiling,
}

/// An image bound to memory owned by the shared allocator.
pub struct AllocatedImage {
    pub image: vk::Image,
    allocation: Option<Allocation>,
    allocator: Arc<Mutex<Allocator>>,
    device: ash::Device,
}

impl AllocatedImage {
    pub fn new(
        device: &ash::Device,
        allocator: &Arc<Mutex<Allocator>>,
        name: &str,
        desc: &ImageDesc,
    ) -> Result<Self, GraphicsError> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(desc.tiling)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&image_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create image: {:?}", e))
        })?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let allocation = allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: desc.tiling == vk::ImageTiling::LINEAR,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                unsafe { device.destroy_image(image, None) };
                GraphicsError::ResourceCreationFailed(format!(
                    "Failed to allocate image memory: {}",
                    e
                ))
            })?;

        let bind =
            unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) };
        if let Err(e) = bind {
            if let Err(free_err) = allocator.lock().free(allocation) {
                log::warn!("Failed to free image memory: {}", free_err);
            }
            unsafe { device.destroy_image(image, None) };
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "Failed to bind image memory: {:?}",
                e
            )));
        }

        Ok(Self {
            image,
            allocation: Some(allocation),
            allocator: Arc::clone(allocator),
            device: device.clone(),
        })
    }

    fn release(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.allocator.lock().free(allocation) {
                log::warn!("Failed to free image memory: {}", e);
            }
        }
        if self.image != vk::Image::null() {
            // SAFETY: Caller guarantees GPU is done with the image
            unsafe { self.device.destroy_image(self.image, None) };
            self.image = vk::Image::null();
        }
    }
}

impl Drop for AllocatedImage {
    fn drop(&mut self) {
        self.release();
    }
}
