//! Offscreen rendering with no window system at all.
//!
//! Frames go to a ring of device-local images that are never shown. Present
//! only keeps the scene's semaphore so the next acquire waits on it.

use std::cell::Cell;

use vkbench_core::{CoreError, CoreResult, Options, WindowSystem, WindowSystemPlugin};
use vkbench_graphics::vulkan::allocator::{AllocatedImage, ImageDesc};
use vkbench_graphics::vulkan::{barriers, command, sync};
use vkbench_graphics::{
    Extensions, VulkanImage, VulkanInstance, VulkanState, VulkanWsi, ash, vk,
};

const NOWS_PROBE: i32 = 1;
const DEFAULT_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Image ring parameters from `--winsys-options` and `--pixel-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowsConfig {
    pub extent: vk::Extent2D,
    pub num_buffers: u32,
    pub format: vk::Format,
}

impl NowsConfig {
    pub fn from_options(options: &Options) -> CoreResult<Self> {
        let width = options.winsys_option_parsed("width", 512u32)?;
        let height = options.winsys_option_parsed("height", 512u32)?;
        let num_buffers = options.winsys_option_parsed("num-buffers", 3u32)?;
        if num_buffers == 0 {
            return Err(CoreError::InvalidOptionValue {
                name: "num-buffers".to_string(),
                value: num_buffers.to_string(),
            });
        }

        let format = if options.pixel_format == vk::Format::UNDEFINED {
            DEFAULT_FORMAT
        } else {
            options.pixel_format
        };

        Ok(Self {
            extent: vk::Extent2D { width, height },
            num_buffers,
            format,
        })
    }
}

struct NowsResources {
    device: ash::Device,
    queue: vk::Queue,
    images: Vec<AllocatedImage>,
    fences: Vec<vk::Fence>,
}

impl Drop for NowsResources {
    fn drop(&mut self) {
        // SAFETY: the device is idle once the wait returns.
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("Failed to wait for device idle: {:?}", e);
            }
            for fence in self.fences.drain(..) {
                self.device.destroy_fence(fence, None);
            }
        }
    }
}

pub struct NoWindowSystem {
    config: NowsConfig,
    resources: Option<NowsResources>,
    current_frame: usize,
    /// Signalled by the last presented frame; waited on by the next acquire.
    present_semaphore: Cell<vk::Semaphore>,
}

impl NoWindowSystem {
    pub fn new(config: NowsConfig) -> Self {
        Self {
            config,
            resources: None,
            current_frame: 0,
            present_semaphore: Cell::new(vk::Semaphore::null()),
        }
    }

    fn create_resources(&self, vulkan: &VulkanState) -> CoreResult<NowsResources> {
        let device = vulkan.device();
        let desc = ImageDesc {
            format: self.config.format,
            extent: self.config.extent,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            tiling: vk::ImageTiling::OPTIMAL,
        };

        let mut resources = NowsResources {
            device: device.clone(),
            queue: vulkan.graphics_queue(),
            images: Vec::with_capacity(self.config.num_buffers as usize),
            fences: Vec::with_capacity(self.config.num_buffers as usize),
        };
        for i in 0..self.config.num_buffers {
            let name = format!("nows image {i}");
            resources
                .images
                .push(AllocatedImage::new(device, vulkan.allocator(), &name, &desc)?);
            resources.fences.push(sync::create_fence(device, true)?);
        }

        command::one_time_submit(
            device,
            vulkan.command_pool(),
            vulkan.graphics_queue(),
            |cmd| {
                for image in &resources.images {
                    barriers::cmd_transition(
                        device,
                        cmd,
                        barriers::color_image_barrier(
                            image.image,
                            vk::ImageLayout::UNDEFINED,
                            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                            vk::AccessFlags::empty(),
                            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                        ),
                        vk::PipelineStageFlags::TOP_OF_PIPE,
                        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    );
                }
            },
        )?;

        Ok(resources)
    }

    fn resources(&self) -> CoreResult<&NowsResources> {
        self.resources.as_ref().ok_or_else(|| {
            CoreError::WindowSystem("Window system used before Vulkan init".to_string())
        })
    }
}

impl VulkanWsi for NoWindowSystem {
    fn required_extensions(&self) -> Extensions {
        Extensions::default()
    }

    fn is_physical_device_supported(
        &self,
        _instance: &VulkanInstance,
        _physical_device: vk::PhysicalDevice,
    ) -> bool {
        true
    }

    fn physical_device_queue_family_indices(
        &self,
        _instance: &VulkanInstance,
        _physical_device: vk::PhysicalDevice,
    ) -> Vec<u32> {
        Vec::new()
    }
}

impl WindowSystem for NoWindowSystem {
    fn vulkan_wsi(&self) -> &dyn VulkanWsi {
        self
    }

    fn init_vulkan(&mut self, vulkan: &VulkanState) -> CoreResult<()> {
        let resources = self.create_resources(vulkan)?;
        self.resources = Some(resources);
        self.current_frame = 0;
        self.present_semaphore.set(vk::Semaphore::null());
        Ok(())
    }

    fn deinit_vulkan(&mut self) {
        self.resources = None;
        self.present_semaphore.set(vk::Semaphore::null());
    }

    fn next_vulkan_image(&mut self) -> CoreResult<VulkanImage> {
        let frame = self.current_frame;
        let res = self.resources()?;
        let fence = res.fences[frame];
        sync::wait_and_reset_fence(&res.device, fence)?;

        let image = VulkanImage {
            index: frame as u32,
            image: res.images[frame].image,
            format: self.config.format,
            extent: self.config.extent,
            semaphore: self.present_semaphore.get(),
            fence,
        };
        self.current_frame = (frame + 1) % res.images.len();
        Ok(image)
    }

    fn present_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        self.present_semaphore.set(image.semaphore);
        Ok(())
    }

    fn recycle_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        let res = self.resources()?;
        // The acquire semaphore is the last present's, consumed here.
        sync::signal_fence(&res.device, res.queue, image.semaphore, image.fence)?;
        self.present_semaphore.set(vk::Semaphore::null());
        Ok(())
    }

    fn vulkan_images(&self) -> Vec<VulkanImage> {
        // Scenes set up against these images start from a clean slate, with
        // nothing left to wait on.
        self.present_semaphore.set(vk::Semaphore::null());

        let Some(res) = &self.resources else {
            return Vec::new();
        };
        res.images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                VulkanImage::new(i as u32, image.image, self.config.format, self.config.extent)
            })
            .collect()
    }

    fn should_quit(&mut self) -> bool {
        false
    }
}

fn create(options: &Options) -> CoreResult<Box<dyn WindowSystem>> {
    let config = NowsConfig::from_options(options)?;
    log::debug!(
        "NoWindowSystem: {}x{} {:?} with {} buffers",
        config.extent.width,
        config.extent.height,
        config.format,
        config.num_buffers
    );
    Ok(Box::new(NoWindowSystem::new(config)))
}

pub const PLUGIN: WindowSystemPlugin = WindowSystemPlugin {
    name: "nows",
    load_options: |options| {
        options.add_window_system_help(
            "NoWindowSystem options (pass in --winsys-options)\n  \
             width=WIDTH                 The width of the offscreen images (default: 512)\n  \
             height=HEIGHT               The height of the offscreen images (default: 512)\n  \
             num-buffers=N               The number of offscreen images to cycle (default: 3)\n",
        )
    },
    probe: |_| NOWS_PROBE,
    create,
};
