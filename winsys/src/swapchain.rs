//! Presentation through a `VK_KHR_swapchain` on a native surface.

use vkbench_core::{CoreError, CoreResult, WindowSystem};
use vkbench_graphics::vulkan::{barriers, command, sync};
use vkbench_graphics::{
    Extensions, GraphicsError, VulkanImage, VulkanInstance, VulkanState, VulkanWsi, ash, format,
    vk,
};

use crate::native::NativeSystem;

/// Pick a surface format: sRGB ones first, then the one with the most
/// color bits. Among equals the first listed wins.
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .rev()
        .max_by_key(|f| (format::is_srgb(f.format), format::format_bits(f.format)))
        .copied()
}

/// Ask for triple buffering within what the surface allows.
pub fn swapchain_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count.max(3);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Swapchain and per-frame synchronization, alive between `init_vulkan` and
/// `deinit_vulkan`.
struct SwapchainResources {
    device: ash::Device,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    present_queue: vk::Queue,
    graphics_queue: vk::Queue,
    command_pool: vk::CommandPool,
    images: Vec<vk::Image>,
    format: vk::Format,
    extent: vk::Extent2D,
    acquire_semaphores: Vec<vk::Semaphore>,
    acquire_fences: Vec<vk::Fence>,
    // Per slot, used to hand back an acquired image that was never drawn.
    recycle_commands: Vec<vk::CommandBuffer>,
    recycle_semaphores: Vec<vk::Semaphore>,
    current_frame: usize,
    image_index: u32,
}

impl SwapchainResources {
    /// Queue the acquired image for display once `wait` signals, then move
    /// to the next frame slot.
    fn present(&mut self, wait: vk::Semaphore) -> CoreResult<()> {
        let swapchains = [self.swapchain];
        let image_indices = [self.image_index];
        let wait_semaphores = [wait];
        let wait_count = usize::from(wait != vk::Semaphore::null());
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores[..wait_count])
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: the image index came from the last acquire on this
        // swapchain and has not been presented since.
        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present_info)
        };

        self.current_frame = (self.current_frame + 1) % self.images.len();

        match result {
            Ok(_) => Ok(()),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date");
                Ok(())
            }
            Err(e) => Err(GraphicsError::vk("Failed to present swapchain image", e).into()),
        }
    }

    /// An acquired image can only be released by presenting it. Move it to
    /// the present layout with the slot's own command buffer, signalling the
    /// slot fence, and present it unchanged.
    fn recycle(&mut self, image: &VulkanImage) -> CoreResult<()> {
        let frame = image.index as usize;
        let cmd = self.recycle_commands[frame];
        let done = self.recycle_semaphores[frame];

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: the slot fence was waited on before this image was handed
        // out, so the previous recycle submission of this slot is complete.
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| GraphicsError::vk("Failed to reset command buffer", e))?;
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| GraphicsError::vk("Failed to begin command buffer", e))?;
        }
        barriers::cmd_transition(
            &self.device,
            cmd,
            barriers::color_image_barrier(
                image.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::PRESENT_SRC_KHR,
                vk::AccessFlags::empty(),
                vk::AccessFlags::empty(),
            ),
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        );
        // SAFETY: recording started above on the same buffer.
        unsafe { self.device.end_command_buffer(cmd) }
            .map_err(|e| GraphicsError::vk("Failed to end command buffer", e))?;

        let command_buffers = [cmd];
        let wait_semaphores = [image.semaphore];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let wait_count = usize::from(image.semaphore != vk::Semaphore::null());
        let signal_semaphores = [done];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores[..wait_count])
            .wait_dst_stage_mask(&wait_stages[..wait_count])
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        // SAFETY: the fence was reset when the image was handed out and
        // nothing else was submitted with it.
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], image.fence)
        }
        .map_err(|e| GraphicsError::vk("Failed to submit image recycle", e))?;

        self.present(done)
    }
}

impl Drop for SwapchainResources {
    fn drop(&mut self) {
        // SAFETY: the device is idle once the wait returns, so none of the
        // handles below are in use.
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("Failed to wait for device idle: {:?}", e);
            }
            for semaphore in self
                .acquire_semaphores
                .drain(..)
                .chain(self.recycle_semaphores.drain(..))
            {
                self.device.destroy_semaphore(semaphore, None);
            }
            for fence in self.acquire_fences.drain(..) {
                self.device.destroy_fence(fence, None);
            }
            if self.command_pool != vk::CommandPool::null() {
                self.device.destroy_command_pool(self.command_pool, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// A window system backed by a native surface and a swapchain.
pub struct SwapchainWindowSystem {
    native: Box<dyn NativeSystem>,
    present_mode: vk::PresentModeKHR,
    pixel_format: vk::Format,
    resources: Option<SwapchainResources>,
}

impl SwapchainWindowSystem {
    pub fn new(
        native: Box<dyn NativeSystem>,
        present_mode: vk::PresentModeKHR,
        pixel_format: vk::Format,
    ) -> Self {
        Self {
            native,
            present_mode,
            pixel_format,
            resources: None,
        }
    }

    fn resources_mut(&mut self) -> CoreResult<&mut SwapchainResources> {
        self.resources.as_mut().ok_or_else(|| {
            CoreError::WindowSystem("swapchain used before init_vulkan".to_string())
        })
    }

    fn create_resources(&mut self, vulkan: &VulkanState) -> CoreResult<SwapchainResources> {
        let present_family = self
            .native
            .presentation_queue_family_index(vulkan.vulkan_instance(), vulkan.physical_device())
            .ok_or_else(|| {
                CoreError::WindowSystem(
                    "Physical device doesn't have a queue family that supports presentation on \
                     the selected window system"
                        .to_string(),
                )
            })?;

        let device = vulkan.device().clone();
        // SAFETY: the device was created with a queue in the presentation
        // family.
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let surface_loader = ash::khr::surface::Instance::new(vulkan.entry(), vulkan.instance());
        let swapchain_loader = ash::khr::swapchain::Device::new(vulkan.instance(), &device);

        let surface = self.native.create_vk_surface(vulkan)?;

        // From here on dropping `resources` releases whatever was created.
        let mut resources = SwapchainResources {
            device,
            surface_loader,
            swapchain_loader,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            present_queue,
            graphics_queue: vulkan.graphics_queue(),
            command_pool: vk::CommandPool::null(),
            images: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: self.native.vk_extent(),
            acquire_semaphores: Vec::new(),
            acquire_fences: Vec::new(),
            recycle_commands: Vec::new(),
            recycle_semaphores: Vec::new(),
            current_frame: 0,
            image_index: 0,
        };

        self.create_swapchain(vulkan.physical_device(), present_family, &mut resources)?;

        // SAFETY: the swapchain was just created from this loader.
        resources.images = unsafe {
            resources
                .swapchain_loader
                .get_swapchain_images(resources.swapchain)
        }
        .map_err(|e| GraphicsError::vk("Failed to get swapchain images", e))?;

        log::debug!(
            "SwapchainWindowSystem: Swapchain contains {} images",
            resources.images.len()
        );

        for _ in 0..resources.images.len() {
            let semaphore = sync::create_semaphore(&resources.device)?;
            resources.acquire_semaphores.push(semaphore);
            let fence = sync::create_fence(&resources.device, true)?;
            resources.acquire_fences.push(fence);
            let semaphore = sync::create_semaphore(&resources.device)?;
            resources.recycle_semaphores.push(semaphore);
        }

        resources.command_pool =
            command::create_command_pool(&resources.device, vulkan.graphics_queue_family_index())?;
        resources.recycle_commands = command::allocate_command_buffers(
            &resources.device,
            resources.command_pool,
            resources.images.len() as u32,
        )?;

        Ok(resources)
    }

    fn create_swapchain(
        &self,
        physical_device: vk::PhysicalDevice,
        present_family: u32,
        resources: &mut SwapchainResources,
    ) -> CoreResult<()> {
        let loader = &resources.surface_loader;
        let surface = resources.surface;

        let capabilities =
            unsafe { loader.get_physical_device_surface_capabilities(physical_device, surface) }
                .map_err(|e| GraphicsError::vk("Failed to get surface capabilities", e))?;
        if !capabilities
            .supported_composite_alpha
            .contains(vk::CompositeAlphaFlagsKHR::OPAQUE)
        {
            return Err(CoreError::WindowSystem("Opaque not supported".to_string()));
        }

        let supported = unsafe {
            loader.get_physical_device_surface_support(physical_device, present_family, surface)
        }
        .map_err(|e| GraphicsError::vk("Failed to query surface support", e))?;
        if !supported {
            return Err(CoreError::WindowSystem("Surface not supported".to_string()));
        }

        let formats =
            unsafe { loader.get_physical_device_surface_formats(physical_device, surface) }
                .map_err(|e| GraphicsError::vk("Failed to get surface formats", e))?;
        for f in &formats {
            log::debug!(
                "SwapchainWindowSystem: Available surface format {}",
                format::format_name(f.format)
            );
        }

        let surface_format = if self.pixel_format != vk::Format::UNDEFINED {
            let color_space = formats
                .iter()
                .find(|f| f.format == self.pixel_format)
                .map_or(vk::ColorSpaceKHR::SRGB_NONLINEAR, |f| f.color_space);
            vk::SurfaceFormatKHR {
                format: self.pixel_format,
                color_space,
            }
        } else {
            select_surface_format(&formats).ok_or_else(|| {
                CoreError::WindowSystem("Surface reports no formats".to_string())
            })?
        };
        log::debug!(
            "SwapchainWindowSystem: Selected swapchain format {}",
            format::format_name(surface_format.format)
        );

        let present_modes =
            unsafe { loader.get_physical_device_surface_present_modes(physical_device, surface) }
                .map_err(|e| GraphicsError::vk("Failed to get surface present modes", e))?;
        if !present_modes.contains(&self.present_mode) {
            return Err(CoreError::WindowSystem(format!(
                "Selected present mode {:?} is not supported by the used Vulkan physical device.",
                self.present_mode
            )));
        }

        // A defined current extent is what the surface will be displayed at.
        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            self.native.vk_extent()
        };

        let queue_families = [present_family];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(swapchain_image_count(&capabilities))
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true);

        // SAFETY: `resources` owns the surface and destroys the swapchain
        // before it.
        resources.swapchain =
            unsafe { resources.swapchain_loader.create_swapchain(&create_info, None) }.map_err(
                |e| {
                    GraphicsError::ResourceCreationFailed(format!(
                        "Failed to create swapchain: {:?}",
                        e
                    ))
                },
            )?;
        resources.format = surface_format.format;
        resources.extent = extent;
        Ok(())
    }
}

impl VulkanWsi for SwapchainWindowSystem {
    fn required_extensions(&self) -> Extensions {
        Extensions {
            instance: self.native.instance_extensions(),
            device: vec![ash::khr::swapchain::NAME],
        }
    }

    fn is_physical_device_supported(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> bool {
        self.native
            .presentation_queue_family_index(instance, physical_device)
            .is_some()
    }

    fn physical_device_queue_family_indices(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<u32> {
        self.native
            .presentation_queue_family_index(instance, physical_device)
            .into_iter()
            .collect()
    }
}

impl WindowSystem for SwapchainWindowSystem {
    fn vulkan_wsi(&self) -> &dyn VulkanWsi {
        self
    }

    fn init_vulkan(&mut self, vulkan: &VulkanState) -> CoreResult<()> {
        let resources = self.create_resources(vulkan)?;
        self.resources = Some(resources);
        Ok(())
    }

    fn deinit_vulkan(&mut self) {
        self.resources = None;
    }

    fn next_vulkan_image(&mut self) -> CoreResult<VulkanImage> {
        let res = self.resources_mut()?;
        let frame = res.current_frame;
        let fence = res.acquire_fences[frame];
        let semaphore = res.acquire_semaphores[frame];

        sync::wait_and_reset_fence(&res.device, fence)?;

        // SAFETY: the semaphore's previous signal was consumed by the submit
        // the fence waited for.
        let acquired = unsafe {
            res.swapchain_loader
                .acquire_next_image(res.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        let (image_index, _suboptimal) = match acquired {
            Ok(acquired) => acquired,
            Err(e) => {
                // Nothing will be submitted with the fence; signal it so the
                // slot can be waited on again.
                let no_wait = vk::Semaphore::null();
                if let Err(rearm) =
                    sync::signal_fence(&res.device, res.graphics_queue, no_wait, fence)
                {
                    log::warn!("Failed to re-arm frame fence: {}", rearm);
                }
                return Err(GraphicsError::vk("Failed to acquire swapchain image", e).into());
            }
        };
        res.image_index = image_index;

        // The image is indexed by frame slot: the slot's fence guards reuse
        // of whatever the scene keeps per index.
        Ok(VulkanImage {
            index: frame as u32,
            image: res.images[image_index as usize],
            format: res.format,
            extent: res.extent,
            semaphore,
            fence,
        })
    }

    fn present_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        self.resources_mut()?.present(image.semaphore)
    }

    fn recycle_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        self.resources_mut()?.recycle(image)
    }

    fn vulkan_images(&self) -> Vec<VulkanImage> {
        let Some(res) = &self.resources else {
            return Vec::new();
        };
        res.images
            .iter()
            .enumerate()
            .map(|(i, &image)| VulkanImage::new(i as u32, image, res.format, res.extent))
            .collect()
    }

    fn should_quit(&mut self) -> bool {
        self.native.should_quit()
    }
}
