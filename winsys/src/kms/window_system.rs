//! Fullscreen rendering straight to a DRM CRTC, without a compositor.

use std::os::fd::{AsFd, AsRawFd};
use std::path::Path;
use std::rc::Rc;

use drm::control::{Device as ControlDevice, PageFlipFlags};

use vkbench_core::{CoreError, CoreResult, WindowSystem};
use vkbench_graphics::vulkan::sync;
use vkbench_graphics::{
    Extensions, GraphicsError, VulkanImage, VulkanInstance, VulkanState, VulkanWsi, ash, vk,
};

use super::atomic::AtomicFlip;
use super::card::{Card, DisplayPipe, drm_error};
use super::scanout::{SCANOUT_FORMAT, SCANOUT_IMAGE_COUNT, ScanoutImage};
use super::vt::VtState;

const FLIP_POLL_TIMEOUT_MS: libc::c_int = 1000;

/// How frames reach the screen.
#[derive(Debug)]
pub enum FlipMode {
    Legacy,
    Atomic(AtomicFlip),
}

/// Instance extensions for exporting image memory.
fn instance_extensions() -> Vec<&'static std::ffi::CStr> {
    vec![
        ash::khr::get_physical_device_properties2::NAME,
        ash::khr::external_memory_capabilities::NAME,
    ]
}

/// Device extensions for allocating dma-buf exportable images.
fn device_extensions() -> Vec<&'static std::ffi::CStr> {
    vec![
        ash::khr::external_memory::NAME,
        ash::khr::external_memory_fd::NAME,
        ash::ext::external_memory_dma_buf::NAME,
        ash::khr::dedicated_allocation::NAME,
        ash::khr::get_memory_requirements2::NAME,
    ]
}

struct KmsResources {
    device: ash::Device,
    queue: vk::Queue,
    images: Vec<ScanoutImage>,
    fences: Vec<vk::Fence>,
}

impl Drop for KmsResources {
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

pub struct KmsWindowSystem {
    card: Rc<Card>,
    pipe: DisplayPipe,
    flip_mode: FlipMode,
    extent: vk::Extent2D,
    resources: Option<KmsResources>,
    current_image: usize,
    crtc_set: bool,
    _vt: VtState,
}

impl KmsWindowSystem {
    pub fn new(drm_device: &Path, atomic: bool) -> CoreResult<Self> {
        let card = Card::open(drm_device).map_err(|e| {
            CoreError::WindowSystem(format!(
                "Failed to open drm device '{}': {e}",
                drm_device.display()
            ))
        })?;
        let resources = card
            .resource_handles()
            .map_err(|e| drm_error("Failed to get drm resources", e))?;
        let pipe = DisplayPipe::select(&card, &resources)?;

        let flip_mode = if atomic {
            FlipMode::Atomic(AtomicFlip::new(&card, &resources, &pipe)?)
        } else {
            FlipMode::Legacy
        };

        let (width, height) = pipe.extent();
        let vt = VtState::new()?;

        Ok(Self {
            card: Rc::new(card),
            pipe,
            flip_mode,
            extent: vk::Extent2D { width, height },
            resources: None,
            current_image: 0,
            crtc_set: false,
            _vt: vt,
        })
    }

    fn resources(&self) -> CoreResult<&KmsResources> {
        self.resources.as_ref().ok_or_else(|| {
            CoreError::WindowSystem("Window system used before Vulkan init".to_string())
        })
    }

    fn create_resources(&self, vulkan: &VulkanState) -> CoreResult<KmsResources> {
        let device = vulkan.device();
        let mut resources = KmsResources {
            device: device.clone(),
            queue: vulkan.graphics_queue(),
            images: Vec::with_capacity(SCANOUT_IMAGE_COUNT),
            fences: Vec::with_capacity(SCANOUT_IMAGE_COUNT),
        };
        for _ in 0..SCANOUT_IMAGE_COUNT {
            resources
                .images
                .push(ScanoutImage::new(vulkan, &self.card, self.extent)?);
            resources.fences.push(sync::create_fence(device, true)?);
        }
        Ok(resources)
    }

    /// Consume the image's semaphore and wait for its rendering to finish.
    fn wait_for_rendering(res: &KmsResources, image: &VulkanImage) -> CoreResult<()> {
        if image.semaphore != vk::Semaphore::null() {
            let wait_semaphores = [image.semaphore];
            let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages);
            // SAFETY: the semaphore was signalled by the scene's submit and
            // has no other waiter.
            unsafe {
                res.device
                    .queue_submit(res.queue, &[submit_info], vk::Fence::null())
            }
            .map_err(|e| GraphicsError::vk("Failed to submit present wait", e))?;
        }

        // SAFETY: fence and queue belong to `res.device`.
        if image.fence != vk::Fence::null() {
            unsafe { res.device.wait_for_fences(&[image.fence], true, u64::MAX) }
                .map_err(|e| GraphicsError::vk("Failed to wait for rendering", e))?;
        } else {
            unsafe { res.device.queue_wait_idle(res.queue) }
                .map_err(|e| GraphicsError::vk("Failed to wait for queue", e))?;
        }
        Ok(())
    }

    fn flip(&mut self, image_index: usize) -> CoreResult<()> {
        let fb = self
            .resources()?
            .images
            .get(image_index)
            .ok_or_else(|| CoreError::WindowSystem(format!("No scanout image {image_index}")))?
            .framebuffer()?;
        let card = &*self.card;

        match &self.flip_mode {
            FlipMode::Legacy => {
                if !self.crtc_set {
                    card.set_crtc(
                        self.pipe.crtc,
                        Some(fb),
                        (0, 0),
                        &[self.pipe.connector],
                        Some(self.pipe.mode),
                    )
                    .map_err(|e| drm_error("Failed to set crtc", e))?;
                }
                card.page_flip(self.pipe.crtc, fb, PageFlipFlags::EVENT, None)
                    .map_err(|e| drm_error("Failed to page flip", e))?;
            }
            FlipMode::Atomic(atomic) => atomic.commit(card, &self.pipe, fb, !self.crtc_set)?,
        }
        self.crtc_set = true;

        wait_for_page_flip(card)
    }
}

/// Block until the card reports a finished flip, then drain its events.
fn wait_for_page_flip(card: &Card) -> CoreResult<()> {
    let mut pfd = libc::pollfd {
        fd: card.as_fd().as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        // SAFETY: `pfd` is a single valid pollfd and the card keeps the fd
        // open for the duration of the call.
        let ret = unsafe { libc::poll(&mut pfd, 1, FLIP_POLL_TIMEOUT_MS) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(drm_error("Failed while polling for page flip event", err));
        }

        if pfd.revents & libc::POLLIN != 0 {
            let events = card
                .receive_events()
                .map_err(|e| drm_error("Failed to read drm events", e))?;
            for event in events {
                if let drm::control::Event::PageFlip(flip) = event {
                    log::trace!("Page flip completed on {:?}", flip.crtc);
                }
            }
            return Ok(());
        }
    }
}

impl Drop for KmsWindowSystem {
    fn drop(&mut self) {
        let Some(prev) = &self.pipe.prev_crtc else {
            return;
        };
        if let Err(e) = self.card.set_crtc(
            prev.handle(),
            prev.framebuffer(),
            prev.position(),
            &[self.pipe.connector],
            prev.mode(),
        ) {
            log::warn!("Failed to restore crtc: {}", e);
        }
    }
}

impl VulkanWsi for KmsWindowSystem {
    fn required_extensions(&self) -> Extensions {
        Extensions {
            instance: instance_extensions(),
            device: device_extensions(),
        }
    }

    fn is_physical_device_supported(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> bool {
        // SAFETY: `physical_device` was enumerated from this instance.
        let Ok(props) = (unsafe {
            instance
                .instance
                .enumerate_device_extension_properties(physical_device)
        }) else {
            return false;
        };
        device_extensions().iter().all(|required| {
            props
                .iter()
                .any(|p| p.extension_name_as_c_str().is_ok_and(|name| name == *required))
        })
    }

    fn physical_device_queue_family_indices(
        &self,
        _instance: &VulkanInstance,
        _physical_device: vk::PhysicalDevice,
    ) -> Vec<u32> {
        Vec::new()
    }
}

impl WindowSystem for KmsWindowSystem {
    fn vulkan_wsi(&self) -> &dyn VulkanWsi {
        self
    }

    fn init_vulkan(&mut self, vulkan: &VulkanState) -> CoreResult<()> {
        let resources = self.create_resources(vulkan)?;
        self.resources = Some(resources);
        self.current_image = 0;
        Ok(())
    }

    fn deinit_vulkan(&mut self) {
        self.resources = None;
    }

    fn next_vulkan_image(&mut self) -> CoreResult<VulkanImage> {
        let index = self.current_image;
        let res = self.resources()?;
        let fence = res.fences[index];
        sync::wait_and_reset_fence(&res.device, fence)?;

        Ok(VulkanImage {
            index: index as u32,
            image: res.images[index].image,
            format: SCANOUT_FORMAT,
            extent: self.extent,
            semaphore: vk::Semaphore::null(),
            fence,
        })
    }

    fn present_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        Self::wait_for_rendering(self.resources()?, image)?;
        self.flip(image.index as usize)?;

        let count = self.resources()?.images.len();
        self.current_image = (self.current_image + 1) % count;
        Ok(())
    }

    fn recycle_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        // The slot stays current; its fence just has to signal again.
        let res = self.resources()?;
        sync::signal_fence(&res.device, res.queue, image.semaphore, image.fence)?;
        Ok(())
    }

    fn vulkan_images(&self) -> Vec<VulkanImage> {
        let Some(res) = &self.resources else {
            return Vec::new();
        };
        res.images
            .iter()
            .enumerate()
            .map(|(i, scanout)| VulkanImage::new(i as u32, scanout.image, SCANOUT_FORMAT, self.extent))
            .collect()
    }

    fn should_quit(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        let device = device_extensions();
        assert!(device.contains(&ash::ext::external_memory_dma_buf::NAME));
        assert!(device.contains(&ash::khr::external_memory_fd::NAME));
        assert!(!device.contains(&ash::khr::swapchain::NAME));
        assert!(instance_extensions().contains(&ash::khr::external_memory_capabilities::NAME));
    }

    #[test]
    fn test_missing_device_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = KmsWindowSystem::new(&dir.path().join("card0"), false)
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Failed to open drm device"));
    }
}
