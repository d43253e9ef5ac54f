//! Stand-ins for a window system and scenes that need no GPU.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use vkbench_core::{CoreError, CoreResult, Scene, SceneBase, StopHandle, WindowSystem};
use vkbench_graphics::vk::{self, Handle};
use vkbench_graphics::{
    Extensions, GpuContext, VulkanImage, VulkanInstance, VulkanState, VulkanWsi,
};

pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub struct NullWsi;

impl VulkanWsi for NullWsi {
    fn required_extensions(&self) -> Extensions {
        Extensions::default()
    }

    fn is_physical_device_supported(&self, _: &VulkanInstance, _: vk::PhysicalDevice) -> bool {
        true
    }

    fn physical_device_queue_family_indices(
        &self,
        _: &VulkanInstance,
        _: vk::PhysicalDevice,
    ) -> Vec<u32> {
        Vec::new()
    }
}

/// Cycles through two fake images and optionally asks to quit after a number
/// of presented frames.
///
/// Like a swapchain, a slot only becomes current again once the image handed
/// out for it was presented or recycled. Acquiring a slot that is still out
/// fails instead of blocking on its fence.
pub struct NullWindowSystem {
    wsi: NullWsi,
    current: u32,
    outstanding: [bool; 2],
    pub handed_out: u32,
    pub presented: u32,
    pub recycled: u32,
    pub quit_after: Option<u32>,
}

impl NullWindowSystem {
    pub fn new() -> Self {
        Self {
            wsi: NullWsi,
            current: 0,
            outstanding: [false; 2],
            handed_out: 0,
            presented: 0,
            recycled: 0,
            quit_after: None,
        }
    }

    /// Images handed out and neither presented nor recycled.
    pub fn in_flight(&self) -> usize {
        self.outstanding.iter().filter(|&&out| out).count()
    }

    fn image(index: u32) -> VulkanImage {
        VulkanImage::new(
            index,
            vk::Image::from_raw(u64::from(index) + 1),
            vk::Format::B8G8R8A8_SRGB,
            vk::Extent2D {
                width: 16,
                height: 16,
            },
        )
    }

    fn give_back(&mut self, image: &VulkanImage) -> CoreResult<()> {
        let slot = &mut self.outstanding[image.index as usize];
        if !*slot {
            return Err(CoreError::WindowSystem(format!(
                "image {} was not handed out",
                image.index
            )));
        }
        *slot = false;
        self.current = (self.current + 1) % 2;
        Ok(())
    }
}

impl WindowSystem for NullWindowSystem {
    fn vulkan_wsi(&self) -> &dyn VulkanWsi {
        &self.wsi
    }

    fn init_vulkan(&mut self, _: &VulkanState) -> CoreResult<()> {
        Ok(())
    }

    fn deinit_vulkan(&mut self) {}

    fn next_vulkan_image(&mut self) -> CoreResult<VulkanImage> {
        let slot = &mut self.outstanding[self.current as usize];
        if *slot {
            return Err(CoreError::WindowSystem(format!(
                "fence of image {} never signals",
                self.current
            )));
        }
        *slot = true;
        self.handed_out += 1;
        Ok(Self::image(self.current))
    }

    fn present_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        self.give_back(image)?;
        self.presented += 1;
        Ok(())
    }

    fn recycle_vulkan_image(&mut self, image: &VulkanImage) -> CoreResult<()> {
        self.give_back(image)?;
        self.recycled += 1;
        Ok(())
    }

    fn vulkan_images(&self) -> Vec<VulkanImage> {
        (0..2).map(Self::image).collect()
    }

    fn should_quit(&mut self) -> bool {
        self.quit_after.is_some_and(|n| self.presented >= n)
    }
}

/// How a [`ScriptedScene`] behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    /// Draw one frame and finish.
    SingleFrame,
    /// Keep running until stopped or asked to quit.
    Endless,
    /// Report a setup failure without an error.
    RefuseSetup,
    /// Fail setup with an error.
    FailSetup,
    /// Fail the first draw.
    FailDraw,
}

/// A scene that records its lifecycle calls and reports a fixed FPS.
pub struct ScriptedScene {
    base: SceneBase,
    fps: u32,
    behavior: Behavior,
    log: EventLog,
    stop_on_setup: Option<(StopHandle, usize)>,
    setups: usize,
}

impl ScriptedScene {
    pub fn new(name: &str, fps: u32, behavior: Behavior, log: &EventLog) -> Self {
        Self {
            base: SceneBase::new(name),
            fps,
            behavior,
            log: Rc::clone(log),
            stop_on_setup: None,
            setups: 0,
        }
    }

    /// Stop the loop through `handle` on the `nth` setup of this scene.
    pub fn stopping_on_setup(mut self, handle: StopHandle, nth: usize) -> Self {
        self.stop_on_setup = Some((handle, nth));
        self
    }

    fn record(&self, event: &str) {
        self.log
            .borrow_mut()
            .push(format!("{} {}", event, self.base.name()));
    }
}

impl Scene for ScriptedScene {
    fn base(&self) -> &SceneBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SceneBase {
        &mut self.base
    }

    fn setup(&mut self, _ctx: &GpuContext, images: &[VulkanImage]) -> CoreResult<bool> {
        self.base.setup();
        assert_eq!(images.len(), 2);
        self.record("setup");
        self.setups += 1;
        if let Some((handle, nth)) = &self.stop_on_setup
            && self.setups == *nth
        {
            handle.stop();
        }
        match self.behavior {
            Behavior::FailSetup => Err(CoreError::Scene("setup failed".into())),
            Behavior::RefuseSetup => Ok(false),
            _ => Ok(true),
        }
    }

    fn teardown(&mut self) {
        self.record("teardown");
    }

    fn draw(&mut self, image: &VulkanImage) -> CoreResult<VulkanImage> {
        if self.behavior == Behavior::FailDraw {
            return Err(CoreError::Scene("draw failed".into()));
        }
        Ok(image.copy_with_semaphore(vk::Semaphore::null()))
    }

    fn update(&mut self) {
        self.base.update();
        if self.behavior == Behavior::SingleFrame {
            self.base.finish();
        }
    }

    fn average_fps(&self) -> u32 {
        self.fps
    }
}
