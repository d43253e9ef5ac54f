//! Clears every frame to a fixed or hue-cycling color.

use vkbench_core::util;
use vkbench_core::{CoreError, CoreResult, Scene, SceneBase, SceneOption};
use vkbench_graphics::{ash, vk};
use vkbench_graphics::vulkan::{barriers, command, sync};
use vkbench_graphics::{GpuContext, VulkanImage};

const COLOR_OPTION: &str = "color";
const CYCLE: &str = "cycle";
/// One full trip around the hue wheel, in microseconds.
const CYCLE_PERIOD_US: f64 = 5_000_000.0;

/// Parse `r,g,b,a` with up to four components; missing ones come from
/// opaque black.
pub fn parse_color(value: &str) -> Result<[f32; 4], String> {
    let components = util::split(value, ',');
    let mut color = [0.0, 0.0, 0.0, 1.0];

    if components.len() > color.len() {
        return Err("too many components in \"color\" option".to_string());
    }

    for (slot, component) in color.iter_mut().zip(&components) {
        *slot = component
            .trim()
            .parse()
            .map_err(|_| format!("invalid component '{component}' in \"color\" option"))?;
    }
    Ok(color)
}

/// Fully saturated color whose hue completes a cycle every five seconds.
pub fn cycle_color(elapsed_us: u64) -> [f32; 4] {
    let h = 6.0 * (elapsed_us as f64 % CYCLE_PERIOD_US) / CYCLE_PERIOD_US;
    let c = 1.0;
    let x = (c * (1.0 - ((h % 2.0) - 1.0).abs())) as f32;
    let c = c as f32;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        5 => (c, 0.0, x),
        _ => (0.0, 0.0, 0.0),
    };
    [r, g, b, 1.0]
}

/// Per-setup GPU objects.
struct ClearResources {
    device: ash::Device,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    submit_semaphore: vk::Semaphore,
}

pub struct ClearScene {
    base: SceneBase,
    cycle: bool,
    clear_color: [f32; 4],
    resources: Option<ClearResources>,
}

impl ClearScene {
    pub fn new() -> Self {
        let mut base = SceneBase::new("clear");
        base.add_option(SceneOption::new(
            COLOR_OPTION,
            CYCLE,
            "The normalized (0.0-1.0) \"r,g,b,a\" color to use or \"cycle\" to cycle",
            "",
        ));
        Self {
            base,
            cycle: true,
            clear_color: [1.0, 0.0, 0.0, 1.0],
            resources: None,
        }
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    fn configure_color(&mut self) -> CoreResult<()> {
        let value = self.base.option_value(COLOR_OPTION).unwrap_or(CYCLE);
        if value == CYCLE {
            self.cycle = true;
            self.clear_color = [1.0, 0.0, 0.0, 1.0];
        } else {
            self.cycle = false;
            self.clear_color = parse_color(value).map_err(CoreError::Scene)?;
        }
        Ok(())
    }

    fn record(&self, res: &ClearResources, image: &VulkanImage) -> CoreResult<vk::CommandBuffer> {
        let cmd = *res
            .command_buffers
            .get(image.index as usize)
            .ok_or_else(|| CoreError::Scene(format!("no command buffer for image {}", image.index)))?;
        let device = &res.device;

        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
        unsafe { device.begin_command_buffer(cmd, &begin_info) }
            .map_err(|e| CoreError::Scene(format!("Failed to begin command buffer: {e:?}")))?;

        barriers::cmd_transition(
            device,
            cmd,
            barriers::color_image_barrier(
                image.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
            ),
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
        );

        let clear_value = vk::ClearColorValue {
            float32: self.clear_color,
        };
        unsafe {
            device.cmd_clear_color_image(
                cmd,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &clear_value,
                &[barriers::COLOR_SUBRESOURCE_RANGE],
            );
        }

        barriers::cmd_transition(
            device,
            cmd,
            barriers::color_image_barrier(
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::empty(),
            ),
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        );

        unsafe { device.end_command_buffer(cmd) }
            .map_err(|e| CoreError::Scene(format!("Failed to end command buffer: {e:?}")))?;
        Ok(cmd)
    }
}

impl Default for ClearScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for ClearScene {
    fn base(&self) -> &SceneBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SceneBase {
        &mut self.base
    }

    fn setup(&mut self, ctx: &GpuContext, images: &[VulkanImage]) -> CoreResult<bool> {
        self.base.setup();
        self.configure_color()?;

        let vulkan = ctx.vulkan()?;
        let device = vulkan.device().clone();
        let command_buffers =
            command::allocate_command_buffers(&device, vulkan.command_pool(), images.len() as u32)?;
        let submit_semaphore = match sync::create_semaphore(&device) {
            Ok(semaphore) => semaphore,
            Err(e) => {
                // SAFETY: the buffers were never recorded.
                unsafe { device.free_command_buffers(vulkan.command_pool(), &command_buffers) };
                return Err(e.into());
            }
        };

        self.resources = Some(ClearResources {
            device,
            queue: vulkan.graphics_queue(),
            command_pool: vulkan.command_pool(),
            command_buffers,
            submit_semaphore,
        });
        Ok(true)
    }

    fn teardown(&mut self) {
        let Some(res) = self.resources.take() else {
            return;
        };
        // SAFETY: the device is idle once the wait returns.
        unsafe {
            if let Err(e) = res.device.device_wait_idle() {
                log::warn!("Failed to wait for device idle: {:?}", e);
            }
            res.device.destroy_semaphore(res.submit_semaphore, None);
            if !res.command_buffers.is_empty() {
                res.device
                    .free_command_buffers(res.command_pool, &res.command_buffers);
            }
        }
    }

    fn draw(&mut self, image: &VulkanImage) -> CoreResult<VulkanImage> {
        let res = self
            .resources
            .as_ref()
            .ok_or_else(|| CoreError::Scene("clear scene drawn before setup".to_string()))?;
        let cmd = self.record(res, image)?;

        let wait_semaphores = [image.semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let wait_count = usize::from(image.semaphore != vk::Semaphore::null());
        let command_buffers = [cmd];
        let signal_semaphores = [res.submit_semaphore];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores[..wait_count])
            .wait_dst_stage_mask(&wait_stages[..wait_count])
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the image's fence was reset by the acquire and guards the
        // command buffer recorded for this image index.
        unsafe {
            res.device
                .queue_submit(res.queue, &[submit_info], image.fence)
        }
        .map_err(|e| CoreError::Scene(format!("Failed to submit clear: {e:?}")))?;

        Ok(image.copy_with_semaphore(res.submit_semaphore))
    }

    fn update(&mut self) {
        if self.cycle {
            let elapsed = util::timestamp_us().saturating_sub(self.base.start_time());
            self.clear_color = cycle_color(elapsed);
        }
        self.base.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::full("0.1,0.2,0.3,0.4", [0.1, 0.2, 0.3, 0.4])]
    #[case::rgb("1.0,0.5,0.25", [1.0, 0.5, 0.25, 1.0])]
    #[case::single("0.5", [0.5, 0.0, 0.0, 1.0])]
    #[case::spaces(" 1 , 1 ", [1.0, 1.0, 0.0, 1.0])]
    fn test_parse_color(#[case] value: &str, #[case] expected: [f32; 4]) {
        assert_eq!(parse_color(value), Ok(expected));
    }

    #[test]
    fn test_parse_color_errors() {
        assert_eq!(
            parse_color("1,1,1,1,1"),
            Err("too many components in \"color\" option".to_string())
        );
        assert!(parse_color("red").is_err());
    }

    #[rstest]
    #[case::start(0, [1.0, 0.0, 0.0, 1.0])]
    #[case::green(5_000_000 / 3, [0.0, 1.0, 0.0, 1.0])]
    #[case::cyan(2_500_000, [0.0, 1.0, 1.0, 1.0])]
    #[case::wraps(5_000_000, [1.0, 0.0, 0.0, 1.0])]
    fn test_cycle_color(#[case] elapsed: u64, #[case] expected: [f32; 4]) {
        let color = cycle_color(elapsed);
        for (got, want) in color.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{color:?} != {expected:?}");
        }
    }

    #[test]
    fn test_options() {
        let scene = ClearScene::new();
        assert_eq!(scene.name(), "clear");
        assert_eq!(scene.options()[COLOR_OPTION].default_value, CYCLE);
        assert!(scene.options().contains_key("duration"));
    }

    #[test]
    fn test_setup_reads_color_option() {
        let mut scene = ClearScene::new();
        scene.set_option(COLOR_OPTION, "0.0,0.0,1.0").unwrap();

        // Without a device the setup fails after the option was applied.
        assert!(scene.setup(&GpuContext::Dummy, &[]).is_err());
        assert_eq!(scene.clear_color(), [0.0, 0.0, 1.0, 1.0]);
        assert!(!scene.cycle);

        scene.teardown();
    }

    #[test]
    fn test_setup_rejects_bad_color() {
        let mut scene = ClearScene::new();
        scene.set_option(COLOR_OPTION, "1,2,3,4,5").unwrap();
        let err = scene.setup(&GpuContext::Dummy, &[]).unwrap_err();
        assert_eq!(err.to_string(), "too many components in \"color\" option");
    }

    #[test]
    fn test_draw_before_setup_fails() {
        let mut scene = ClearScene::new();
        let image = VulkanImage::new(
            0,
            vk::Image::null(),
            vk::Format::B8G8R8A8_SRGB,
            vk::Extent2D::default(),
        );
        assert!(scene.draw(&image).is_err());
    }
}
