//! Fullscreen presentation straight to a display with `VK_KHR_display`.

use std::ffi::CStr;

use vkbench_core::{
    CoreError, CoreResult, Options, PROBE_BAD, PROBE_OK, WindowSystem, WindowSystemPlugin,
};
use vkbench_graphics::vulkan::{device, instance};
use vkbench_graphics::{GraphicsError, VulkanInstance, VulkanState, ash, vk};

use crate::native::{NativeSystem, first_queue_family};
use crate::swapchain::SwapchainWindowSystem;

const DISPLAY_PRIORITY: i32 = 0;
const DISPLAY_INDEX_OPTION: &str = "display-index";

/// Index of the first plane that sits at the bottom of the stack and is, or
/// can be, attached to `display`.
///
/// Vulkan has no notion of a primary plane; stack index 0 stands in for it.
pub fn select_plane(
    planes: &[vk::DisplayPlanePropertiesKHR],
    display: vk::DisplayKHR,
    supports_display: impl Fn(u32) -> bool,
) -> Option<u32> {
    planes
        .iter()
        .enumerate()
        .filter(|(_, plane)| plane.current_stack_index == 0)
        .map(|(index, plane)| (index as u32, plane))
        .find(|&(index, plane)| plane.current_display == display || supports_display(index))
        .map(|(index, _)| index)
}

/// The mode with the highest refresh rate at the display's physical
/// resolution. Among equals the first listed wins.
pub fn select_mode(
    modes: &[vk::DisplayModePropertiesKHR],
    resolution: vk::Extent2D,
) -> Option<vk::DisplayModePropertiesKHR> {
    modes
        .iter()
        .rev()
        .filter(|mode| mode.parameters.visible_region == resolution)
        .max_by_key(|mode| mode.parameters.refresh_rate)
        .copied()
}

fn display_error(what: &str) -> CoreError {
    CoreError::WindowSystem(what.to_string())
}

/// Surface parameters for display `display_index` of `physical_device`.
pub fn display_surface_create_info(
    loader: &ash::khr::display::Instance,
    physical_device: vk::PhysicalDevice,
    display_index: usize,
) -> CoreResult<vk::DisplaySurfaceCreateInfoKHR<'static>> {
    let displays = unsafe { loader.get_physical_device_display_properties(physical_device) }
        .map_err(|e| GraphicsError::vk("Failed to get display properties", e))?;
    if displays.is_empty() {
        return Err(display_error("Failed to find any Vulkan displays"));
    }
    let display_props = displays.get(display_index).ok_or_else(|| {
        CoreError::WindowSystem(format!(
            "Failed to find Vulkan display with index {display_index}"
        ))
    })?;
    let display = display_props.display;

    let planes = unsafe { loader.get_physical_device_display_plane_properties(physical_device) }
        .map_err(|e| GraphicsError::vk("Failed to get display plane properties", e))?;
    if planes.is_empty() {
        return Err(display_error("Failed to find any Vulkan planes"));
    }

    let modes = unsafe { loader.get_display_mode_properties(physical_device, display) }
        .map_err(|e| GraphicsError::vk("Failed to get display modes", e))?;
    if modes.is_empty() {
        return Err(display_error("Failed to find any Vulkan modes"));
    }

    let plane_index = select_plane(&planes, display, |index| {
        unsafe { loader.get_display_plane_supported_displays(physical_device, index) }
            .is_ok_and(|supported| supported.contains(&display))
    })
    .ok_or_else(|| display_error("Failed to find any planes supported by display"))?;

    let mode = select_mode(&modes, display_props.physical_resolution).ok_or_else(|| {
        display_error("Failed to find any modes matching the physical resolution")
    })?;

    Ok(vk::DisplaySurfaceCreateInfoKHR::default()
        .display_mode(mode.display_mode)
        .plane_index(plane_index)
        .plane_stack_index(0)
        .transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
        .alpha_mode(vk::DisplayPlaneAlphaFlagsKHR::OPAQUE)
        .image_extent(display_props.physical_resolution))
}

pub struct DisplayNativeSystem {
    display_index: usize,
    extent: vk::Extent2D,
}

impl DisplayNativeSystem {
    pub fn new(display_index: usize) -> Self {
        Self {
            display_index,
            extent: vk::Extent2D::default(),
        }
    }
}

impl NativeSystem for DisplayNativeSystem {
    fn instance_extensions(&self) -> Vec<&'static CStr> {
        vec![ash::khr::surface::NAME, ash::khr::display::NAME]
    }

    fn presentation_queue_family_index(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Option<u32> {
        first_queue_family(instance, physical_device)
    }

    fn should_quit(&mut self) -> bool {
        false
    }

    fn vk_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn create_vk_surface(&mut self, vulkan: &VulkanState) -> CoreResult<vk::SurfaceKHR> {
        let loader = ash::khr::display::Instance::new(vulkan.entry(), vulkan.instance());
        let info =
            display_surface_create_info(&loader, vulkan.physical_device(), self.display_index)?;
        self.extent = info.image_extent;

        let surface = unsafe { loader.create_display_plane_surface(&info, None) }
            .map_err(|e| GraphicsError::vk("Failed to create display surface", e))?;
        Ok(surface)
    }
}

/// The `display-index` option; other options are reported and ignored.
pub fn display_index_option(options: &Options) -> CoreResult<usize> {
    let mut display_index = 0;
    for opt in &options.window_system_options {
        if opt.name == DISPLAY_INDEX_OPTION {
            display_index = opt
                .value
                .parse::<usize>()
                .map_err(|_| CoreError::InvalidOptionValue {
                    name: opt.name.clone(),
                    value: opt.value.clone(),
                })?;
        } else {
            log::info!(
                "DisplayWindowSystemPlugin: Ignoring unknown window system option '{}'",
                opt.name
            );
        }
    }
    Ok(display_index)
}

/// Whether the selected device has the requested display, checked on a
/// throwaway instance.
fn probe(options: &Options) -> i32 {
    let Ok(display_index) = display_index_option(options) else {
        return PROBE_BAD;
    };
    let Ok(entry) = instance::load_entry() else {
        return PROBE_BAD;
    };
    let Ok((vk_instance, _)) = instance::create_instance(&entry, &[ash::khr::display::NAME], false)
    else {
        return PROBE_BAD;
    };

    let usable = unsafe { vk_instance.enumerate_physical_devices() }
        .ok()
        .and_then(|devices| match options.use_device_with_uuid {
            Some(uuid) => devices
                .into_iter()
                .find(|&pd| device::device_uuid(&vk_instance, pd) == uuid),
            None => devices.into_iter().next(),
        })
        .is_some_and(|physical_device| {
            let loader = ash::khr::display::Instance::new(&entry, &vk_instance);
            display_surface_create_info(&loader, physical_device, display_index).is_ok()
        });

    // SAFETY: the probe instance created no devices or surfaces.
    unsafe { vk_instance.destroy_instance(None) };

    if usable {
        PROBE_OK + DISPLAY_PRIORITY
    } else {
        PROBE_BAD
    }
}

fn create(options: &Options) -> CoreResult<Box<dyn WindowSystem>> {
    let display_index = display_index_option(options)?;
    Ok(Box::new(SwapchainWindowSystem::new(
        Box::new(DisplayNativeSystem::new(display_index)),
        options.present_mode,
        options.pixel_format,
    )))
}

pub const PLUGIN: WindowSystemPlugin = WindowSystemPlugin {
    name: "display",
    load_options: |options| {
        options.add_window_system_help(
            "Display window system options (pass in --winsys-options)\n  \
             display-index=INDEX         The index of the Vulkan display to use (default: 0)\n",
        )
    },
    probe,
    create,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use vkbench_core::options::parse_window_system_options;
    use vkbench_graphics::vk::Handle;

    fn plane(display: u64, stack_index: u32) -> vk::DisplayPlanePropertiesKHR {
        vk::DisplayPlanePropertiesKHR {
            current_display: vk::DisplayKHR::from_raw(display),
            current_stack_index: stack_index,
        }
    }

    fn mode(handle: u64, width: u32, height: u32, refresh: u32) -> vk::DisplayModePropertiesKHR {
        vk::DisplayModePropertiesKHR {
            display_mode: vk::DisplayModeKHR::from_raw(handle),
            parameters: vk::DisplayModeParametersKHR {
                visible_region: vk::Extent2D { width, height },
                refresh_rate: refresh,
            },
        }
    }

    #[test]
    fn test_select_plane_prefers_attached() {
        let display = vk::DisplayKHR::from_raw(7);
        let planes = [plane(0, 1), plane(0, 0), plane(7, 0)];
        assert_eq!(select_plane(&planes, display, |_| false), Some(2));
        assert_eq!(select_plane(&planes, display, |index| index == 1), Some(1));
    }

    #[test]
    fn test_select_plane_skips_upper_planes() {
        let display = vk::DisplayKHR::from_raw(7);
        let planes = [plane(7, 1)];
        assert_eq!(select_plane(&planes, display, |_| true), None);
    }

    #[test]
    fn test_select_mode() {
        let resolution = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        let modes = [
            mode(1, 1280, 720, 120_000),
            mode(2, 1920, 1080, 60_000),
            mode(3, 1920, 1080, 75_000),
            mode(4, 1920, 1080, 75_000),
        ];
        let selected = select_mode(&modes, resolution).unwrap();
        assert_eq!(selected.display_mode.as_raw(), 3);

        assert!(select_mode(&modes[..1], resolution).is_none());
    }

    #[rstest]
    #[case::default("", Some(0))]
    #[case::given("display-index=2", Some(2))]
    #[case::last_wins("display-index=1:display-index=3", Some(3))]
    #[case::unknown_ignored("other=1", Some(0))]
    #[case::negative("display-index=-1", None)]
    #[case::garbage("display-index=first", None)]
    fn test_display_index_option(#[case] winsys_options: &str, #[case] expected: Option<usize>) {
        let options = Options {
            window_system_options: parse_window_system_options(winsys_options).unwrap(),
            ..Options::default()
        };
        assert_eq!(display_index_option(&options).ok(), expected);
    }

    #[test]
    fn test_display_help() {
        let mut options = Options::default();
        (PLUGIN.load_options)(&mut options);
        assert!(options.window_system_help[0].contains("display-index=INDEX"));
    }
}
