//! Vulkan instance creation and configuration.

use std::ffi::{CStr, c_char};

use ash::vk;

use crate::error::GraphicsError;

use super::debug;

/// Vulkan 1.0 is enough for everything the benchmark submits.
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 0, 0);

/// Validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

const APPLICATION_NAME: &CStr = c"vkbench";

/// Create a Vulkan instance enabling the window system's extensions.
///
/// When `validation_enabled` is set and the Khronos validation layer is
/// installed, the layer is enabled and a debug messenger routing to `log` is
/// created. Returns the instance and, if validation is active, the messenger
/// with its extension loader.
pub fn create_instance(
    entry: &ash::Entry,
    wsi_extensions: &[&CStr],
    validation_enabled: bool,
) -> Result<
    (
        ash::Instance,
        Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ),
    GraphicsError,
> {
    let validation_available = validation_enabled && check_validation_layer_support(entry);

    if validation_enabled && !validation_available {
        log::debug!("VK_LAYER_KHRONOS_validation is not supported");
    }

    let app_info = vk::ApplicationInfo::default()
        .application_name(APPLICATION_NAME)
        .api_version(REQUIRED_API_VERSION);

    let mut extensions: Vec<*const c_char> = wsi_extensions.iter().map(|e| e.as_ptr()).collect();
    if !wsi_extensions.contains(&ash::khr::surface::NAME) {
        extensions.push(ash::khr::surface::NAME.as_ptr());
    }
    if validation_available {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layer_names: Vec<*const c_char> = if validation_available {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create Vulkan instance: {:?}", e))
    })?;

    let debug = if validation_available {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
        match debug::create_debug_messenger(&debug_utils) {
            Ok(messenger) => Some((debug_utils, messenger)),
            Err(e) => {
                // SAFETY: no child objects were created from the instance yet
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        }
    } else {
        None
    };

    Ok((instance, debug))
}

/// Check if the validation layer is available.
fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let available_layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(_) => return false,
    };

    available_layers
        .iter()
        .any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
        })
}

/// Load the Vulkan loader library.
pub fn load_entry() -> Result<ash::Entry, GraphicsError> {
    // SAFETY: the loader library is kept loaded as long as the entry lives
    unsafe { ash::Entry::load() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to load Vulkan library: {}", e))
    })
}
