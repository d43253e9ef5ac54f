//! # vkbench window systems
//!
//! Every presentation backend the benchmark ships with, exposed as
//! [`WindowSystemPlugin`] entry points:
//!
//! - `xcb`, `wayland` - winit windows presenting through a swapchain
//! - `display` - fullscreen on a `VK_KHR_display` display
//! - `headless` - `VK_EXT_headless_surface`, only used when forced
//! - `kms` - direct DRM/KMS scanout, legacy or atomic
//! - `nows` - offscreen images that are never shown

pub mod display;
pub mod headless;
pub mod kms;
pub mod native;
pub mod nows;
pub mod swapchain;
pub mod windowed;

use vkbench_core::{PluginRegistry, WindowSystemPlugin};

pub use native::NativeSystem;
pub use swapchain::SwapchainWindowSystem;

/// The compiled-in backends, in probing order.
pub fn builtin_plugins() -> Vec<WindowSystemPlugin> {
    vec![
        windowed::XCB_PLUGIN,
        windowed::WAYLAND_PLUGIN,
        display::PLUGIN,
        kms::PLUGIN,
        headless::PLUGIN,
        nows::PLUGIN,
    ]
}

/// A registry holding [`builtin_plugins`].
pub fn builtin_registry() -> PluginRegistry {
    PluginRegistry::new(builtin_plugins())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use vkbench_core::Options;

    #[test]
    fn test_plugin_names_unique() {
        let plugins = builtin_plugins();
        let names: HashSet<_> = plugins.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), plugins.len());
        for name in ["xcb", "wayland", "display", "kms", "headless", "nows"] {
            assert!(names.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_fixed_probe_scores() {
        let registry = builtin_registry();
        let options = Options::default();
        assert_eq!((registry.find("headless").unwrap().probe)(&options), 0);
        assert_eq!((registry.find("nows").unwrap().probe)(&options), 1);
    }

    #[test]
    fn test_every_plugin_has_help() {
        let mut options = Options::default();
        for plugin in builtin_plugins() {
            (plugin.load_options)(&mut options);
        }
        assert!(options.window_system_help.len() >= 3);
    }
}
