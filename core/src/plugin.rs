//! Window system plugin entry points.

use crate::error::CoreResult;
use crate::options::Options;
use crate::window_system::WindowSystem;

/// The backend cannot run here.
pub const PROBE_BAD: i32 = 0;
/// The backend should work.
pub const PROBE_OK: i32 = 127;
/// The backend is clearly what the environment wants.
pub const PROBE_GOOD: i32 = 255;

/// The three entry points of a window system backend.
#[derive(Clone, Copy)]
pub struct WindowSystemPlugin {
    pub name: &'static str,
    /// Register option help text with the options.
    pub load_options: fn(&mut Options),
    /// Score how well the backend fits the environment; 0 is unusable.
    pub probe: fn(&Options) -> i32,
    pub create: fn(&Options) -> CoreResult<Box<dyn WindowSystem>>,
}

impl std::fmt::Debug for WindowSystemPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowSystemPlugin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The set of backends compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<WindowSystemPlugin>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<WindowSystemPlugin>) -> Self {
        Self { plugins }
    }

    pub fn register(&mut self, plugin: WindowSystemPlugin) {
        self.plugins.push(plugin);
    }

    pub fn find(&self, name: &str) -> Option<&WindowSystemPlugin> {
        self.plugins.iter().find(|plugin| plugin.name == name)
    }

    pub fn plugins(&self) -> &[WindowSystemPlugin] {
        &self.plugins
    }
}
