//! # vkbench core
//!
//! The benchmark machinery independent of any particular window system or
//! scene:
//!
//! - [`Scene`] and [`SceneCollection`] - scene lifecycle, options and lookup
//! - [`BenchmarkCollection`] - parsing of `scene(:option=value)*` descriptions
//! - [`WindowSystemLoader`] - probing and selection of window system plugins
//! - [`MainLoop`] - running benchmarks and computing the score

pub mod benchmark;
pub mod benchmark_collection;
pub mod error;
pub mod loader;
pub mod main_loop;
pub mod option;
pub mod options;
pub mod plugin;
pub mod profiling;
pub mod scene;
pub mod scene_collection;
pub mod util;
pub mod window_system;

pub use benchmark::Benchmark;
pub use benchmark_collection::{BenchmarkCollection, DEFAULT_BENCHMARKS};
pub use error::{CoreError, CoreResult};
pub use loader::WindowSystemLoader;
pub use main_loop::{CONTINUED_TARGET, MainLoop, StopHandle};
pub use option::{OptionError, SceneOption};
pub use options::{Options, WindowSystemOption};
pub use plugin::{PROBE_BAD, PROBE_GOOD, PROBE_OK, PluginRegistry, WindowSystemPlugin};
pub use scene::{DefaultOptionsScene, InvalidScene, Scene, SceneBase};
pub use scene_collection::SceneCollection;
pub use window_system::WindowSystem;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
