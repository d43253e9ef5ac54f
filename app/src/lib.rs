//! # vkbench
//!
//! The benchmark binary: parses the command line, sets up logging and
//! signal handling, picks a window system and a Vulkan device, and runs the
//! requested benchmarks through the [`MainLoop`].
//!
//! ## Overview
//!
//! - [`CommandLine`] - clap based parsing into [`Options`]
//! - [`logging::init`] - the stdout logger
//! - [`signal::install_stop_handler`] - SIGINT/SIGTERM stop the run
//! - [`run`] - the whole program, returning its exit code

pub mod args;
pub mod logging;
pub mod signal;

pub use args::{CliPresentMode, CommandLine, help_text};

use vkbench_core::{
    BenchmarkCollection, CoreResult, DEFAULT_BENCHMARKS, MainLoop, Options, SceneCollection,
    StopHandle, WindowSystem, WindowSystemLoader,
};
use vkbench_graphics::{GpuContext, PhysicalDeviceStrategy, VulkanState};

/// App version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const SEPARATOR: &str = "=======================================================";

/// The device selection `--use-device` asks for.
pub fn device_strategy(options: &Options) -> PhysicalDeviceStrategy {
    match options.use_device_with_uuid {
        Some(uuid) => PhysicalDeviceStrategy::ByUuid(uuid),
        None => PhysicalDeviceStrategy::FirstSupported,
    }
}

/// The benchmarks to run: the requested ones, plus the defaults when none of
/// the requested ones is a real scene.
pub fn benchmark_collection(options: &Options) -> BenchmarkCollection {
    let mut benchmarks = BenchmarkCollection::new();
    benchmarks.add(&options.benchmarks);
    if !benchmarks.contains_normal_scenes() {
        benchmarks.add(DEFAULT_BENCHMARKS);
    }
    benchmarks
}

/// Run vkbench with the process arguments and return the exit code.
pub fn run() -> i32 {
    let command_line = match CommandLine::parse() {
        Ok(command_line) => command_line,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            if let Err(print_err) = e.print() {
                eprintln!("{print_err}");
            }
            return code;
        }
    };

    logging::init(command_line.options.show_debug);

    match run_with(command_line) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            1
        }
    }
}

/// Everything after argument parsing.
pub fn run_with(command_line: CommandLine) -> CoreResult<()> {
    let CommandLine {
        mut options,
        show_help,
    } = command_line;

    let registry = vkbench_winsys::builtin_registry();
    let mut loader = WindowSystemLoader::new(&registry, &options);
    loader.load_window_system_options(&mut options);

    if show_help {
        print!("{}", help_text(&options));
        return Ok(());
    }

    let mut scenes = SceneCollection::new();
    vkbench_scenes::register_scenes(&mut scenes);

    if options.list_scenes {
        scenes.log_scene_info();
        return Ok(());
    }

    let ws = loader.load_window_system(&options)?;
    let vulkan = VulkanState::new(ws.vulkan_wsi(), device_strategy(&options), options.show_debug)?;

    if options.list_devices {
        vulkan.log_all_devices()?;
        return Ok(());
    }

    ws.init_vulkan(&vulkan)?;
    let ctx = GpuContext::from(vulkan);
    let result = run_benchmarks(&ctx, ws, &mut scenes, &options);
    ws.deinit_vulkan();
    result
}

fn run_benchmarks(
    ctx: &GpuContext,
    ws: &mut dyn WindowSystem,
    scenes: &mut SceneCollection,
    options: &Options,
) -> CoreResult<()> {
    log::info!("{}", SEPARATOR);
    log::info!("    vkbench {}", VERSION);
    log::info!("{}", SEPARATOR);
    ctx.vulkan()?.log_info();
    log::info!("{}", SEPARATOR);

    let benchmarks = benchmark_collection(options);
    let stop = signal::install_stop_handler(StopHandle::new());
    let mut main_loop = MainLoop::new(ctx, ws, scenes, &benchmarks, options).with_stop_handle(stop);
    main_loop.run();

    log::info!("{}", SEPARATOR);
    log::info!("                                   vkbench Score: {}", main_loop.score());
    log::info!("{}", SEPARATOR);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkbench_graphics::DeviceUuid;

    #[test]
    fn test_device_strategy() {
        let mut options = Options::default();
        assert!(matches!(
            device_strategy(&options),
            PhysicalDeviceStrategy::FirstSupported
        ));

        let uuid: DeviceUuid = "000102030405060708090a0b0c0d0e0f".parse().unwrap();
        options.use_device_with_uuid = Some(uuid);
        assert!(matches!(
            device_strategy(&options),
            PhysicalDeviceStrategy::ByUuid(u) if u == uuid
        ));
    }

    #[test]
    fn test_defaults_added_without_normal_scenes() {
        let options = Options {
            benchmarks: vec![":duration=2.0".to_string()],
            ..Options::default()
        };
        let benchmarks = benchmark_collection(&options);
        assert_eq!(benchmarks.benchmarks().len(), 1 + DEFAULT_BENCHMARKS.len());
        assert!(benchmarks.contains_normal_scenes());
    }

    #[test]
    fn test_requested_benchmarks_only() {
        let options = Options {
            benchmarks: vec!["clear:color=0.5".to_string()],
            ..Options::default()
        };
        assert_eq!(benchmark_collection(&options).benchmarks().len(), 1);
    }
}
