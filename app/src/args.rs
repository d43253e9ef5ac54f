//! Command line parsing.
//!
//! Uses clap for the flags themselves and converts the result into the
//! [`Options`] the rest of the benchmark reads. Help is handled here rather
//! than by clap, because it has to include the option help of every window
//! system, which is only known once the window system directory is.

use std::ffi::OsString;
use std::path::PathBuf;

use vkbench_core::options::{parse_pixel_format, parse_size, parse_window_system_options};
use vkbench_core::{Options, WindowSystemOption};
use vkbench_graphics::{DeviceUuid, vk};

/// Present mode selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliPresentMode {
    Immediate,
    #[default]
    Mailbox,
    Fifo,
    #[value(name = "fiforelaxed")]
    FifoRelaxed,
}

impl From<CliPresentMode> for vk::PresentModeKHR {
    fn from(cli: CliPresentMode) -> Self {
        match cli {
            CliPresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
            CliPresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
            CliPresentMode::Fifo => vk::PresentModeKHR::FIFO,
            CliPresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        }
    }
}

/// Parsed `--winsys-options`, kept whole so clap treats it as one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinsysOptions(Vec<WindowSystemOption>);

fn parse_winsys_options(s: &str) -> Result<WinsysOptions, String> {
    parse_window_system_options(s)
        .map(WinsysOptions)
        .map_err(|e| e.to_string())
}

fn parse_uuid(s: &str) -> Result<DeviceUuid, String> {
    s.parse().map_err(|e: vkbench_graphics::GraphicsError| e.to_string())
}

/// The outcome of parsing the command line.
#[derive(Debug, Clone)]
pub struct CommandLine {
    pub options: Options,
    /// `-h/--help` was given.
    pub show_help: bool,
}

impl CommandLine {
    /// Parse the process arguments.
    pub fn parse() -> Result<Self, clap::Error> {
        Self::parse_from(std::env::args_os())
    }

    pub fn parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        use clap::Parser;
        native::ClapArgs::try_parse_from(args).map(Into::into)
    }
}

/// Full help text, followed by the help of each window system in `options`.
pub fn help_text(options: &Options) -> String {
    use clap::CommandFactory;

    let mut command = native::ClapArgs::command();
    if !options.window_system_help.is_empty() {
        command = command.after_help(options.window_system_help.join("\n"));
    }
    command.render_help().to_string()
}

// ============================================================================
// clap definition
// ============================================================================

mod native {
    use super::*;
    use clap::{ArgAction, Parser};

    /// vkbench command line.
    #[derive(Parser, Debug)]
    #[command(
        name = "vkbench",
        about = "A Vulkan benchmark",
        long_about = "A Vulkan benchmark.\n\n\
            Runs a sequence of scenes, prints the frame rate of each and a \
            final score.\n\n\
            EXAMPLES:\n\
              # Run the default benchmarks in an 800x600 window\n\
              vkbench\n\
            \n\
              # Clear to white, fullscreen, with FIFO presentation\n\
              vkbench --fullscreen -p fifo -b clear:color=1.0,1.0,1.0,1.0\n\
            \n\
              # Render offscreen into 1024x1024 images\n\
              vkbench --winsys nows --winsys-options width=1024:height=1024",
        version,
        disable_help_flag = true
    )]
    pub(super) struct ClapArgs {
        /// A benchmark to run: 'scene(:opt1=val1)*'. May be repeated.
        #[arg(short, long = "benchmark", value_name = "BENCH", action = ArgAction::Append)]
        pub benchmarks: Vec<String>,

        /// Window size as WxH, or N for NxN [default: 800x600].
        #[arg(short, long, value_name = "WxH", value_parser = parse_size)]
        pub size: Option<(i32, i32)>,

        /// Use a fullscreen window (same as -s -1x-1).
        #[arg(long)]
        pub fullscreen: bool,

        /// Vulkan present mode.
        #[arg(short, long, value_name = "PM", default_value = "mailbox", value_enum)]
        pub present_mode: CliPresentMode,

        /// Vulkan pixel format, e.g. b8g8r8a8_srgb.
        #[arg(long, value_name = "PF")]
        pub pixel_format: Option<String>,

        /// Display information about the available scenes and their options.
        #[arg(short, long)]
        pub list_scenes: bool,

        /// Show all scene option values used for benchmarks, not only those
        /// explicitly set in the '-b' benchmark description strings.
        #[arg(long)]
        pub show_all_options: bool,

        /// Directory to search for window system modules.
        #[arg(long, value_name = "DIR", env = "VKBENCH_WINDOW_SYSTEM_DIR")]
        pub winsys_dir: Option<PathBuf>,

        /// Window system to use; probed when not given.
        #[arg(long, value_name = "WS")]
        pub winsys: Option<String>,

        /// Window system options as 'opt1=val1(:opt2=val2)*'.
        #[arg(long, value_name = "OPTS", value_parser = parse_winsys_options)]
        pub winsys_options: Option<WinsysOptions>,

        /// Run indefinitely, looping from the last benchmark back to the first.
        #[arg(long)]
        pub run_forever: bool,

        /// Display debug messages.
        #[arg(short, long)]
        pub debug: bool,

        /// Use the Vulkan device with the specified pipeline cache UUID.
        #[arg(short = 'D', long, value_name = "UUID", value_parser = parse_uuid)]
        pub use_device: Option<DeviceUuid>,

        /// List the available Vulkan devices.
        #[arg(short = 'L', long)]
        pub list_devices: bool,

        /// Display help.
        #[arg(short, long)]
        pub help: bool,
    }

    impl From<ClapArgs> for CommandLine {
        fn from(args: ClapArgs) -> Self {
            let defaults = Options::default();

            // --fullscreen wins over an explicit --size
            let size = if args.fullscreen {
                (-1, -1)
            } else {
                args.size.unwrap_or(defaults.size)
            };

            // Unknown names fall back to UNDEFINED, letting the window system choose.
            let pixel_format = args
                .pixel_format
                .as_deref()
                .map_or(defaults.pixel_format, parse_pixel_format);

            let options = Options {
                benchmarks: args.benchmarks,
                size,
                present_mode: args.present_mode.into(),
                pixel_format,
                list_scenes: args.list_scenes,
                show_all_options: args.show_all_options,
                window_system_dir: args.winsys_dir,
                window_system: args.winsys,
                window_system_options: args.winsys_options.map(|o| o.0).unwrap_or_default(),
                run_forever: args.run_forever,
                show_debug: args.debug,
                list_devices: args.list_devices,
                use_device_with_uuid: args.use_device,
                window_system_help: Vec::new(),
            };

            Self {
                options,
                show_help: args.help,
            }
        }
    }
}
