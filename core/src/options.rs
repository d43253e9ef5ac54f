//! Run configuration shared by the loader, the window systems and the main
//! loop.

use std::path::PathBuf;

use vkbench_graphics::vk;
use vkbench_graphics::{DeviceUuid, format};

use crate::error::{CoreError, CoreResult};
use crate::util;

pub const WINDOW_SYSTEM_DIR_ENV: &str = "VKBENCH_WINDOW_SYSTEM_DIR";

/// A `name=value` pair passed to the window system with `--winsys-options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSystemOption {
    pub name: String,
    pub value: String,
}

/// Everything the command line configures.
#[derive(Debug, Clone)]
pub struct Options {
    pub benchmarks: Vec<String>,
    /// Window size; `(-1, -1)` means fullscreen.
    pub size: (i32, i32),
    pub present_mode: vk::PresentModeKHR,
    /// `UNDEFINED` lets the window system choose.
    pub pixel_format: vk::Format,
    pub list_scenes: bool,
    pub show_all_options: bool,
    pub window_system_dir: Option<PathBuf>,
    pub window_system: Option<String>,
    pub window_system_options: Vec<WindowSystemOption>,
    pub run_forever: bool,
    pub show_debug: bool,
    pub list_devices: bool,
    pub use_device_with_uuid: Option<DeviceUuid>,
    /// Help text contributed by each window system.
    pub window_system_help: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            benchmarks: Vec::new(),
            size: (800, 600),
            present_mode: vk::PresentModeKHR::MAILBOX,
            pixel_format: vk::Format::UNDEFINED,
            list_scenes: false,
            show_all_options: false,
            window_system_dir: std::env::var_os(WINDOW_SYSTEM_DIR_ENV).map(PathBuf::from),
            window_system: None,
            window_system_options: Vec::new(),
            run_forever: false,
            show_debug: false,
            list_devices: false,
            use_device_with_uuid: None,
            window_system_help: Vec::new(),
        }
    }
}

impl Options {
    pub fn fullscreen(&self) -> bool {
        self.size == (-1, -1)
    }

    pub fn add_window_system_help(&mut self, help: impl Into<String>) {
        self.window_system_help.push(help.into());
    }

    /// The last value given for window system option `name`.
    pub fn winsys_option(&self, name: &str) -> Option<&str> {
        self.window_system_options
            .iter()
            .rev()
            .find(|opt| opt.name == name)
            .map(|opt| opt.value.as_str())
    }

    /// Parse window system option `name` as a number, falling back to
    /// `default` when it was not given.
    pub fn winsys_option_parsed<T: std::str::FromStr>(&self, name: &str, default: T) -> CoreResult<T> {
        match self.winsys_option(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| CoreError::InvalidOptionValue {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// Parse `WxH`; a single number `N` means `NxN`.
pub fn parse_size(s: &str) -> Result<(i32, i32), String> {
    let dims = util::split(s, 'x');
    let parse = |d: &str| {
        d.trim()
            .parse::<i32>()
            .map_err(|_| format!("invalid size '{s}'"))
    };
    match dims.as_slice() {
        [n] => {
            let n = parse(n)?;
            Ok((n, n))
        }
        [w, h] => Ok((parse(w)?, parse(h)?)),
        _ => Err(format!("invalid size '{s}'")),
    }
}

/// Parse `opt1=val1(:opt2=val2)*`. Any segment that is not a single
/// `name=value` pair is an error.
pub fn parse_window_system_options(s: &str) -> CoreResult<Vec<WindowSystemOption>> {
    util::split(s, ':')
        .into_iter()
        .map(|segment| match util::split(segment, '=').as_slice() {
            [name, value] => Ok(WindowSystemOption {
                name: name.to_string(),
                value: value.to_string(),
            }),
            _ => Err(CoreError::InvalidWindowSystemOption(segment.to_string())),
        })
        .collect()
}

/// Parse a Vulkan format name, or `UNDEFINED` when the name is unknown.
pub fn parse_pixel_format(s: &str) -> vk::Format {
    format::parse_format(s).unwrap_or(vk::Format::UNDEFINED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.size, (800, 600));
        assert_eq!(options.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(options.pixel_format, vk::Format::UNDEFINED);
        assert!(!options.fullscreen());
        assert!(options.window_system.is_none());
    }

    #[rstest]
    #[case::pair("1024x768", (1024, 768))]
    #[case::square("500", (500, 500))]
    #[case::fullscreen("-1x-1", (-1, -1))]
    fn test_parse_size(#[case] text: &str, #[case] expected: (i32, i32)) {
        assert_eq!(parse_size(text), Ok(expected));
    }

    #[rstest]
    #[case::garbage("big")]
    #[case::three_dims("1x2x3")]
    #[case::empty("")]
    fn test_parse_size_errors(#[case] text: &str) {
        assert!(parse_size(text).is_err());
    }

    #[test]
    fn test_parse_window_system_options() {
        let opts = parse_window_system_options("width=100:height=50").unwrap();
        assert_eq!(
            opts,
            vec![
                WindowSystemOption {
                    name: "width".into(),
                    value: "100".into()
                },
                WindowSystemOption {
                    name: "height".into(),
                    value: "50".into()
                },
            ]
        );
    }

    #[rstest]
    #[case::no_equals("width")]
    #[case::trailing_colon("width=1:")]
    #[case::two_equals("a=b=c")]
    fn test_parse_window_system_options_errors(#[case] text: &str) {
        let err = parse_window_system_options(text).unwrap_err();
        assert!(err.to_string().starts_with("Invalid window system option"));
    }

    #[test]
    fn test_winsys_option_lookup() {
        let options = Options {
            window_system_options: parse_window_system_options("width=100:width=200:height=x")
                .unwrap(),
            ..Options::default()
        };
        assert_eq!(options.winsys_option("width"), Some("200"));
        assert_eq!(options.winsys_option_parsed("width", 512u32).unwrap(), 200);
        assert_eq!(options.winsys_option_parsed("num-buffers", 3u32).unwrap(), 3);
        assert!(options.winsys_option_parsed("height", 512u32).is_err());
    }

    #[test]
    fn test_parse_pixel_format() {
        assert_eq!(parse_pixel_format("b8g8r8a8_srgb"), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(parse_pixel_format("nonsense"), vk::Format::UNDEFINED);
    }
}
