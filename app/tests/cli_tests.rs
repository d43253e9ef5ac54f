//! Command line parsing through the public interface.

use rstest::rstest;
use vkbench::{CommandLine, help_text};
use vkbench_core::{Options, WindowSystemOption};
use vkbench_graphics::vk;

fn parse(args: &[&str]) -> CommandLine {
    CommandLine::parse_from(std::iter::once("vkbench").chain(args.iter().copied())).unwrap()
}

fn parse_err(args: &[&str]) -> clap::Error {
    CommandLine::parse_from(std::iter::once("vkbench").chain(args.iter().copied())).unwrap_err()
}

#[test]
fn test_defaults() {
    let options = parse(&[]).options;
    assert!(options.benchmarks.is_empty());
    assert_eq!(options.size, (800, 600));
    assert_eq!(options.present_mode, vk::PresentModeKHR::MAILBOX);
    assert_eq!(options.pixel_format, vk::Format::UNDEFINED);
    assert!(options.window_system.is_none());
    assert!(options.window_system_options.is_empty());
    assert!(options.use_device_with_uuid.is_none());
    assert!(!options.run_forever);
    assert!(!options.show_debug);
}

#[test]
fn test_repeated_benchmarks_keep_order() {
    let options = parse(&["-b", "clear", "--benchmark", "clear:color=1.0", "-b", ":duration=3"]).options;
    assert_eq!(options.benchmarks, vec!["clear", "clear:color=1.0", ":duration=3"]);
}

#[rstest]
#[case::pair(&["-s", "1024x768"], (1024, 768))]
#[case::square(&["--size", "500"], (500, 500))]
#[case::fullscreen(&["--fullscreen"], (-1, -1))]
#[case::fullscreen_wins(&["-s", "640x480", "--fullscreen"], (-1, -1))]
fn test_size(#[case] args: &[&str], #[case] expected: (i32, i32)) {
    let options = parse(args).options;
    assert_eq!(options.size, expected);
    assert_eq!(options.fullscreen(), expected == (-1, -1));
}

#[rstest]
#[case::immediate("immediate", vk::PresentModeKHR::IMMEDIATE)]
#[case::mailbox("mailbox", vk::PresentModeKHR::MAILBOX)]
#[case::fifo("fifo", vk::PresentModeKHR::FIFO)]
#[case::fifo_relaxed("fiforelaxed", vk::PresentModeKHR::FIFO_RELAXED)]
fn test_present_mode(#[case] name: &str, #[case] expected: vk::PresentModeKHR) {
    assert_eq!(parse(&["-p", name]).options.present_mode, expected);
}

#[rstest]
#[case::lower("b8g8r8a8_srgb", vk::Format::B8G8R8A8_SRGB)]
#[case::no_underscores("R8G8B8A8UNORM", vk::Format::R8G8B8A8_UNORM)]
#[case::unknown("not_a_format", vk::Format::UNDEFINED)]
fn test_pixel_format(#[case] name: &str, #[case] expected: vk::Format) {
    assert_eq!(parse(&["--pixel-format", name]).options.pixel_format, expected);
}

#[test]
fn test_winsys_selection_and_options() {
    let options = parse(&["--winsys", "nows", "--winsys-options", "width=100:height=50"]).options;
    assert_eq!(options.window_system.as_deref(), Some("nows"));
    assert_eq!(
        options.window_system_options,
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
    assert_eq!(options.winsys_option("height"), Some("50"));
}

#[test]
fn test_malformed_winsys_options() {
    let err = parse_err(&["--winsys-options", "width=100:height"]);
    assert!(err.to_string().contains("Invalid window system option 'height'"));
}

#[test]
fn test_flags() {
    let command_line = parse(&["-l", "--show-all-options", "--run-forever", "-d", "-L", "-h"]);
    let options = command_line.options;
    assert!(options.list_scenes);
    assert!(options.show_all_options);
    assert!(options.run_forever);
    assert!(options.show_debug);
    assert!(options.list_devices);
    assert!(command_line.show_help);
}

#[test]
fn test_use_device() {
    let options = parse(&["-D", "00112233445566778899aabbccddeeff"]).options;
    let uuid = options.use_device_with_uuid.unwrap();
    assert_eq!(uuid.representation(), "00112233445566778899aabbccddeeff");
}

#[rstest]
#[case::too_short("0011")]
#[case::upper_case("00112233445566778899AABBCCDDEEFF")]
#[case::not_hex("zz112233445566778899aabbccddeeff")]
fn test_bad_device_uuid(#[case] uuid: &str) {
    parse_err(&["--use-device", uuid]);
}

#[rstest]
#[case::unknown_flag(&["--frobnicate"])]
#[case::bad_size(&["-s", "big"])]
#[case::bad_present_mode(&["-p", "vsync"])]
#[case::no_data_dir(&["--data-dir", "/tmp"])]
fn test_parse_errors(#[case] args: &[&str]) {
    let err = parse_err(args);
    assert!(err.use_stderr());
}

#[test]
fn test_help_includes_window_system_help() {
    let mut options = Options::default();
    for plugin in vkbench_winsys::builtin_plugins() {
        (plugin.load_options)(&mut options);
    }
    let help = help_text(&options);
    assert!(help.contains("--winsys-options"));
    assert!(help.contains("kms-drm-device"));
    assert!(help.contains("display-index"));
}
