//! Window system selection through the loader's public interface.

mod common;

use common::NullWindowSystem;
use vkbench_core::{
    CoreResult, Options, PROBE_BAD, PROBE_GOOD, PROBE_OK, PluginRegistry, WindowSystem,
    WindowSystemLoader, WindowSystemPlugin,
};

fn create_null(_: &Options) -> CoreResult<Box<dyn WindowSystem>> {
    Ok(Box::new(NullWindowSystem::new()))
}

fn no_options(_: &mut Options) {}

fn registry() -> PluginRegistry {
    PluginRegistry::new(vec![
        WindowSystemPlugin {
            name: "medium",
            load_options: no_options,
            probe: |_| PROBE_OK,
            create: create_null,
        },
        WindowSystemPlugin {
            name: "best",
            load_options: no_options,
            probe: |_| PROBE_GOOD,
            create: create_null,
        },
        WindowSystemPlugin {
            name: "unusable",
            load_options: no_options,
            probe: |_| PROBE_BAD,
            create: create_null,
        },
    ])
}

fn options() -> Options {
    Options {
        window_system_dir: None,
        ..Options::default()
    }
}

#[test]
fn test_selects_highest_probe_score() {
    let options = options();
    let mut loader = WindowSystemLoader::new(&registry(), &options);
    loader.load_window_system(&options).unwrap();
    assert_eq!(loader.selected(), Some("best"));
}

#[test]
fn test_forced_window_system_skips_probing() {
    let options = Options {
        window_system: Some("unusable".into()),
        ..options()
    };
    let mut loader = WindowSystemLoader::new(&registry(), &options);
    loader.load_window_system(&options).unwrap();
    assert_eq!(loader.selected(), Some("unusable"));
}

#[test]
fn test_window_system_is_created_once() {
    let options = options();
    let mut loader = WindowSystemLoader::new(&registry(), &options);
    loader
        .load_window_system(&options)
        .unwrap()
        .present_vulkan_image(&NullWindowSystem::new().vulkan_images()[0])
        .unwrap();

    // A later forced choice does not replace the cached window system.
    let forced = Options {
        window_system: Some("medium".into()),
        ..options.clone()
    };
    loader.load_window_system(&forced).unwrap();
    assert_eq!(loader.selected(), Some("best"));
    assert!(loader.window_system_mut().is_some());
}

#[test]
fn test_no_usable_window_system() {
    let options = options();
    let registry = PluginRegistry::new(vec![WindowSystemPlugin {
        name: "unusable",
        load_options: no_options,
        probe: |_| PROBE_BAD,
        create: create_null,
    }]);
    let mut loader = WindowSystemLoader::new(&registry, &options);
    let err = loader.load_window_system(&options).err().unwrap();
    assert_eq!(
        err.to_string(),
        "no usable window system found, try specifying search directory"
    );
    assert!(loader.selected().is_none());
}
