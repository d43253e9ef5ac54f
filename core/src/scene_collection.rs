//! Registry of scenes by name.

use std::collections::BTreeMap;

use crate::option::OptionError;
use crate::scene::{InvalidScene, Scene};

/// Owns every registered scene.
///
/// Lookups of unknown names never fail: they return an [`InvalidScene`]
/// carrying the requested name, which the main loop skips.
pub struct SceneCollection {
    scenes: BTreeMap<String, Box<dyn Scene>>,
    invalid: InvalidScene,
}

impl SceneCollection {
    pub fn new() -> Self {
        Self {
            scenes: BTreeMap::new(),
            invalid: InvalidScene::new(),
        }
    }

    /// Register `scene` under its own name, replacing any previous scene with
    /// that name.
    pub fn register_scene(&mut self, scene: Box<dyn Scene>) {
        self.scenes.insert(scene.name().to_string(), scene);
    }

    pub fn get_scene_by_name(&mut self, name: &str) -> &mut dyn Scene {
        match self.scenes.get_mut(name) {
            Some(scene) => scene.as_mut(),
            None => {
                self.invalid.rename(name);
                &mut self.invalid
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scenes.contains_key(name)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &dyn Scene> {
        self.scenes.values().map(|scene| scene.as_ref())
    }

    /// Install `value` as the default of option `name` on every scene.
    ///
    /// Scenes without the option are left alone; a scene that has the option
    /// but rejects the value gets a warning.
    pub fn set_option_default(&mut self, name: &str, value: &str) {
        for scene in self.scenes.values_mut() {
            if let Err(OptionError::RejectedValue) = scene.set_option_default(name, value) {
                log::warn!(
                    "Scene '{}' doesn't accept default value '{}' for option '{}'",
                    scene.name(),
                    value,
                    name
                );
            }
        }
    }

    /// Describe every normal scene and its options.
    pub fn log_scene_info(&self) {
        for scene in self.scenes().filter(|scene| !scene.name().is_empty()) {
            log::info!("[Scene] {}", scene.name());

            for opt in scene.options().values() {
                log::info!("  [Option] {}", opt.name);
                log::info!("    Description  : {}", opt.description);
                log::info!("    Default Value: {}", opt.default_value);

                if !opt.acceptable_values.is_empty() {
                    log::info!(
                        "    Acceptable Values: {}",
                        opt.acceptable_values.join(",")
                    );
                }
            }
        }
    }
}

impl Default for SceneCollection {
    fn default() -> Self {
        Self::new()
    }
}
