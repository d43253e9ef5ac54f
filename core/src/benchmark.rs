//! A scene paired with the option overrides of one benchmark description.

use crate::option::OptionError;
use crate::scene::Scene;
use crate::scene_collection::SceneCollection;

pub type OptionPair = (String, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Benchmark {
    scene_name: String,
    options: Vec<OptionPair>,
}

impl Benchmark {
    pub fn new(scene_name: impl Into<String>, options: Vec<OptionPair>) -> Self {
        Self {
            scene_name: scene_name.into(),
            options,
        }
    }

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    pub fn options(&self) -> &[OptionPair] {
        &self.options
    }

    /// Look up the scene, reset its options and apply this benchmark's
    /// overrides. Options the scene refuses are reported and skipped.
    pub fn prepare_scene<'a>(&self, scenes: &'a mut SceneCollection) -> &'a mut dyn Scene {
        let scene = scenes.get_scene_by_name(&self.scene_name);

        scene.reset_options();

        for (name, value) in &self.options {
            match scene.set_option(name, value) {
                Ok(()) => {}
                Err(OptionError::NoSuchOption) => {
                    log::warn!("Scene '{}' doesn't accept option '{}'", scene.name(), name);
                }
                Err(OptionError::RejectedValue) => {
                    log::warn!(
                        "Scene '{}' doesn't accept value '{}' for option '{}'",
                        scene.name(),
                        value,
                        name
                    );
                }
            }
        }

        scene
    }
}
