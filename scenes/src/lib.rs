//! # vkbench scenes
//!
//! The scenes a benchmark run can name. [`register_scenes`] installs all of
//! them, together with the option-propagating pseudo-scene, into a
//! [`SceneCollection`].

pub mod clear;

pub use clear::ClearScene;

use vkbench_core::{DefaultOptionsScene, SceneCollection};

/// Register every built-in scene.
pub fn register_scenes(scenes: &mut SceneCollection) {
    scenes.register_scene(Box::new(ClearScene::new()));
    scenes.register_scene(Box::new(DefaultOptionsScene::new()));
}
