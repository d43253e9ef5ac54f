//! The scene capability and the state every scene shares.
//!
//! A scene goes through `setup`, `start`, a number of `draw` + `update`
//! frames and finally `teardown`. Timing and option handling live in
//! [`SceneBase`], which implementors embed and expose through
//! [`Scene::base`] and [`Scene::base_mut`].

use std::collections::BTreeMap;

use vkbench_graphics::vk;
use vkbench_graphics::{GpuContext, VulkanImage};

use crate::error::CoreResult;
use crate::option::{OptionError, SceneOption};
use crate::util;

pub const DURATION_OPTION: &str = "duration";

/// Frames per second over `elapsed_us` microseconds, truncated.
///
/// Zero elapsed time yields zero rather than a division by zero.
pub fn average_fps(frames: u32, elapsed_us: u64) -> u32 {
    if elapsed_us == 0 {
        return 0;
    }
    let elapsed_sec = elapsed_us as f64 / 1_000_000.0;
    (frames as f64 / elapsed_sec) as u32
}

/// Name, options and run timing of a scene.
#[derive(Debug, Clone)]
pub struct SceneBase {
    name: String,
    options: BTreeMap<String, SceneOption>,
    start_time: u64,
    last_update_time: u64,
    current_frame: u32,
    running: bool,
    duration: u64,
}

impl SceneBase {
    /// A base with the `duration` option every scene has.
    pub fn new(name: &str) -> Self {
        let mut base = Self {
            name: name.to_string(),
            options: BTreeMap::new(),
            start_time: 0,
            last_update_time: 0,
            current_frame: 0,
            running: false,
            duration: 0,
        };
        base.add_option(SceneOption::new(
            DURATION_OPTION,
            "10.0",
            "The duration of each benchmark in seconds",
            "",
        ));
        base
    }

    pub fn add_option(&mut self, option: SceneOption) {
        self.options.insert(option.name.clone(), option);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn options(&self) -> &BTreeMap<String, SceneOption> {
        &self.options
    }

    /// Current value of `name`, if the scene has such an option.
    pub fn option_value(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(|opt| opt.value.as_str())
    }

    /// Freeze the run duration from the `duration` option.
    pub fn setup(&mut self) {
        let seconds = self
            .option_value(DURATION_OPTION)
            .map(util::parse_f64_or_zero)
            .unwrap_or(0.0);
        self.duration = (1_000_000.0 * seconds).max(0.0) as u64;
    }

    pub fn start(&mut self) {
        self.current_frame = 0;
        self.running = true;
        self.start_time = util::timestamp_us();
        self.last_update_time = self.start_time;
    }

    pub fn update(&mut self) {
        self.update_at(util::timestamp_us());
    }

    /// Account for one frame finished at `now_us`.
    pub fn update_at(&mut self, now_us: u64) {
        let elapsed = now_us.saturating_sub(self.start_time);

        self.current_frame = self.current_frame.saturating_add(1);
        self.last_update_time = now_us;

        if elapsed >= self.duration {
            self.running = false;
        }
    }

    /// Stop the run before the duration is up.
    pub fn finish(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Timestamp of the last `start`, in microseconds.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Run duration in microseconds, valid after `setup`.
    pub fn duration_us(&self) -> u64 {
        self.duration
    }

    /// Microseconds between `start` and the last `update`.
    pub fn elapsed_us(&self) -> u64 {
        self.last_update_time.saturating_sub(self.start_time)
    }

    pub fn average_fps(&self) -> u32 {
        average_fps(self.current_frame, self.elapsed_us())
    }

    pub fn info_string(&self, show_all_options: bool) -> String {
        let mut info = format!("[{}] ", self.name);
        let mut option_shown = false;

        for (name, opt) in &self.options {
            if show_all_options || opt.set {
                info.push_str(&format!("{}={}:", name, opt.value));
                option_shown = true;
            }
        }

        if !option_shown {
            info.push_str("<default>:");
        }
        info
    }

    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        let opt = self.options.get_mut(name).ok_or(OptionError::NoSuchOption)?;
        if !opt.accepts_value(value) {
            return Err(OptionError::RejectedValue);
        }
        opt.value = value.to_string();
        opt.set = true;
        Ok(())
    }

    pub fn reset_options(&mut self) {
        for opt in self.options.values_mut() {
            opt.value = opt.default_value.clone();
            opt.set = false;
        }
    }

    pub fn set_option_default(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        let opt = self.options.get_mut(name).ok_or(OptionError::NoSuchOption)?;
        if !opt.accepts_value(value) {
            return Err(OptionError::RejectedValue);
        }
        opt.default_value = value.to_string();
        Ok(())
    }
}

/// A benchmark scene.
///
/// Only [`Scene::base`] and [`Scene::base_mut`] are required. Scenes that
/// render override `setup`, `draw` and `teardown`; an overriding `setup` must
/// call [`SceneBase::setup`] so the run duration is picked up.
pub trait Scene {
    fn base(&self) -> &SceneBase;

    fn base_mut(&mut self) -> &mut SceneBase;

    /// False only for the placeholder returned for unknown scene names.
    fn is_valid(&self) -> bool {
        true
    }

    /// Allocate resources for rendering into `images`.
    ///
    /// `Ok(false)` reports a setup failure that is not an error; the scene is
    /// skipped and not torn down.
    fn setup(&mut self, _ctx: &GpuContext, _images: &[VulkanImage]) -> CoreResult<bool> {
        self.base_mut().setup();
        Ok(true)
    }

    fn teardown(&mut self) {}

    fn start(&mut self) {
        self.base_mut().start();
    }

    /// Render into `image`, returning it chained to the semaphore that
    /// signals completion of this frame's work.
    fn draw(&mut self, image: &VulkanImage) -> CoreResult<VulkanImage> {
        Ok(image.copy_with_semaphore(vk::Semaphore::null()))
    }

    fn update(&mut self) {
        self.base_mut().update();
    }

    /// Option values to install as defaults on every other scene once this
    /// scene has been set up.
    fn propagated_defaults(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn info_string(&self, show_all_options: bool) -> String {
        self.base().info_string(show_all_options)
    }

    fn average_fps(&self) -> u32 {
        self.base().average_fps()
    }

    fn is_running(&self) -> bool {
        self.base().is_running()
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        self.base_mut().set_option(name, value)
    }

    fn reset_options(&mut self) {
        self.base_mut().reset_options();
    }

    fn set_option_default(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        self.base_mut().set_option_default(name, value)
    }

    fn options(&self) -> &BTreeMap<String, SceneOption> {
        self.base().options()
    }
}

/// Placeholder for a scene name nobody registered.
#[derive(Debug, Clone)]
pub struct InvalidScene {
    base: SceneBase,
}

impl InvalidScene {
    pub fn new() -> Self {
        Self {
            base: SceneBase::new(""),
        }
    }

    /// Report `name` as this scene's name.
    pub fn rename(&mut self, name: &str) {
        self.base.set_name(name);
    }
}

impl Default for InvalidScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for InvalidScene {
    fn base(&self) -> &SceneBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SceneBase {
        &mut self.base
    }

    fn is_valid(&self) -> bool {
        false
    }
}

/// The empty-named scene whose options become defaults for all scenes.
///
/// A benchmark description like `:duration=5` selects this scene; when it is
/// set up, every option explicitly set on it is broadcast as a new default.
#[derive(Debug, Clone)]
pub struct DefaultOptionsScene {
    base: SceneBase,
}

impl DefaultOptionsScene {
    pub fn new() -> Self {
        Self {
            base: SceneBase::new(""),
        }
    }
}

impl Default for DefaultOptionsScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for DefaultOptionsScene {
    fn base(&self) -> &SceneBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SceneBase {
        &mut self.base
    }

    fn propagated_defaults(&self) -> Vec<(String, String)> {
        self.base
            .options()
            .values()
            .filter(|opt| opt.set)
            .map(|opt| (opt.name.clone(), opt.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scene_with_mode() -> SceneBase {
        let mut base = SceneBase::new("test");
        base.add_option(SceneOption::new("mode", "fast", "Mode", "fast,slow"));
        base
    }

    #[test]
    fn test_duration_option_always_present() {
        let base = SceneBase::new("x");
        let opt = &base.options()[DURATION_OPTION];
        assert_eq!(opt.default_value, "10.0");
        assert_eq!(opt.description, "The duration of each benchmark in seconds");
    }

    #[test]
    fn test_set_then_reset_restores_default() {
        let mut base = scene_with_mode();
        base.set_option("mode", "slow").unwrap();
        assert_eq!(base.option_value("mode"), Some("slow"));
        assert!(base.options()["mode"].set);

        base.reset_options();
        assert_eq!(base.option_value("mode"), Some("fast"));
        assert!(!base.options()["mode"].set);
    }

    #[test]
    fn test_set_option_distinguishes_failures() {
        let mut base = scene_with_mode();
        assert_eq!(
            base.set_option("nonexistent", "x"),
            Err(OptionError::NoSuchOption)
        );
        assert_eq!(
            base.set_option("mode", "medium"),
            Err(OptionError::RejectedValue)
        );
        assert_eq!(base.option_value("mode"), Some("fast"));
        assert!(!base.options()["mode"].set);
    }

    #[test]
    fn test_set_option_default_survives_reset() {
        let mut base = scene_with_mode();
        base.set_option_default("mode", "slow").unwrap();
        base.reset_options();
        assert_eq!(base.option_value("mode"), Some("slow"));
        assert_eq!(
            base.set_option_default("mode", "medium"),
            Err(OptionError::RejectedValue)
        );
    }

    #[rstest]
    #[case::thirty_in_one_second(30, 1_000_000, 30)]
    #[case::truncates(10, 3_000_000, 3)]
    #[case::sub_second(5, 100_000, 50)]
    #[case::no_time(7, 0, 0)]
    fn test_average_fps(#[case] frames: u32, #[case] elapsed: u64, #[case] expected: u32) {
        assert_eq!(average_fps(frames, elapsed), expected);
    }

    #[test]
    fn test_update_stops_after_duration() {
        let mut base = SceneBase::new("x");
        base.set_option(DURATION_OPTION, "0.5").unwrap();
        base.setup();
        assert_eq!(base.duration_us(), 500_000);

        base.start();
        let start = base.start_time;
        base.update_at(start + 100_000);
        assert!(base.is_running());
        base.update_at(start + 500_000);
        assert!(!base.is_running());
        assert_eq!(base.current_frame(), 2);
        assert_eq!(base.elapsed_us(), 500_000);
        assert_eq!(base.average_fps(), 4);
    }

    #[test]
    fn test_frame_counter_saturates() {
        let mut base = SceneBase::new("x");
        base.setup();
        base.start();
        base.current_frame = u32::MAX;
        let start = base.start_time;
        base.update_at(start + 1_000_000);
        assert_eq!(base.current_frame(), u32::MAX);
        assert_eq!(base.average_fps(), u32::MAX);
    }

    #[test]
    fn test_unparsable_duration_is_zero() {
        let mut base = SceneBase::new("x");
        base.set_option(DURATION_OPTION, "soon").unwrap();
        base.setup();
        assert_eq!(base.duration_us(), 0);
    }

    #[test]
    fn test_info_string() {
        let mut base = scene_with_mode();
        assert_eq!(base.info_string(false), "[test] <default>:");
        assert_eq!(base.info_string(true), "[test] duration=10.0:mode=fast:");

        base.set_option("mode", "slow").unwrap();
        assert_eq!(base.info_string(false), "[test] mode=slow:");
    }

    #[test]
    fn test_invalid_scene_echoes_name() {
        let mut scene = InvalidScene::new();
        scene.rename("nope");
        assert_eq!(scene.name(), "nope");
        assert!(!scene.is_valid());
    }

    #[test]
    fn test_default_options_scene_propagates_only_set_options() {
        let mut scene = DefaultOptionsScene::new();
        assert!(scene.name().is_empty());
        assert!(scene.propagated_defaults().is_empty());

        scene.set_option(DURATION_OPTION, "2.0").unwrap();
        assert_eq!(
            scene.propagated_defaults(),
            vec![(DURATION_OPTION.to_string(), "2.0".to_string())]
        );
    }
}
