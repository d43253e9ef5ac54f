//! Runs every benchmark and aggregates their frame rates into a score.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use vkbench_graphics::GpuContext;

use crate::benchmark::Benchmark;
use crate::benchmark_collection::BenchmarkCollection;
use crate::error::CoreResult;
use crate::options::Options;
use crate::scene::Scene;
use crate::scene_collection::SceneCollection;
use crate::window_system::WindowSystem;
use crate::{frame_mark, profile_plot, profile_scope};

/// Log target whose records stay on the current output line.
pub const CONTINUED_TARGET: &str = "vkbench::continued";

/// A cloneable handle that asks a running [`MainLoop`] to stop.
///
/// The loop checks the flag once per frame, so a stop requested from another
/// thread or a signal handler ends the current benchmark after its current
/// frame and skips the rest.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Runs `teardown` on the wrapped scene when dropped.
struct TeardownGuard<'a> {
    scene: &'a mut dyn Scene,
    armed: bool,
}

impl<'a> TeardownGuard<'a> {
    fn new(scene: &'a mut dyn Scene) -> Self {
        Self { scene, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            profile_scope!("scene_teardown");
            self.scene.teardown();
        }
    }
}

/// Outcome of one benchmark in the run.
enum Step {
    /// Nothing measured; go on with the next benchmark.
    Skipped,
    /// A scene ran and produced `fps`; `interrupted` ends the run.
    Measured { fps: u32, interrupted: bool },
}

pub struct MainLoop<'a> {
    ctx: &'a GpuContext,
    ws: &'a mut dyn WindowSystem,
    scenes: &'a mut SceneCollection,
    benchmarks: &'a BenchmarkCollection,
    options: &'a Options,
    stop: StopHandle,
    total_fps: u64,
    total_benchmarks: u64,
}

impl<'a> MainLoop<'a> {
    pub fn new(
        ctx: &'a GpuContext,
        ws: &'a mut dyn WindowSystem,
        scenes: &'a mut SceneCollection,
        benchmarks: &'a BenchmarkCollection,
        options: &'a Options,
    ) -> Self {
        Self {
            ctx,
            ws,
            scenes,
            benchmarks,
            options,
            stop: StopHandle::new(),
            total_fps: 0,
            total_benchmarks: 0,
        }
    }

    /// Handle for stopping the loop from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Use `stop` instead of the loop's own handle.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Run the benchmarks in order, from the start again after the last one
    /// when running forever.
    pub fn run(&mut self) {
        let collection: &'a BenchmarkCollection = self.benchmarks;
        let benchmarks = collection.benchmarks();
        if benchmarks.is_empty() {
            return;
        }

        let mut index = 0;
        while index < benchmarks.len() {
            let benchmark = &benchmarks[index];

            match self.run_benchmark(benchmark) {
                Ok(Step::Skipped) => {}
                Ok(Step::Measured { fps, interrupted }) => {
                    log_scene_fps(fps);
                    profile_plot!("fps", fps);
                    self.total_fps += u64::from(fps);
                    self.total_benchmarks += 1;
                    if interrupted {
                        break;
                    }
                }
                Err(e) => log_scene_error(&e.to_string()),
            }

            if self.stop.is_stopped() {
                break;
            }

            index += 1;
            if self.options.run_forever && index == benchmarks.len() {
                index = 0;
            }
        }
    }

    fn run_benchmark(&mut self, benchmark: &Benchmark) -> CoreResult<Step> {
        let scene = benchmark.prepare_scene(self.scenes);

        if !scene.is_valid() {
            log::warn!(
                "Skipping benchmark with invalid scene name '{}'",
                scene.name()
            );
            return Ok(Step::Skipped);
        }

        // Scenes with empty names only set options for the others.
        if scene.name().is_empty() {
            scene.setup(self.ctx, &self.ws.vulkan_images())?;
            let defaults = scene.propagated_defaults();
            for (name, value) in defaults {
                self.scenes.set_option_default(&name, &value);
            }
            return Ok(Step::Skipped);
        }

        log::info!(
            target: CONTINUED_TARGET,
            "{}",
            scene.info_string(self.options.show_all_options)
        );

        let images = self.ws.vulkan_images();
        let mut guard = TeardownGuard::new(scene);
        let set_up = {
            profile_scope!("scene_setup");
            guard.scene.setup(self.ctx, &images)?
        };
        if !set_up {
            guard.disarm();
            log::info!(" Failed to set up scene '{}', skipping", guard.scene.name());
            return Ok(Step::Skipped);
        }

        let mut should_quit = false;
        guard.scene.start();

        while guard.scene.is_running() && !self.stop.is_stopped() {
            should_quit = self.ws.should_quit();
            if should_quit {
                break;
            }
            let image = self.ws.next_vulkan_image()?;
            let drawn = match guard.scene.draw(&image) {
                Ok(drawn) => drawn,
                Err(e) => {
                    if let Err(recycle_err) = self.ws.recycle_vulkan_image(&image) {
                        log::warn!("Failed to recycle image {}: {}", image.index, recycle_err);
                    }
                    return Err(e);
                }
            };
            self.ws.present_vulkan_image(&drawn)?;
            guard.scene.update();
            frame_mark!();
        }

        let fps = guard.scene.average_fps();
        Ok(Step::Measured {
            fps,
            interrupted: should_quit || self.stop.is_stopped(),
        })
    }

    /// Mean FPS over the benchmarks that produced a measurement.
    pub fn score(&self) -> u64 {
        if self.total_benchmarks == 0 {
            0
        } else {
            self.total_fps / self.total_benchmarks
        }
    }
}

fn log_scene_fps(fps: u32) {
    let frame_time = if fps == 0 { f64::INFINITY } else { 1000.0 / fps as f64 };
    log::info!(" FPS: {} FrameTime: {:.3} ms", fps, frame_time);
}

fn log_scene_error(what: &str) {
    log::info!(" Failed with exception: {}", what);
}
