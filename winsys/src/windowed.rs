//! X11 and Wayland windows through winit.
//!
//! The window is created up front by pumping the event loop until winit
//! resumes the application. After that, `should_quit` pumps pending events
//! without blocking, so the benchmark keeps control of the frame loop.

use std::ffi::CStr;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::platform::wayland::EventLoopBuilderExtWayland;
use winit::platform::x11::EventLoopBuilderExtX11;
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use vkbench_core::{
    CoreError, CoreResult, Options, PROBE_BAD, PROBE_GOOD, PROBE_OK, WindowSystem,
    WindowSystemPlugin,
};
use vkbench_graphics::{GraphicsError, VulkanInstance, VulkanState, ash, vk};

use crate::native::{NativeSystem, extent_from_size};
use crate::swapchain::SwapchainWindowSystem;

const WAYLAND_PRIORITY: i32 = 1;
const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";
const DEFAULT_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};
/// Event loop iterations to wait for the window to appear.
const WINDOW_CREATE_ATTEMPTS: u32 = 100;
const WINDOW_CREATE_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    X11,
    Wayland,
}

/// Event handling state shared with winit while pumping.
struct WindowState {
    attributes: Option<WindowAttributes>,
    window: Option<Window>,
    quit: bool,
    error: Option<String>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.error = Some(format!("Failed to create window: {e}")),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.quit = true,
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                self.quit = true;
            }
            _ => {}
        }
    }
}

/// A native window on an X11 or Wayland display.
pub struct WinitNativeSystem {
    state: WindowState,
    event_loop: EventLoop<()>,
    requested_extent: vk::Extent2D,
}

impl WinitNativeSystem {
    pub fn new(platform: Platform, size: (i32, i32)) -> CoreResult<Self> {
        let mut builder = EventLoop::builder();
        match platform {
            Platform::X11 => builder.with_x11(),
            Platform::Wayland => builder.with_wayland(),
        };
        let event_loop = builder.build().map_err(|e| {
            CoreError::WindowSystem(format!("Failed to connect to {platform:?} display: {e}"))
        })?;

        let requested_extent = extent_from_size(size, DEFAULT_EXTENT);
        let mut attributes = Window::default_attributes()
            .with_title("vkbench")
            .with_resizable(false)
            .with_inner_size(PhysicalSize::new(
                requested_extent.width,
                requested_extent.height,
            ));
        if size == (-1, -1) {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let mut native = Self {
            state: WindowState {
                attributes: Some(attributes),
                window: None,
                quit: false,
                error: None,
            },
            event_loop,
            requested_extent,
        };

        for _ in 0..WINDOW_CREATE_ATTEMPTS {
            native.pump(Some(WINDOW_CREATE_POLL));
            if let Some(error) = native.state.error.take() {
                return Err(CoreError::WindowSystem(error));
            }
            if native.state.window.is_some() {
                return Ok(native);
            }
        }
        Err(CoreError::WindowSystem(format!(
            "Timed out waiting for the {platform:?} window"
        )))
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            self.state.quit = true;
        }
    }

    fn window(&self) -> CoreResult<&Window> {
        self.state
            .window
            .as_ref()
            .ok_or_else(|| CoreError::WindowSystem("window was closed".to_string()))
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> CoreResult<vk::SurfaceKHR> {
        let window = self.window()?;
        let display = window
            .display_handle()
            .map_err(|e| CoreError::WindowSystem(format!("No display handle: {e}")))?;
        let handle = window
            .window_handle()
            .map_err(|e| CoreError::WindowSystem(format!("No window handle: {e}")))?;

        // SAFETY: the window outlives the surface; the swapchain destroys the
        // surface before the native system drops.
        let surface = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), handle.as_raw(), None)
        }
        .map_err(|e| GraphicsError::vk("Failed to create window surface", e))?;
        Ok(surface)
    }
}

impl NativeSystem for WinitNativeSystem {
    fn instance_extensions(&self) -> Vec<&'static CStr> {
        let display = match self.event_loop.display_handle() {
            Ok(display) => display,
            Err(e) => {
                log::warn!("No display handle: {}", e);
                return Vec::new();
            }
        };
        match ash_window::enumerate_required_extensions(display.as_raw()) {
            // SAFETY: the loader hands out pointers to static extension name strings.
            Ok(names) => names
                .iter()
                .map(|&name| unsafe { CStr::from_ptr(name) })
                .collect(),
            Err(e) => {
                log::warn!("Unsupported display for Vulkan surfaces: {:?}", e);
                Vec::new()
            }
        }
    }

    fn presentation_queue_family_index(
        &self,
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Option<u32> {
        // Presentation support is a property of the surface, so ask a
        // short-lived one.
        let surface = match self.create_surface(&instance.entry, &instance.instance) {
            Ok(surface) => surface,
            Err(e) => {
                log::debug!("Cannot query presentation support: {}", e);
                return None;
            }
        };
        let loader = ash::khr::surface::Instance::new(&instance.entry, &instance.instance);

        let families = unsafe {
            instance
                .instance
                .get_physical_device_queue_family_properties(physical_device)
        };
        let supported = (0..families.len() as u32).find(|&index| {
            families[index as usize].queue_count > 0
                && unsafe {
                    loader.get_physical_device_surface_support(physical_device, index, surface)
                }
                .unwrap_or(false)
        });

        // SAFETY: the short-lived surface has no swapchain.
        unsafe { loader.destroy_surface(surface, None) };
        supported
    }

    fn should_quit(&mut self) -> bool {
        self.pump(Some(Duration::ZERO));
        self.state.quit
    }

    fn vk_extent(&self) -> vk::Extent2D {
        match &self.state.window {
            Some(window) => {
                let size = window.inner_size();
                if size.width > 0 && size.height > 0 {
                    vk::Extent2D {
                        width: size.width,
                        height: size.height,
                    }
                } else {
                    self.requested_extent
                }
            }
            None => self.requested_extent,
        }
    }

    fn create_vk_surface(&mut self, vulkan: &VulkanState) -> CoreResult<vk::SurfaceKHR> {
        self.create_surface(vulkan.entry(), vulkan.instance())
    }
}

/// The Unix socket of a local X display such as `:0` or `unix:1.0`.
/// Remote displays have none.
pub fn x11_local_socket(display: &str, socket_dir: &Path) -> Option<PathBuf> {
    let (host, rest) = display.rsplit_once(':')?;
    if !host.is_empty() && host != "unix" {
        return None;
    }
    let number = rest.split('.').next().filter(|n| !n.is_empty())?;
    number.parse::<u32>().ok()?;
    Some(socket_dir.join(format!("X{number}")))
}

/// Score an X display by whether its socket accepts connections.
pub fn probe_x11(display: Option<&str>, socket_dir: &Path) -> i32 {
    let Some(display) = display.filter(|d| !d.is_empty()) else {
        return PROBE_BAD;
    };
    match x11_local_socket(display, socket_dir) {
        Some(socket) if UnixStream::connect(&socket).is_ok() => PROBE_OK,
        Some(_) => PROBE_BAD,
        // Remote displays are reached over TCP; trust the user's DISPLAY.
        None if display.contains(':') => PROBE_OK,
        None => PROBE_BAD,
    }
}

fn wayland_socket(name: &str, runtime_dir: Option<&Path>) -> Option<PathBuf> {
    let name = Path::new(name);
    if name.is_absolute() {
        Some(name.to_path_buf())
    } else {
        runtime_dir.map(|dir| dir.join(name))
    }
}

/// Score Wayland: an explicit and reachable `WAYLAND_DISPLAY` is a good
/// choice, a reachable default compositor an ok one.
pub fn probe_wayland(wayland_display: Option<&str>, runtime_dir: Option<&Path>) -> i32 {
    let reachable = |name: &str| {
        wayland_socket(name, runtime_dir).is_some_and(|path| UnixStream::connect(path).is_ok())
    };

    let score = match wayland_display.filter(|d| !d.is_empty()) {
        Some(name) if reachable(name) => PROBE_GOOD,
        _ if reachable("wayland-0") => PROBE_OK,
        _ => PROBE_BAD,
    };

    if score > PROBE_BAD {
        score + WAYLAND_PRIORITY
    } else {
        score
    }
}

fn create(platform: Platform, options: &Options) -> CoreResult<Box<dyn WindowSystem>> {
    let native = WinitNativeSystem::new(platform, options.size)?;
    Ok(Box::new(SwapchainWindowSystem::new(
        Box::new(native),
        options.present_mode,
        options.pixel_format,
    )))
}

pub const XCB_PLUGIN: WindowSystemPlugin = WindowSystemPlugin {
    name: "xcb",
    load_options: |_| {},
    probe: |_| {
        let display = std::env::var("DISPLAY").ok();
        probe_x11(display.as_deref(), Path::new(X11_SOCKET_DIR))
    },
    create: |options| create(Platform::X11, options),
};

pub const WAYLAND_PLUGIN: WindowSystemPlugin = WindowSystemPlugin {
    name: "wayland",
    load_options: |_| {},
    probe: |_| {
        let display = std::env::var("WAYLAND_DISPLAY").ok();
        let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
        probe_wayland(display.as_deref(), runtime_dir.as_deref())
    },
    create: |options| create(Platform::Wayland, options),
};

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::os::unix::net::UnixListener;

    #[rstest]
    #[case::plain(":0", Some("X0"))]
    #[case::screen(":1.0", Some("X1"))]
    #[case::unix("unix:2", Some("X2"))]
    #[case::remote("host:0", None)]
    #[case::garbage("nonsense", None)]
    #[case::no_number(":", None)]
    fn test_x11_local_socket(#[case] display: &str, #[case] socket: Option<&str>) {
        let dir = Path::new("/sockets");
        assert_eq!(x11_local_socket(display, dir), socket.map(|s| dir.join(s)));
    }

    #[test]
    fn test_probe_x11() {
        let dir = tempfile::tempdir().unwrap();
        let _listener = UnixListener::bind(dir.path().join("X3")).unwrap();

        assert_eq!(probe_x11(Some(":3"), dir.path()), PROBE_OK);
        assert_eq!(probe_x11(Some(":4"), dir.path()), PROBE_BAD);
        assert_eq!(probe_x11(Some("remote:0"), dir.path()), PROBE_OK);
        assert_eq!(probe_x11(None, dir.path()), PROBE_BAD);
        assert_eq!(probe_x11(Some(""), dir.path()), PROBE_BAD);
    }

    #[test]
    fn test_probe_wayland() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Some(dir.path());

        assert_eq!(probe_wayland(Some("wayland-1"), runtime), PROBE_BAD);

        let _default = UnixListener::bind(dir.path().join("wayland-0")).unwrap();
        assert_eq!(probe_wayland(None, runtime), PROBE_OK + WAYLAND_PRIORITY);
        assert_eq!(
            probe_wayland(Some("wayland-1"), runtime),
            PROBE_OK + WAYLAND_PRIORITY
        );

        let _explicit = UnixListener::bind(dir.path().join("wayland-1")).unwrap();
        assert_eq!(
            probe_wayland(Some("wayland-1"), runtime),
            PROBE_GOOD + WAYLAND_PRIORITY
        );
    }

    #[test]
    fn test_probe_wayland_absolute_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("compositor");
        let _listener = UnixListener::bind(&socket).unwrap();

        let name = socket.to_str().unwrap();
        assert_eq!(probe_wayland(Some(name), None), PROBE_GOOD + WAYLAND_PRIORITY);
        assert_eq!(probe_wayland(None, None), PROBE_BAD);
    }
}
