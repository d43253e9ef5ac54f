//! SIGINT/SIGTERM end the run after the current frame.

use std::sync::OnceLock;

use vkbench_core::StopHandle;

static STOP: OnceLock<StopHandle> = OnceLock::new();

extern "C" fn request_stop(_signal: libc::c_int) {
    if let Some(stop) = STOP.get() {
        stop.stop();
    }
}

/// Route SIGINT and SIGTERM to `stop`. Only the first handle installed in a
/// process is used; later calls return that one.
pub fn install_stop_handler(stop: StopHandle) -> StopHandle {
    let installed = STOP.get_or_init(|| stop).clone();

    // SAFETY: a zeroed sigaction is a valid empty action, and `request_stop`
    // only touches an initialized `OnceLock` and an atomic flag, both
    // async-signal-safe.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = request_stop as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        for signal in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                log::debug!(
                    "Failed to install handler for signal {}: {}",
                    signal,
                    std::io::Error::last_os_error()
                );
            }
        }
    }

    installed
}
