//! Virtual terminal process mode while the benchmark owns the display.
//!
//! In `VT_PROCESS` mode a VT switch raises SIGINT instead of silently taking
//! the display away, which stops the run cleanly. The previous mode is put
//! back on drop, and also from SIGSEGV/SIGABRT so a crash does not leave the
//! console stuck.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use vkbench_core::{CoreError, CoreResult};

const VT_GETMODE: u32 = 0x5601;
const VT_SETMODE: u32 = 0x5602;
const VT_AUTO: libc::c_char = 0;
const VT_PROCESS: libc::c_char = 1;

/// `struct vt_mode` from `linux/vt.h`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct VtMode {
    mode: libc::c_char,
    waitv: libc::c_char,
    relsig: libc::c_short,
    acqsig: libc::c_short,
    frsig: libc::c_short,
}

impl VtMode {
    fn pack(self) -> u64 {
        (self.mode as u8 as u64)
            | (self.waitv as u8 as u64) << 8
            | (self.relsig as u16 as u64) << 16
            | (self.acqsig as u16 as u64) << 32
            | (self.frsig as u16 as u64) << 48
    }

    fn unpack(packed: u64) -> Self {
        Self {
            mode: packed as u8 as libc::c_char,
            waitv: (packed >> 8) as u8 as libc::c_char,
            relsig: (packed >> 16) as u16 as libc::c_short,
            acqsig: (packed >> 32) as u16 as libc::c_short,
            frsig: (packed >> 48) as u16 as libc::c_short,
        }
    }
}

// Read from the crash handler, so plain atomics only.
static VT_FD: AtomicI32 = AtomicI32::new(-1);
static PREV_MODE: AtomicU64 = AtomicU64::new(0);

fn get_mode(fd: libc::c_int) -> Option<VtMode> {
    let mut mode = VtMode::default();
    // SAFETY: VT_GETMODE writes one `struct vt_mode`, which `VtMode` mirrors.
    let ret = unsafe { libc::ioctl(fd, VT_GETMODE as _, &mut mode as *mut VtMode) };
    (ret >= 0).then_some(mode)
}

fn set_mode(fd: libc::c_int, mode: &VtMode) -> bool {
    // SAFETY: VT_SETMODE only reads the `struct vt_mode` behind the pointer.
    unsafe { libc::ioctl(fd, VT_SETMODE as _, mode as *const VtMode) >= 0 }
}

fn restore(fd: libc::c_int, prev: &VtMode) {
    if prev.mode == VT_AUTO {
        set_mode(fd, prev);
    }
}

extern "C" fn restore_on_crash(_signal: libc::c_int) {
    let fd = VT_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        restore(fd, &VtMode::unpack(PREV_MODE.load(Ordering::SeqCst)));
    }
}

fn set_crash_handler(handler: libc::sighandler_t, flags: libc::c_int) {
    // SAFETY: `handler` is SIG_DFL or `restore_on_crash`, which reads atomics
    // and issues one ioctl, both async-signal-safe.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler;
        action.sa_flags = flags;
        libc::sigemptyset(&mut action.sa_mask);
        for signal in [libc::SIGSEGV, libc::SIGABRT] {
            libc::sigaction(signal, &action, std::ptr::null_mut());
        }
    }
}

fn open_vt(path: &str) -> Option<File> {
    let file = OpenOptions::new().read(true).open(path).ok()?;
    get_mode(file.as_raw_fd()).map(|_| file)
}

/// The active VT held in process mode.
pub struct VtState {
    file: File,
    prev: VtMode,
}

impl VtState {
    pub fn new() -> CoreResult<Self> {
        let file = match open_vt("/dev/tty") {
            Some(file) => file,
            None => {
                log::debug!("/dev/tty is not a VT, trying to use /dev/tty0");
                open_vt("/dev/tty0").ok_or_else(|| {
                    CoreError::WindowSystem("Failed to open active VT".to_string())
                })?
            }
        };
        let fd = file.as_raw_fd();

        let prev = get_mode(fd).ok_or_else(|| {
            CoreError::WindowSystem(format!(
                "Failed to get VT control mode: {}",
                std::io::Error::last_os_error()
            ))
        })?;

        let process_mode = VtMode {
            mode: VT_PROCESS,
            waitv: 0,
            relsig: libc::SIGINT as libc::c_short,
            acqsig: libc::SIGINT as libc::c_short,
            frsig: libc::SIGINT as libc::c_short,
        };
        if !set_mode(fd, &process_mode) {
            return Err(CoreError::WindowSystem(format!(
                "Failed to set VT process control mode: {}",
                std::io::Error::last_os_error()
            )));
        }

        PREV_MODE.store(prev.pack(), Ordering::SeqCst);
        VT_FD.store(fd, Ordering::SeqCst);
        set_crash_handler(
            restore_on_crash as extern "C" fn(libc::c_int) as libc::sighandler_t,
            libc::SA_RESETHAND,
        );

        Ok(Self { file, prev })
    }
}

impl Drop for VtState {
    fn drop(&mut self) {
        restore(self.file.as_raw_fd(), &self.prev);
        set_crash_handler(libc::SIG_DFL, 0);
        VT_FD.store(-1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_survives_signal_storage() {
        let mode = VtMode {
            mode: VT_AUTO,
            waitv: 1,
            relsig: -2,
            acqsig: libc::SIGUSR1 as libc::c_short,
            frsig: 0,
        };
        assert_eq!(VtMode::unpack(mode.pack()), mode);
    }

    #[test]
    fn test_vt_mode_layout() {
        assert_eq!(std::mem::size_of::<VtMode>(), 8);
    }
}
