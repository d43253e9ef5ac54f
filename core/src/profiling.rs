//! Profiling support via Tracy.
//!
//! Enabled with the `profiling` Cargo feature. The main loop marks every
//! presented frame, scopes scene setup and teardown, and plots the FPS of each
//! finished benchmark, so a connected Tracy shows where a run spends its time
//! outside of the GPU.
//!
//! When the feature is disabled, all macros compile to nothing.

#[cfg(feature = "profiling")]
pub use tracy_client::{self, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Mark the end of a presented frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span lasting until the end of the current scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Plot a value over time.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

pub use frame_mark;
pub use profile_plot;
pub use profile_scope;

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        frame_mark!();
        profile_scope!("test_scope");
        profile_plot!("fps", 42u32);
    }
}
