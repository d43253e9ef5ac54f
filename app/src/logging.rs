//! Console logger for the `vkbench` binary.
//!
//! Records go to stdout. Info lines are printed bare so that the benchmark
//! output reads cleanly; every other level carries a prefix. A record logged
//! with [`CONTINUED_TARGET`] leaves the line open and the next record
//! finishes it without a prefix.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use env_logger::fmt::Formatter;
use env_logger::{Builder, Target, WriteStyle};
use log::{Level, LevelFilter, Record};

use vkbench_core::CONTINUED_TARGET;

static LINE_OPEN: AtomicBool = AtomicBool::new(false);

/// The text put in front of a record at `level`.
pub fn level_prefix(level: Level, show_debug: bool) -> &'static str {
    match level {
        Level::Error => "Error: ",
        Level::Warn => "Warning: ",
        Level::Info if show_debug => "Info: ",
        Level::Info => "",
        Level::Debug => "Debug: ",
        Level::Trace => "Trace: ",
    }
}

pub fn max_level(show_debug: bool) -> LevelFilter {
    if show_debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn format_record(buf: &mut Formatter, record: &Record, show_debug: bool) -> std::io::Result<()> {
    let continued = record.target() == CONTINUED_TARGET;
    let was_open = LINE_OPEN.swap(continued, Ordering::Relaxed);

    if !was_open {
        let prefix = level_prefix(record.level(), show_debug);
        if !prefix.is_empty() {
            let style = buf.default_level_style(record.level());
            write!(buf, "{style}{prefix}{style:#}")?;
        }
    }
    write!(buf, "{}", record.args())?;
    if !continued {
        writeln!(buf)?;
    }
    Ok(())
}

/// Install the logger. `RUST_LOG` overrides the level chosen by `--debug`.
pub fn init(show_debug: bool) {
    let mut builder = Builder::new();
    builder
        .filter_level(max_level(show_debug))
        .parse_default_env()
        .target(Target::Stdout)
        .write_style(WriteStyle::Auto)
        .format(move |buf, record| format_record(buf, record, show_debug));

    if let Err(e) = builder.try_init() {
        eprintln!("Failed to initialize logger: {e}");
    }
}
