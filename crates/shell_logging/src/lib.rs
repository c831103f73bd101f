#![deny(missing_docs)]
//! Shared logging utilities for the FEM shell workspace.
//!
//! This crate provides the `shell_*` logging macros used across the codebase,
//! a per-thread job context that tags log lines emitted from a job's thread,
//! and a minimal test initializer for the global logger.

use std::cell::Cell;
use std::fmt;

use log::{Level, Record};

#[doc(hidden)]
pub use log::Level as __Level;

thread_local! {
    /// Id of the job whose background thread is the current thread, if any.
    static JOB_CONTEXT: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Tags every log line emitted from the current thread with `job_id`.
/// Job threads call this once at startup; pass `None` to clear the tag.
pub fn set_job_context(job_id: Option<u64>) {
    JOB_CONTEXT.with(|v| v.set(job_id));
}

/// Retrieves the job context for the current thread.
/// Returns `None` on threads that do not run a job.
pub fn job_context() -> Option<u64> {
    JOB_CONTEXT.with(|v| v.get())
}

/// Forwards one formatted message to the global logger, prefixed with the
/// current job context. Used by the `shell_*` macros; not meant to be called
/// directly.
#[doc(hidden)]
pub fn __emit(level: Level, target: &str, args: fmt::Arguments<'_>) {
    if level > log::max_level() {
        return;
    }
    let logger = log::logger();
    match job_context() {
        Some(job_id) => logger.log(
            &Record::builder()
                .level(level)
                .target(target)
                .args(format_args!("[job {job_id}] {args}"))
                .build(),
        ),
        None => logger.log(
            &Record::builder()
                .level(level)
                .target(target)
                .args(args)
                .build(),
        ),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! shell_trace {
    ($($arg:tt)*) => {{
        $crate::__emit($crate::__Level::Trace, module_path!(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! shell_debug {
    ($($arg:tt)*) => {{
        $crate::__emit($crate::__Level::Debug, module_path!(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! shell_info {
    ($($arg:tt)*) => {{
        $crate::__emit($crate::__Level::Info, module_path!(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! shell_warn {
    ($($arg:tt)*) => {{
        $crate::__emit($crate::__Level::Warn, module_path!(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! shell_error {
    ($($arg:tt)*) => {{
        $crate::__emit($crate::__Level::Error, module_path!(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
