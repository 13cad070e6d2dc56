//! Structured tag-based logging
//!
//! Standard levels (Error/Warning/Info/Debug/Verbose) with per-module debug
//! control via `--debug-<module>` flags and colored console output.
//!
//! Call [`init`] once at startup, then use the level functions:
//!
//! ```ignore
//! logger::info(LogTag::Engine, "engine ready");
//! logger::debug(LogTag::Api, "request details"); // only with --debug-api
//! ```

mod config;
mod core;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger from command-line arguments. Call once at startup.
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (default visibility)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (requires --debug-<module> for the tag)
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (requires --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
