/// Central logging logic: filtering rules plus console formatting

use super::config::{get_logger_config, is_debug_enabled_for};
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Utc;
use colored::Colorize;

/// Filtering rules:
/// 1. Errors are always shown
/// 2. Everything else checks the minimum level threshold
/// 3. Debug level additionally requires --debug-<tag> for that tag
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let config = get_logger_config();

    if level == LogLevel::Debug {
        return is_debug_enabled_for(tag.debug_key()) || config.min_level >= LogLevel::Debug;
    }

    level <= config.min_level
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    let timestamp = Utc::now().format("%H:%M:%S").to_string();
    let tag_label = format!("[{}]", tag.as_str());

    let line = match level {
        LogLevel::Error => format!(
            "{} {} {} {}",
            format!("[{}]", timestamp).dimmed(),
            "ERROR".red().bold(),
            tag_label.red(),
            message.red()
        ),
        LogLevel::Warning => format!(
            "{} {} {} {}",
            format!("[{}]", timestamp).dimmed(),
            "WARN ".yellow().bold(),
            tag_label.yellow(),
            message.yellow()
        ),
        LogLevel::Info => format!(
            "{} {} {} {}",
            format!("[{}]", timestamp).dimmed(),
            "INFO ".blue().bold(),
            tag_label.cyan(),
            message
        ),
        LogLevel::Debug => format!(
            "{} {} {} {}",
            format!("[{}]", timestamp).dimmed(),
            "DEBUG".purple().bold(),
            tag_label.purple(),
            message.dimmed()
        ),
        LogLevel::Verbose => format!(
            "{} {} {} {}",
            format!("[{}]", timestamp).dimmed(),
            "TRACE".white().bold(),
            tag_label.white(),
            message.dimmed()
        ),
    };

    println!("{}", line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_always_pass() {
        assert!(should_log(&LogTag::Api, LogLevel::Error));
    }

    #[test]
    fn test_debug_gated_by_default() {
        // Default min level is Info, no debug tags enabled
        assert!(!should_log(&LogTag::Engine, LogLevel::Verbose));
    }
}
