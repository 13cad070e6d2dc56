/// Logger configuration and command-line flag scanning

use super::levels::LogLevel;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level shown (errors bypass this)
    pub min_level: LogLevel,

    /// Tags with debug logging enabled via --debug-<tag>
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> = Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_default()
}

pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut current) = LOGGER_CONFIG.write() {
        *current = config;
    }
}

/// Scan argv for logging flags:
/// --quiet, --verbose, --log-level <level>, --debug-<tag>
pub fn init_from_args() {
    let args: Vec<String> = std::env::args().collect();
    let mut config = LoggerConfig::default();

    for (i, arg) in args.iter().enumerate() {
        match arg.as_str() {
            "--quiet" => {
                config.min_level = LogLevel::Warning;
            }
            "--verbose" => {
                config.min_level = LogLevel::Verbose;
            }
            "--log-level" => {
                if let Some(value) = args.get(i + 1) {
                    if let Some(level) = LogLevel::parse(value) {
                        config.min_level = level;
                    }
                }
            }
            other => {
                if let Some(tag) = other.strip_prefix("--debug-") {
                    config.debug_tags.insert(tag.to_string());
                }
            }
        }
    }

    set_logger_config(config);
}

pub fn is_debug_enabled_for(key: &str) -> bool {
    LOGGER_CONFIG
        .read()
        .map(|c| c.debug_tags.contains(key))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggerConfig::default();
        assert_eq!(config.min_level, LogLevel::Info);
        assert!(config.debug_tags.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = LoggerConfig::default();
        config.debug_tags.insert("api".to_string());
        set_logger_config(config);
        assert!(is_debug_enabled_for("api"));
        assert!(!is_debug_enabled_for("cache"));
        set_logger_config(LoggerConfig::default());
    }
}
