//! Configuration settings for the cadence scheduling engine.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub defaults: EngineDefaults,
    pub calendar: CalendarConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("cadence.toml"),
            dirs::config_dir()
                .map(|p| p.join("cadence/config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".cadence/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.scheduler.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be > 0".to_string()).into());
        }
        if self.scheduler.dispatch_timeout_secs == 0 {
            return Err(
                ConfigError::Invalid("dispatch_timeout_secs must be > 0".to_string()).into(),
            );
        }
        if self.defaults.slot_granularity_minutes == 0 {
            return Err(
                ConfigError::Invalid("slot_granularity_minutes must be > 0".to_string()).into(),
            );
        }
        if self.calendar.working_hours.start_hour >= self.calendar.working_hours.end_hour {
            return Err(ConfigError::Invalid(
                "working hours start must be before end".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Background trigger-scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between time-based trigger scans.
    pub poll_interval_secs: u64,
    /// Per-attempt timeout for downstream workflow/service dispatch.
    pub dispatch_timeout_secs: u64,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    pub fn dispatch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dispatch_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            dispatch_timeout_secs: 30,
        }
    }
}

/// Defaults injected into the entry lifecycle manager.
///
/// Replaces any process-wide default-calendar state: these values are plain
/// configuration handed to `EntryLifecycleManager::new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineDefaults {
    /// Hours added to the original start/end when duplicating an entry.
    pub duplicate_offset_hours: i64,
    /// Default availability slot width in minutes.
    pub slot_granularity_minutes: u32,
    /// Default duration applied when an entry is created without an end, in minutes.
    pub default_entry_duration_minutes: i64,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            duplicate_offset_hours: 24,
            slot_granularity_minutes: 60,
            default_entry_duration_minutes: 60,
        }
    }
}

/// Calendar-level defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA time zone name applied to calendars created without one.
    pub default_timezone: String,
    pub working_hours: WorkingHoursConfig,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
            working_hours: WorkingHoursConfig::default(),
        }
    }
}

/// Working-hours policy for new calendars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingHoursConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    pub include_weekends: bool,
}

impl Default for WorkingHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            include_weekends: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.defaults.duplicate_offset_hours, 24);
        assert_eq!(config.calendar.default_timezone, "UTC");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [scheduler]
            poll_interval_secs = 15

            [defaults]
            slot_granularity_minutes = 30
        "#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.scheduler.poll_interval_secs, 15);
        assert_eq!(config.defaults.slot_granularity_minutes, 30);
        // Untouched sections fall back to defaults
        assert_eq!(config.scheduler.dispatch_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_poll_interval() {
        let toml = r#"
            [scheduler]
            poll_interval_secs = 0
        "#;
        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_invalid_working_hours() {
        let toml = r#"
            [calendar.working_hours]
            start_hour = 18
            end_hour = 9
        "#;
        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\npoll_interval_secs = 5\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.scheduler.poll_interval_secs, 5);
    }
}
