//! Application settings loading from config.toml
//!
//! Every section is optional; a missing file or a missing key falls back to the
//! defaults documented on each field. Secrets (the LLM API key) are never read from
//! this file, they come from the environment.

use crate::core::wishlist::{CooldownPolicy, CooldownTier};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Wall-clock triggers for the maintenance jobs
    pub schedule: ScheduleConfig,
    /// Wishlist cooldown policy
    pub wishlist: WishlistConfig,
    /// Language model settings
    pub insight: InsightConfig,
}

/// A time of day (UTC) at which a daily job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DailyAt {
    /// Hour, 0-23
    pub hour: u32,
    /// Minute, 0-59
    pub minute: u32,
}

/// A day of month and time (UTC) at which a monthly job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MonthlyAt {
    /// Day of month, 1-28 so that every month has it
    pub day: u32,
    /// Hour, 0-23
    pub hour: u32,
    /// Minute, 0-59
    pub minute: u32,
}

/// Triggers for the three scheduled jobs
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Rollover, streak and wishlist sweep (default 00:00)
    pub midnight_rollover: DailyAt,
    /// Category-limit reset (default day 1, 00:01)
    pub monthly_reset: MonthlyAt,
    /// Reflection reminder enumeration (default 21:00)
    pub reflection_reminder: DailyAt,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            midnight_rollover: DailyAt { hour: 0, minute: 0 },
            monthly_reset: MonthlyAt {
                day: 1,
                hour: 0,
                minute: 1,
            },
            reflection_reminder: DailyAt {
                hour: 21,
                minute: 0,
            },
        }
    }
}

impl ScheduleConfig {
    /// Rejects triggers that can never fire.
    pub fn validate(&self) -> Result<()> {
        for (name, at) in [
            ("midnight_rollover", self.midnight_rollover),
            ("reflection_reminder", self.reflection_reminder),
        ] {
            check_time(name, at.hour, at.minute)?;
        }
        check_time(
            "monthly_reset",
            self.monthly_reset.hour,
            self.monthly_reset.minute,
        )?;
        if !(1..=28).contains(&self.monthly_reset.day) {
            return Err(Error::Config {
                message: format!(
                    "schedule.monthly_reset.day must be between 1 and 28, got {}",
                    self.monthly_reset.day
                ),
            });
        }
        Ok(())
    }
}

fn check_time(name: &str, hour: u32, minute: u32) -> Result<()> {
    if hour > 23 || minute > 59 {
        return Err(Error::Config {
            message: format!("schedule.{name} has an invalid time {hour:02}:{minute:02}"),
        });
    }
    Ok(())
}

/// Named cooldown tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownPreset {
    /// ≤ 50 → 14 days, ≤ 150 → 30 days, otherwise 45 days
    #[default]
    Standard,
    /// ≤ 100 → 30 days, ≤ 200 → 45 days, ≤ 500 → 60 days, otherwise 90 days
    Extended,
}

/// Wishlist section of config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WishlistConfig {
    /// Which built-in table to use when `cooldown_tiers` is absent
    pub cooldown_preset: CooldownPreset,
    /// Custom price tiers, evaluated in order
    pub cooldown_tiers: Option<Vec<CooldownTier>>,
}

impl WishlistConfig {
    /// Resolves the configured cooldown policy.
    pub fn cooldown_policy(&self) -> Result<CooldownPolicy> {
        match &self.cooldown_tiers {
            Some(tiers) => CooldownPolicy::new(tiers.clone()),
            None => Ok(match self.cooldown_preset {
                CooldownPreset::Standard => CooldownPolicy::standard(),
                CooldownPreset::Extended => CooldownPolicy::extended(),
            }),
        }
    }
}

/// Language model section of config.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// API base URL
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Upper bound for a single request, in seconds
    pub timeout_secs: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.minimax.chat/v1".to_string(),
            model: "abab5.5-chat".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Loads application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A schedule trigger is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.schedule.validate()?;
    config.wishlist.cooldown_policy()?;
    Ok(config)
}

/// Loads configuration from `CONFIG_PATH` (default `./config.toml`).
///
/// A missing file is not an error: every setting has a default.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        info!("No configuration file at {}, using defaults", path);
        return Ok(AppConfig::default());
    }
    let config = load_config(&path)?;
    info!("Loaded configuration from {}", path);
    Ok(config)
}
