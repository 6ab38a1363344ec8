use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::comment::service::{ThreadSettings, DEFAULT_MAX_REPLY_DEPTH};
use crate::member::model::MemberId;
use crate::notification::factory::MentionOptions;
use crate::notification::retention::RetentionPolicy;

pub const DEFAULT_PORT: u16 = 9500;
const DEFAULT_RETENTION_DAYS: i64 = 90;
const MAX_RETENTION_DAYS: i64 = 36_500;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Postgres connection string. Without it the service keeps data in memory.
    pub database_url: Option<String>,
    /// Enables the cross-node change feed.
    pub redis_url: Option<String>,
    pub port: u16,
    pub max_reply_depth: u32,
    pub allow_self_mentions: bool,
    pub retention_days: i64,
    pub purge_interval_secs: u64,
    pub moderator_ids: Vec<MemberId>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: None,
            port: DEFAULT_PORT,
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
            allow_self_mentions: true,
            retention_days: DEFAULT_RETENTION_DAYS,
            purge_interval_secs: DEFAULT_PURGE_INTERVAL_SECS,
            moderator_ids: Vec::new(),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name).filter(|value| !value.trim().is_empty()) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(name).map(|value| value.trim().to_lowercase()) {
        None => Ok(default),
        Some(value) => match value.as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name,
                value: value.clone(),
            }),
        },
    }
}

fn in_range<T: PartialOrd + ToString>(
    name: &'static str,
    value: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<T, ConfigError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let moderator_ids = lookup("MODERATOR_IDS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            redis_url: non_empty("REDIS_URL"),
            port: in_range(
                "PORT",
                parse_or(&lookup, "PORT", defaults.port)?,
                1..=u16::MAX,
            )?,
            max_reply_depth: parse_or(&lookup, "MAX_REPLY_DEPTH", defaults.max_reply_depth)?,
            allow_self_mentions: parse_bool(
                &lookup,
                "ALLOW_SELF_MENTIONS",
                defaults.allow_self_mentions,
            )?,
            retention_days: in_range(
                "NOTIFICATION_RETENTION_DAYS",
                parse_or(
                    &lookup,
                    "NOTIFICATION_RETENTION_DAYS",
                    defaults.retention_days,
                )?,
                1..=MAX_RETENTION_DAYS,
            )?,
            purge_interval_secs: parse_or(
                &lookup,
                "PURGE_INTERVAL_SECS",
                defaults.purge_interval_secs,
            )?,
            moderator_ids,
        })
    }

    pub fn thread_settings(&self) -> ThreadSettings {
        ThreadSettings {
            max_reply_depth: self.max_reply_depth,
            mention_options: MentionOptions {
                allow_self_mentions: self.allow_self_mentions,
            },
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: chrono::Duration::days(self.retention_days),
            interval: StdDuration::from_secs(self.purge_interval_secs.max(1)),
        }
    }
}
