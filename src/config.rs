use crate::attendance::RetryPolicy;
use crate::utils::time::{parse_time_string, parse_utc_offset};
use anyhow::Result;
use chrono::{FixedOffset, NaiveTime};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    /// Reporting time zone: day boundaries and displayed times.
    pub utc_offset: FixedOffset,
    /// Log channel name used when a guild has no configured log channel.
    pub log_channel_name: String,
    pub daily_report_time: NaiveTime,
    pub auto_checkout_at_rollover: bool,
    pub store_retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord_token = lookup("DISCORD_TOKEN")
            .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN environment variable is required"))?;

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:attendance.db".to_string());

        let utc_offset = match lookup("ATTENDANCE_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw)
                .map_err(|e| anyhow::anyhow!("ATTENDANCE_UTC_OFFSET: {}", e))?,
            None => FixedOffset::east_opt(3 * 3600)
                .ok_or_else(|| anyhow::anyhow!("invalid default offset"))?,
        };

        let log_channel_name =
            lookup("ATTENDANCE_LOG_CHANNEL").unwrap_or_else(|| "attendance-log".to_string());

        let daily_report_time = match lookup("DAILY_REPORT_TIME") {
            Some(raw) => parse_time_string(&raw)
                .map_err(|e| anyhow::anyhow!("DAILY_REPORT_TIME: {}", e))?,
            None => NaiveTime::from_hms_opt(23, 59, 0)
                .ok_or_else(|| anyhow::anyhow!("invalid default report time"))?,
        };

        let auto_checkout_at_rollover = match lookup("AUTO_CHECKOUT_AT_ROLLOVER") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow::anyhow!("AUTO_CHECKOUT_AT_ROLLOVER must be true or false, got {:?}", raw))?,
            None => false,
        };

        let defaults = RetryPolicy::default();
        let store_retry = RetryPolicy {
            max_attempts: parse_number(&lookup, "STORE_RETRY_ATTEMPTS")?.unwrap_or(defaults.max_attempts),
            base_delay: parse_number(&lookup, "STORE_RETRY_BASE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: parse_number(&lookup, "STORE_RETRY_MAX_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        };
        if store_retry.max_attempts == 0 {
            return Err(anyhow::anyhow!("STORE_RETRY_ATTEMPTS must be at least 1"));
        }

        Ok(Config {
            discord_token,
            database_url,
            utc_offset,
            log_channel_name,
            daily_report_time,
            auto_checkout_at_rollover,
            store_retry,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got {:?}", key, raw))
        })
        .transpose()
}
