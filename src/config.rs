use std::env;

use chrono::NaiveTime;

use crate::error::AppError;
use crate::models::courier::ShiftWindow;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Seconds between polling-driver cycles.
    pub poll_interval_secs: u64,
    /// Delay before a called courier is auto-advanced to delivering.
    pub auto_advance_secs: u64,
    /// Delivering longer than this forces a return to the queue.
    pub overtime_secs: i64,
    /// Delay before the second-in-queue heads-up is sent.
    pub standby_delay_secs: u64,
    pub default_shift: ShiftWindow,
    /// Local hour from which the previous shift's history may be purged.
    pub history_purge_unlock_hour: u32,
    pub country_code: String,
    pub whatsapp_url: Option<String>,
    pub whatsapp_api_key: Option<String>,
    pub whatsapp_instance: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            poll_interval_secs: parse_or_default("POLL_INTERVAL_SECS", 5)?,
            auto_advance_secs: parse_or_default("AUTO_ADVANCE_SECS", 15)?,
            overtime_secs: parse_or_default("OVERTIME_SECS", 3600)?,
            standby_delay_secs: parse_or_default("STANDBY_DELAY_SECS", 10)?,
            default_shift: ShiftWindow {
                start: parse_time("DEFAULT_SHIFT_START", "16:00")?,
                end: parse_time("DEFAULT_SHIFT_END", "02:00")?,
            },
            history_purge_unlock_hour: parse_or_default("HISTORY_PURGE_UNLOCK_HOUR", 12)?,
            country_code: env::var("COUNTRY_CODE").unwrap_or_else(|_| "55".to_string()),
            whatsapp_url: env::var("WHATSAPP_URL").ok(),
            whatsapp_api_key: env::var("WHATSAPP_API_KEY").ok(),
            whatsapp_instance: env::var("WHATSAPP_INSTANCE").ok(),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn parse_time(key: &str, default: &str) -> Result<NaiveTime, AppError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .map_err(|err| AppError::Internal(format!("invalid {key}: {err}")))
}
