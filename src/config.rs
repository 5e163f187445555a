use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use dotenvy::dotenv;

use crate::calendar::parse_utc_offset;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,
    pub rate_trigger_per_min: u32,

    pub api_prefix: String,

    /// Shared secret the external scheduler sends as a bearer token.
    pub cron_secret: Option<String>,
    /// Offset used for calendar-day bounds.
    pub utc_offset: FixedOffset,

    pub log_dir: String,
    pub log_level: tracing::Level,
    pub run_migrations: bool,
    pub activity_debounce_secs: u64,

    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let utc_offset = match optional("APP_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw)
                .ok_or_else(|| anyhow!("APP_UTC_OFFSET must look like +06:00, got `{raw}`"))?,
            None => FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid zero offset"))?,
        };

        let bootstrap_admin = match (
            optional("BOOTSTRAP_ADMIN_USERNAME"),
            optional("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"
                ));
            }
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parse_or(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,
            rate_trigger_per_min: parse_or(&lookup, "RATE_TRIGGER_PER_MIN", 10)?,

            api_prefix: optional("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            cron_secret: optional("CRON_SECRET"),
            utc_offset,

            log_dir: optional("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parse_or(&lookup, "LOG_LEVEL", tracing::Level::DEBUG)?,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
            activity_debounce_secs: parse_or(&lookup, "ACTIVITY_DEBOUNCE_SECS", 60)?,

            bootstrap_admin,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value `{raw}`")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/test".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            "CRON_SECRET" => Some("cron-secret".into()),
            _ => None,
        })
        .expect("test config")
    }
}
