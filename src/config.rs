use chrono::NaiveTime;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_RESERVATION_GRACE_MINUTES: i64 = 30;
const DEFAULT_MAX_ADVANCE_DAYS: i64 = 7;
const DEFAULT_OPENING_TIME: &str = "07:30";
const DEFAULT_CLOSING_TIME: &str = "20:30";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    /// Run pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[validate(length(min = 32, message = "JWT secret must be at least 32 characters"))]
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiry_secs")]
    pub jwt_expiry_secs: u64,

    /// Interval between reservation sweep runs
    #[serde(default = "default_sweep_interval_secs")]
    pub reservation_sweep_interval_secs: u64,

    /// How long a pending reservation may be overdue before the sweep
    /// cancels it
    #[serde(default = "default_reservation_grace_minutes")]
    pub reservation_grace_minutes: i64,

    /// How far ahead a reservation may be booked
    #[serde(default = "default_max_advance_days")]
    pub reservation_max_advance_days: i64,

    /// Operating hours, "HH:MM"
    #[serde(default = "default_opening_time")]
    pub opening_time: String,

    #[serde(default = "default_closing_time")]
    pub closing_time: String,

    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_jwt_secret() -> String {
    DEV_DEFAULT_JWT_SECRET.to_string()
}
fn default_jwt_expiry_secs() -> u64 {
    8 * 60 * 60
}
fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_reservation_grace_minutes() -> i64 {
    DEFAULT_RESERVATION_GRACE_MINUTES
}
fn default_max_advance_days() -> i64 {
    DEFAULT_MAX_ADVANCE_DAYS
}
fn default_opening_time() -> String {
    DEFAULT_OPENING_TIME.to_string()
}
fn default_closing_time() -> String {
    DEFAULT_CLOSING_TIME.to_string()
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn opening_time(&self) -> NaiveTime {
        parse_time(&self.opening_time).unwrap_or_else(|| parse_time(DEFAULT_OPENING_TIME).unwrap())
    }

    pub fn closing_time(&self) -> NaiveTime {
        parse_time(&self.closing_time).unwrap_or_else(|| parse_time(DEFAULT_CLOSING_TIME).unwrap())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            jwt_secret: default_jwt_secret(),
            jwt_expiry_secs: default_jwt_expiry_secs(),
            reservation_sweep_interval_secs: default_sweep_interval_secs(),
            reservation_grace_minutes: default_reservation_grace_minutes(),
            reservation_max_advance_days: default_max_advance_days(),
            opening_time: default_opening_time(),
            closing_time: default_closing_time(),
            environment: default_environment(),
        }
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

/// Load configuration from `config/{default,<env>}.toml` plus `APP_`
/// environment overrides.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", run_env.clone())?
        .set_default("database_url", "sqlite://bistro.db?mode=rwc")?;

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{run_env}.toml"));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let cfg: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;

    info!(environment = %cfg.environment, "configuration loaded");
    Ok(cfg)
}

/// Initialize the tracing subscriber. Called once at startup.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.reservation_sweep_interval_secs, 300);
        assert_eq!(cfg.reservation_grace_minutes, 30);
        assert_eq!(cfg.reservation_max_advance_days, 7);
        assert_eq!(
            cfg.opening_time(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
        assert_eq!(
            cfg.closing_time(),
            NaiveTime::from_hms_opt(20, 30, 0).unwrap()
        );
    }

    #[test]
    fn unparseable_hours_fall_back_to_defaults() {
        let cfg = AppConfig {
            opening_time: "late".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.opening_time(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
    }
}
