//! Backend Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Upper bound for page sizes accepted by list queries.
pub const MAX_PAGE_SIZE: usize = 100;

/// Upper bound for `CRM_INVITATION_EXPIRY_DAYS`.
pub const MAX_INVITATION_EXPIRY_DAYS: i64 = 365;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => bail!("unknown log format: {other}"),
        }
    }
}

/// Backend configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON snapshot file backing the in-memory store (optional)
    pub snapshot_path: Option<PathBuf>,

    /// Days until an invitation expires (default: 7, at most 365)
    pub invitation_expiry_days: i64,

    /// Page size used when a list query does not specify one (default: 10)
    pub default_page_size: usize,

    /// Timezone for new organizations (default: UTC)
    pub default_timezone: String,

    /// Date format for new organizations (default: MM/DD/YYYY)
    pub default_date_format: String,

    /// Currency for new organizations and leads (default: USD)
    pub default_currency: String,

    /// Color assigned to teams created without one
    pub default_team_color: String,

    /// Log output format (default: json)
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let default_page_size = parse_var("CRM_DEFAULT_PAGE_SIZE", 10)?;
        if default_page_size == 0 || default_page_size > MAX_PAGE_SIZE {
            bail!("CRM_DEFAULT_PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}");
        }
        let invitation_expiry_days = parse_var("CRM_INVITATION_EXPIRY_DAYS", 7)?;
        if !(1..=MAX_INVITATION_EXPIRY_DAYS).contains(&invitation_expiry_days) {
            bail!(
                "CRM_INVITATION_EXPIRY_DAYS must be between 1 and {MAX_INVITATION_EXPIRY_DAYS}"
            );
        }

        Ok(Self {
            snapshot_path: env::var("CRM_SNAPSHOT_PATH").ok().map(PathBuf::from),
            invitation_expiry_days,
            default_page_size,
            default_timezone: env::var("CRM_DEFAULT_TIMEZONE").unwrap_or_else(|_| "UTC".into()),
            default_date_format: env::var("CRM_DEFAULT_DATE_FORMAT")
                .unwrap_or_else(|_| "MM/DD/YYYY".into()),
            default_currency: env::var("CRM_DEFAULT_CURRENCY").unwrap_or_else(|_| "USD".into()),
            default_team_color: env::var("CRM_DEFAULT_TEAM_COLOR")
                .unwrap_or_else(|_| "#1677ff".into()),
            log_format: parse_var("CRM_LOG_FORMAT", LogFormat::Json)?,
        })
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            snapshot_path: None,
            invitation_expiry_days: 7,
            default_page_size: 10,
            default_timezone: "UTC".into(),
            default_date_format: "MM/DD/YYYY".into(),
            default_currency: "USD".into(),
            default_team_color: "#1677ff".into(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("{name} is invalid: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "CRM_SNAPSHOT_PATH",
        "CRM_INVITATION_EXPIRY_DAYS",
        "CRM_DEFAULT_PAGE_SIZE",
        "CRM_DEFAULT_TIMEZONE",
        "CRM_DEFAULT_DATE_FORMAT",
        "CRM_DEFAULT_CURRENCY",
        "CRM_DEFAULT_TEAM_COLOR",
        "CRM_LOG_FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().unwrap();

        assert!(config.snapshot_path.is_none());
        assert_eq!(config.invitation_expiry_days, 7);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.default_date_format, "MM/DD/YYYY");
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.default_team_color, "#1677ff");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        env::set_var("CRM_SNAPSHOT_PATH", "/tmp/crm.json");
        env::set_var("CRM_INVITATION_EXPIRY_DAYS", "14");
        env::set_var("CRM_DEFAULT_CURRENCY", "EUR");
        env::set_var("CRM_LOG_FORMAT", "Pretty");

        let config = Config::from_env().unwrap();
        clear_env();

        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/crm.json")));
        assert_eq!(config.invitation_expiry_days, 14);
        assert_eq!(config.default_currency, "EUR");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_an_error() {
        clear_env();
        env::set_var("CRM_INVITATION_EXPIRY_DAYS", "a week");
        let err = Config::from_env().unwrap_err();
        clear_env();

        assert!(err.to_string().contains("CRM_INVITATION_EXPIRY_DAYS"));
    }

    #[test]
    #[serial]
    fn test_page_size_bounds() {
        clear_env();
        env::set_var("CRM_DEFAULT_PAGE_SIZE", "0");
        assert!(Config::from_env().is_err());
        env::set_var("CRM_DEFAULT_PAGE_SIZE", "101");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invitation_expiry_bounds() {
        clear_env();
        for raw in ["0", "-5", "366", "1000000000"] {
            env::set_var("CRM_INVITATION_EXPIRY_DAYS", raw);
            let err = Config::from_env().unwrap_err();
            assert!(
                err.to_string().contains("CRM_INVITATION_EXPIRY_DAYS"),
                "{raw} should be rejected"
            );
        }
        env::set_var("CRM_INVITATION_EXPIRY_DAYS", "365");
        assert_eq!(Config::from_env().unwrap().invitation_expiry_days, 365);
        clear_env();
    }
}
