//! Application configuration module
//!
//! Loads the monitor settings from a JSON settings file layered with
//! `PGMON_*` environment variables (and `DATABASE_URL`). Settings are
//! reloaded before every cycle, so edits take effect without a restart.

use crate::snapshot::InclusionFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Seconds between cycles when the settings do not say otherwise
pub const DEFAULT_INTERVAL_SECS: f64 = 5.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required setting: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub require_tls: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            require_tls: false,
        }
    }
}

/// Settings file layout. Keys keep the names used by existing settings files;
/// the lowercase aliases cover sources that fold key case.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    sslmode: Option<String>,
    #[serde(rename = "OnlyDetectTablesAndViews", alias = "onlydetecttablesandviews")]
    only_detect: Option<Vec<String>>,
    #[serde(rename = "ExcludedTablesAndViews", alias = "excludedtablesandviews")]
    excluded: Option<Vec<String>>,
    #[serde(rename = "ExecuteTimeInterval", alias = "executetimeinterval")]
    interval: Option<f64>,
    #[serde(rename = "SnapshotFlushDir", alias = "snapshotflushdir")]
    flush_dir: Option<PathBuf>,
}

/// `PGMON_*` variables; the two list options take comma separated names
fn environment() -> config::Environment {
    config::Environment::with_prefix("PGMON")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("onlydetecttablesandviews")
        .with_list_parse_key("excludedtablesandviews")
}

/// Complete monitor settings, immutable for the duration of one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub only_detect: Vec<String>,
    pub excluded: Vec<String>,
    pub interval: Duration,
    pub flush_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            only_detect: Vec::new(),
            excluded: Vec::new(),
            interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
            flush_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from the given file plus the environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw: RawSettings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        let database_url = std::env::var("DATABASE_URL").ok();
        Self::from_raw(raw, database_url.as_deref())
    }

    fn from_raw(raw: RawSettings, database_url: Option<&str>) -> Result<Self, ConfigError> {
        let database = match database_url {
            Some(url) => Self::parse_database_url(url)?,
            None => {
                let defaults = DatabaseConfig::default();
                DatabaseConfig {
                    host: raw.host.unwrap_or(defaults.host),
                    port: raw.port.unwrap_or(defaults.port),
                    user: raw.user.ok_or_else(|| ConfigError::MissingVar("user".to_string()))?,
                    password: raw.password.unwrap_or_default(),
                    database: raw
                        .database
                        .ok_or_else(|| ConfigError::MissingVar("database".to_string()))?,
                    require_tls: raw.sslmode.as_deref() == Some("require"),
                }
            }
        };

        let interval_secs = raw.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "ExecuteTimeInterval must be a positive number of seconds, got {}",
                interval_secs
            )));
        }

        Ok(Self {
            database,
            only_detect: raw.only_detect.unwrap_or_default(),
            excluded: raw.excluded.unwrap_or_default(),
            interval: Duration::from_secs_f64(interval_secs),
            flush_dir: raw.flush_dir,
        })
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    fn parse_database_url(url: &str) -> Result<DatabaseConfig, ConfigError> {
        let parsed = url::Url::parse(url).map_err(|_| {
            ConfigError::InvalidValue("Invalid DATABASE_URL format (expected postgresql://...)".to_string())
        })?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(ConfigError::InvalidValue(format!(
                "Unsupported scheme in DATABASE_URL: {}",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
            .to_string();

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(ConfigError::MissingVar("database name in DATABASE_URL".to_string()));
        }

        let user = if parsed.username().is_empty() {
            DatabaseConfig::default().user
        } else {
            parsed.username().to_string()
        };

        let require_tls = parsed
            .query_pairs()
            .any(|(key, value)| key == "sslmode" && value == "require");

        Ok(DatabaseConfig {
            host,
            port: parsed.port().unwrap_or(5432),
            user,
            password: parsed.password().map(|p| p.to_string()).unwrap_or_default(),
            database,
            require_tls,
        })
    }

    /// Inclusion filter built from the allow and deny lists
    pub fn filter(&self) -> InclusionFilter {
        InclusionFilter::new(self.only_detect.iter().cloned(), self.excluded.iter().cloned())
    }
}

/// Reloads settings every cycle, falling back to the last good settings
pub struct SettingsLoader {
    path: PathBuf,
    last_good: Option<Settings>,
}

impl SettingsLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load fresh settings; on failure log it and keep the previous ones
    pub fn reload(&mut self) -> Settings {
        match Settings::load(&self.path) {
            Ok(settings) => {
                if self.last_good.as_ref() != Some(&settings) {
                    debug!("Settings loaded from {}", self.path.display());
                }
                self.last_good = Some(settings.clone());
                settings
            }
            Err(e) => {
                warn!("{}", e);
                match &self.last_good {
                    Some(previous) => previous.clone(),
                    None => {
                        warn!("No settings loaded yet, using defaults");
                        Settings::default()
                    }
                }
            }
        }
    }
}
