use serde::Deserialize;
use std::{fs, path::Path};

use crate::pipeline::PipelineError;

pub const PG_URI_ENV: &str = "PG_URI";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const CONFIG_PATH_ENV: &str = "WEATHER_ETL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "weather-etl.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    pub base_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub timeout_secs: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        // Chapecó, SC
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            latitude: -27.0964,
            longitude: -52.6183,
            timezone: "auto".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub table: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatabaseOverrides {
    table: String,
    max_connections: u32,
}

impl Default for DatabaseOverrides {
    fn default() -> Self {
        Self {
            table: "hourly_forecast".to_string(),
            max_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    database: DatabaseOverrides,
    forecast: ForecastConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub forecast: ForecastConfig,
    pub log_level: String,
}

/// Map a level name onto a tracing level. Python-style names
/// (`WARNING`, `CRITICAL`, `FATAL`) are accepted too.
pub fn parse_level_name(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" | "fatal" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}

/// Level from `LOG_LEVEL`; unset, blank or unknown names give `info`.
pub fn log_level(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup(LOG_LEVEL_ENV)
        .and_then(|v| parse_level_name(&v))
        .unwrap_or(DEFAULT_LOG_LEVEL)
        .to_string()
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    head_ok && s.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl AppConfig {
    /// Build from the process environment and the optional TOML overrides file.
    pub fn load() -> Result<Self, PipelineError> {
        use std::env;

        let lookup = |key: &str| env::var(key).ok();
        let contents = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Some(fs::read_to_string(&path).map_err(|e| {
                PipelineError::Config(format!("failed to read config file '{path}': {e}"))
            })?),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Some(fs::read_to_string(DEFAULT_CONFIG_PATH).map_err(|e| {
                    PipelineError::Config(format!(
                        "failed to read config file '{DEFAULT_CONFIG_PATH}': {e}"
                    ))
                })?)
            }
            None => None,
        };

        Self::from_lookup(lookup, contents.as_deref())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        file_contents: Option<&str>,
    ) -> Result<Self, PipelineError> {
        let file: FileConfig = match file_contents {
            Some(contents) => toml::from_str(contents)
                .map_err(|e| PipelineError::Config(format!("invalid config file: {e}")))?,
            None => FileConfig::default(),
        };

        let uri = lookup(PG_URI_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PipelineError::Config(format!("{PG_URI_ENV} is not set")))?;

        let cfg = AppConfig {
            database: DatabaseConfig {
                uri,
                table: file.database.table,
                max_connections: file.database.max_connections,
            },
            forecast: file.forecast,
            log_level: log_level(&lookup),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if !is_plain_identifier(&self.database.table) {
            return Err(PipelineError::Config(format!(
                "database.table '{}' is not a plain SQL identifier",
                self.database.table
            )));
        }
        if self.database.max_connections == 0 {
            return Err(PipelineError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.forecast.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "forecast.timeout_secs must be positive".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.forecast.latitude) {
            return Err(PipelineError::Config(format!(
                "forecast.latitude {} is out of range",
                self.forecast.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.forecast.longitude) {
            return Err(PipelineError::Config(format!(
                "forecast.longitude {} is out of range",
                self.forecast.longitude
            )));
        }
        Ok(())
    }
}
