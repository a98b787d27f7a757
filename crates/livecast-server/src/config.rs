use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use livecast_source::GraphConfig;
use livecast_source::client::{DEFAULT_API_VERSION, DEFAULT_BASE_URL, DEFAULT_FIELDS};

pub const DEFAULT_VIDEO_ID: &str = "836332258915642";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required but unset or empty")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub graph: GraphConfig,
    pub refresh_interval: Duration,
    pub display_interval: Duration,
    pub startup_delay: Duration,
    pub sample_size: usize,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset and empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_token = get("PAGE_ACCESS_TOKEN").ok_or(ConfigError::Missing("PAGE_ACCESS_TOKEN"))?;
        let video_id = get("VIDEO_ID").unwrap_or_else(|| DEFAULT_VIDEO_ID.into());

        let mut graph = GraphConfig::new(video_id.trim(), access_token.trim());
        graph.base_url = get("LIVECAST_GRAPH_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        graph.api_version = get("LIVECAST_GRAPH_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.into());
        graph.fields = DEFAULT_FIELDS.into();
        graph.timeout = seconds(&get, "LIVECAST_FETCH_TIMEOUT_SECS", 10)?;
        graph.page_limit = match get("LIVECAST_FETCH_LIMIT") {
            Some(raw) => Some(parse("LIVECAST_FETCH_LIMIT", &raw)?),
            None => None,
        };

        let sample_size: usize = match get("LIVECAST_SAMPLE_SIZE") {
            Some(raw) => parse("LIVECAST_SAMPLE_SIZE", &raw)?,
            None => 5,
        };
        if sample_size == 0 {
            return Err(invalid("LIVECAST_SAMPLE_SIZE", "0", "must be at least 1"));
        }

        let startup_delay = match get("LIVECAST_STARTUP_DELAY_SECS") {
            Some(raw) => Duration::from_secs(parse("LIVECAST_STARTUP_DELAY_SECS", &raw)?),
            None => Duration::from_secs(10),
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: match get("PORT") {
                Some(raw) => parse("PORT", &raw)?,
                None => 3000,
            },
            graph,
            refresh_interval: seconds(&get, "LIVECAST_REFRESH_SECS", 30)?,
            display_interval: seconds(&get, "LIVECAST_DISPLAY_SECS", 10)?,
            startup_delay,
            sample_size,
            static_dir: get("LIVECAST_STATIC_DIR").unwrap_or_else(|| "public".into()).into(),
        })
    }
}

/// A strictly positive number of seconds.
fn seconds<G>(get: &G, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs = match get(name) {
        Some(raw) => parse(name, &raw)?,
        None => default,
    };
    if secs == 0 {
        return Err(invalid(name, "0", "must be at least 1 second"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(name, raw, &e.to_string()))
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
