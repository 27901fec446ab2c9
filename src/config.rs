use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::info;
use url::Url;

use crate::error::ConfigError;
use crate::stream::RECONNECT_DELAY;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_FEED_URL: &str = "ws://localhost:8000/ws";
const DEFAULT_SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: Url,
    pub feed_base_url: Url,
    pub reconnect_delay: Duration,
    pub session_path: PathBuf,
}

impl Config {
    /// Read settings from the environment (call `dotenvy::dotenv()` first to
    /// pick up a `.env` file).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url =
            parse_url("RESULTS_API_URL", &load(&lookup, "RESULTS_API_URL", DEFAULT_API_URL))?;
        let feed_base_url =
            parse_url("RESULTS_FEED_URL", &load(&lookup, "RESULTS_FEED_URL", DEFAULT_FEED_URL))?;

        let default_delay = RECONNECT_DELAY.as_secs().to_string();
        let delay_raw = load(&lookup, "RESULTS_RECONNECT_SECS", &default_delay);
        // At least one second
        let reconnect_secs = delay_raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "RESULTS_RECONNECT_SECS",
                value: delay_raw.clone(),
            })?;

        let session_path = PathBuf::from(load(&lookup, "RESULTS_SESSION_FILE", DEFAULT_SESSION_FILE));

        Ok(Self {
            api_base_url,
            feed_base_url,
            reconnect_delay: Duration::from_secs(reconnect_secs),
            session_path,
        })
    }

    /// `GET` target for the initial snapshot of a survey.
    pub fn snapshot_url(&self, survey_id: &str) -> Result<Url, ConfigError> {
        snapshot_url(&self.api_base_url, survey_id)
    }

    /// Live feed target for a survey.
    pub fn feed_url(&self, survey_id: &str) -> Result<Url, ConfigError> {
        with_segments(&self.feed_base_url, &["results", survey_id])
    }
}

fn load<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { key, source })
}

pub fn snapshot_url(api_base: &Url, survey_id: &str) -> Result<Url, ConfigError> {
    with_segments(api_base, &["surveys", survey_id, "results"])
}

// Appends percent-encoded path segments, keeping any path the base already has
fn with_segments(base: &Url, segments: &[&str]) -> Result<Url, ConfigError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ConfigError::NotABase(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
