//! Queue configuration.
//!
//! Defaults reproduce the reference client: 200ms spacing (5 requests per
//! second), three attempts, one second of linear backoff per attempt. Every
//! field can be set from TOML and overridden from `OPENF1_*` environment
//! variables. Durations are written the humantime way (`"200ms"`, `"1s"`).

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pace_limit::RetryPolicy;
use pace_limit::Spacing;
use serde::Deserialize;
use serde::Deserializer;

/// The public OpenF1 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openf1.org/v1";

/// Default channel bound for callers waiting on the buffer.
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed queue config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Origin (plus path prefix) every request path is appended to.
    pub base_url: String,

    /// Minimum gap between two dispatches.
    #[serde(deserialize_with = "humantime_duration")]
    pub min_interval: Duration,

    /// Attempts per request, including the first.
    pub max_attempts: NonZeroUsize,

    /// Backoff after attempt `n` is `n * backoff_step` unless the upstream
    /// sent `Retry-After`.
    #[serde(deserialize_with = "humantime_duration")]
    pub backoff_step: Duration,

    /// Per-attempt bound once dispatched. `None` waits indefinitely.
    #[serde(deserialize_with = "humantime_duration_opt")]
    pub request_timeout: Option<Duration>,

    /// Callers that may wait on the dispatch channel at once.
    pub capacity: NonZeroUsize,

    pub user_agent: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            min_interval: Duration::from_millis(200),
            max_attempts: NonZeroUsize::MIN.saturating_add(2),
            backoff_step: Duration::from_secs(1),
            request_timeout: Some(Duration::from_secs(30)),
            capacity: DEFAULT_CAPACITY,
            user_agent: None,
        }
    }
}

impl QueueConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Apply `OPENF1_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any lookup; unset keys leave the field alone.
    ///
    /// Recognised keys: `OPENF1_BASE_URL`, `OPENF1_MIN_INTERVAL`,
    /// `OPENF1_MAX_ATTEMPTS`, `OPENF1_BACKOFF_STEP`, `OPENF1_REQUEST_TIMEOUT`
    /// (`"none"` disables it), `OPENF1_CAPACITY`, `OPENF1_USER_AGENT`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OPENF1_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("OPENF1_MIN_INTERVAL") {
            self.min_interval = parse_duration("OPENF1_MIN_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("OPENF1_MAX_ATTEMPTS") {
            self.max_attempts = parse_non_zero("OPENF1_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("OPENF1_BACKOFF_STEP") {
            self.backoff_step = parse_duration("OPENF1_BACKOFF_STEP", &v)?;
        }
        if let Some(v) = lookup("OPENF1_REQUEST_TIMEOUT") {
            self.request_timeout = if v.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_duration("OPENF1_REQUEST_TIMEOUT", &v)?)
            };
        }
        if let Some(v) = lookup("OPENF1_CAPACITY") {
            self.capacity = parse_non_zero("OPENF1_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("OPENF1_USER_AGENT") {
            self.user_agent = Some(v);
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_step)
    }

    pub fn spacing(&self) -> Arc<Spacing> {
        Arc::new(Spacing::new(self.min_interval))
    }
}

fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_non_zero(key: &'static str, value: &str) -> Result<NonZeroUsize, ConfigError> {
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn humantime_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if raw.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    humantime::parse_duration(&raw)
        .map(Some)
        .map_err(serde::de::Error::custom)
}
