use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Endpoint of the public iTunes Search API.
pub const DEFAULT_UPSTREAM_URL: &str = "https://itunes.apple.com/search";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Unsupported upstream URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Timeout for {0} cannot be 0")]
    ZeroTimeout(&'static str),
}

/// Search router configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener serving `/search`
    #[serde(default = "Listener::default_main")]
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    #[serde(default = "Listener::default_admin")]
    pub admin_listener: Listener,
    /// Catalog search API the queries are forwarded to
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub fanout: FanOutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listener: Listener::default_main(),
            admin_listener: Listener::default_admin(),
            upstream: UpstreamConfig::default(),
            fanout: FanOutConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.upstream.validate()?;
        self.fanout.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    fn default_main() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }

    fn default_admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8081,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Search endpoint; each query is appended as the `term` parameter.
    #[serde(default = "default_upstream_url")]
    pub url: Url,
    /// Per-request timeout. Unset means a call runs until it completes or fails.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            http_timeout_secs: None,
        }
    }
}

impl UpstreamConfig {
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.url.scheme() {
            "http" | "https" => {}
            other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
        if self.http_timeout_secs == Some(0) {
            return Err(ValidationError::ZeroTimeout("upstream.http_timeout_secs"));
        }
        Ok(())
    }
}

fn default_upstream_url() -> Url {
    Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream URL is valid")
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct FanOutConfig {
    /// Deadline for a whole fan-out. Searches still running when it passes
    /// are aborted and reported as timeouts.
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,
}

impl FanOutConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.task_timeout_secs == Some(0) {
            return Err(ValidationError::ZeroTimeout("fanout.task_timeout_secs"));
        }
        Ok(())
    }
}
