//! Gateway configuration

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `ROTARY_GATE_BASE_URL`
pub const ENV_PREFIX: &str = "ROTARY_GATE";

/// Settings for the authenticated request gateway and its session helpers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the backend, without a trailing slash
    pub base_url: String,

    /// Path of the refresh-token exchange endpoint
    pub refresh_path: String,

    /// Path of the credential login endpoint
    pub login_path: String,

    /// Path returning the signed-in user's profile
    pub profile_path: String,

    /// Where the user is sent when the session cannot be renewed
    pub login_redirect: String,

    /// Request timeout in seconds; no timeout when unset
    pub timeout_secs: Option<u64>,

    pub user_agent: String,

    /// Coalesce concurrent refreshes into one exchange
    pub single_flight_refresh: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5265".to_string(),
            refresh_path: "/api/Auth/refresh".to_string(),
            login_path: "/api/Auth/login".to_string(),
            profile_path: "/api/profile".to_string(),
            login_redirect: "/login".to_string(),
            timeout_secs: None,
            user_agent: concat!("rotary-gate/", env!("CARGO_PKG_VERSION")).to_string(),
            single_flight_refresh: false,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from file, with `ROTARY_GATE_*` variables on top
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> CoreResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the base URL is absolute and the paths are rooted
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] describing the first problem found
    pub fn validate(&self) -> CoreResult<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| CoreError::invalid_config(format!("base_url {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::invalid_config(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }

        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("login_path", &self.login_path),
            ("profile_path", &self.profile_path),
        ] {
            if !path.starts_with('/') {
                return Err(CoreError::invalid_config(format!(
                    "{name} must start with '/', got {path:?}"
                )));
            }
        }

        Ok(())
    }

    /// Absolute URL of a backend path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    pub fn refresh_url(&self) -> String {
        self.endpoint(&self.refresh_path)
    }

    pub fn login_url(&self) -> String {
        self.endpoint(&self.login_path)
    }

    pub fn profile_url(&self) -> String {
        self.endpoint(&self.profile_path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
