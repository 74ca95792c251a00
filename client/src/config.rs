//! Client configuration parsed from environment variables.
//!
//! `from_env` reads the process environment; `from_lookup` takes any key
//! lookup so tests never touch global env state.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_UPLOADS_BASE_URL: &str = "http://localhost:8000/uploads";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UNREAD_POLL_SECS: u64 = 30;
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// A configuration value could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("config parse failed: {key}={value:?} is not a valid {expected}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST API root, without a trailing slash.
    pub api_base_url: String,
    /// Root for uploaded media, without a trailing slash.
    pub uploads_base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Period of the unread-notification poller.
    pub unread_poll_secs: u64,
    /// Location the pipeline navigates to when the session is lost.
    pub login_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            uploads_base_url: DEFAULT_UPLOADS_BASE_URL.to_owned(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            unread_poll_secs: DEFAULT_UNREAD_POLL_SECS,
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// All optional:
    /// - `PHOTOFEED_API_BASE_URL`: default `http://localhost:8000/api`
    /// - `PHOTOFEED_UPLOADS_BASE_URL`: default `http://localhost:8000/uploads`
    /// - `PHOTOFEED_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PHOTOFEED_CONNECT_TIMEOUT_SECS`: default 10
    /// - `PHOTOFEED_UNREAD_POLL_SECS`: default 30
    /// - `PHOTOFEED_LOGIN_PATH`: default `/login`
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value does not parse or the unread poll
    /// interval is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
                .trim()
                .trim_end_matches('/')
                .to_owned()
        };
        let secs = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError {
                    key,
                    value: raw,
                    expected: "number of seconds",
                }),
            }
        };

        let poll_secs = match secs("PHOTOFEED_UNREAD_POLL_SECS", DEFAULT_UNREAD_POLL_SECS) {
            Ok(0) => Err(ConfigError {
                key: "PHOTOFEED_UNREAD_POLL_SECS",
                value: "0".to_owned(),
                expected: "positive number of seconds",
            }),
            other => other,
        };

        let login_path = lookup("PHOTOFEED_LOGIN_PATH")
            .map(|p| p.trim().to_owned())
            .filter(|p| p.starts_with('/'))
            .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_owned());

        Ok(Self {
            api_base_url: url("PHOTOFEED_API_BASE_URL", DEFAULT_API_BASE_URL),
            uploads_base_url: url("PHOTOFEED_UPLOADS_BASE_URL", DEFAULT_UPLOADS_BASE_URL),
            request_timeout_secs: secs("PHOTOFEED_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_timeout_secs: secs("PHOTOFEED_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            unread_poll_secs: poll_secs?,
            login_path,
        })
    }

    /// Absolute URL for an API path such as `/users/me`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}
