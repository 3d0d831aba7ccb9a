use anyhow::{Context, Result};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

use crate::poller::{PollerConfig, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
use crate::ranking::BoardQuery;

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub api_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub session_path: PathBuf,
    pub login: Option<LoginConfig>,
    pub initial_query: BoardQuery,
}

/// Credentials used to sign in when no session is stored.
#[derive(Clone)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_api_url")]
    status_board_api_url: String,
    #[serde(default = "default_poll_interval_ms")]
    status_board_poll_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    status_board_request_timeout_secs: u64,
    #[serde(default = "default_session_path")]
    status_board_session_path: String,
    #[serde(default)]
    status_board_username: Option<String>,
    #[serde(default)]
    status_board_password: Option<String>,
    #[serde(default)]
    status_board_search: Option<String>,
    #[serde(default)]
    status_board_tag: Option<String>,
}

fn default_api_url() -> String {
    "http://127.0.0.1:9115".to_string()
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_session_path() -> String {
    "status-board-session.json".to_string()
}

impl BoardConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse STATUS_BOARD_* environment variables")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let api_url = raw.status_board_api_url.trim().to_string();
        if api_url.is_empty() {
            anyhow::bail!("STATUS_BOARD_API_URL must not be empty");
        }

        let username = raw
            .status_board_username
            .map(|username| username.trim().to_string())
            .filter(|username| !username.is_empty());
        let login = match (username, raw.status_board_password) {
            (Some(username), Some(password)) => Some(LoginConfig { username, password }),
            (None, None) => None,
            _ => {
                anyhow::bail!("STATUS_BOARD_USERNAME and STATUS_BOARD_PASSWORD must be set together")
            }
        };

        Ok(Self {
            api_url,
            poll_interval: Duration::from_millis(raw.status_board_poll_interval_ms)
                .max(MIN_POLL_INTERVAL),
            request_timeout: Duration::from_secs(raw.status_board_request_timeout_secs.max(1)),
            session_path: PathBuf::from(raw.status_board_session_path),
            login,
            initial_query: BoardQuery::new(
                raw.status_board_search.unwrap_or_default(),
                raw.status_board_tag.unwrap_or_default(),
            ),
        })
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawConfig {
        envy::from_iter(Vec::<(String, String)>::new()).unwrap()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = BoardConfig::from_raw(raw()).unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9115");
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.login.is_none());
        assert_eq!(config.initial_query, BoardQuery::default());
    }

    #[test]
    fn reads_prefixed_variables() {
        let vars = vec![
            ("STATUS_BOARD_API_URL".to_string(), "board.internal:9115".to_string()),
            ("STATUS_BOARD_POLL_INTERVAL_MS".to_string(), "20".to_string()),
            ("STATUS_BOARD_REQUEST_TIMEOUT_SECS".to_string(), "0".to_string()),
            ("STATUS_BOARD_USERNAME".to_string(), "admin".to_string()),
            ("STATUS_BOARD_PASSWORD".to_string(), "hunter2".to_string()),
            ("STATUS_BOARD_TAG".to_string(), "prod".to_string()),
        ];
        let raw: RawConfig = envy::from_iter(vars).unwrap();
        let config = BoardConfig::from_raw(raw).unwrap();

        assert_eq!(config.api_url, "board.internal:9115");
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(config.request_timeout, Duration::from_secs(1));
        assert_eq!(config.login.as_ref().map(|l| l.username.as_str()), Some("admin"));
        assert_eq!(config.initial_query.selected_tag, "prod");
        assert!(!format!("{:?}", config.login).contains("hunter2"));
    }

    #[test]
    fn half_configured_login_is_rejected() {
        let vars = vec![("STATUS_BOARD_USERNAME".to_string(), "admin".to_string())];
        let raw: RawConfig = envy::from_iter(vars).unwrap();
        assert!(BoardConfig::from_raw(raw).is_err());
    }

    #[test]
    fn blank_username_with_password_is_rejected() {
        let vars = vec![
            ("STATUS_BOARD_USERNAME".to_string(), "   ".to_string()),
            ("STATUS_BOARD_PASSWORD".to_string(), "hunter2".to_string()),
        ];
        let raw: RawConfig = envy::from_iter(vars).unwrap();
        assert!(BoardConfig::from_raw(raw).is_err());
    }
}
