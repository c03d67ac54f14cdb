//! Client configuration: defaults, optional JSON file, environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const ENV_CONFIG_FILE: &str = "TALENTGATE_CONFIG";
pub const ENV_API_URL: &str = "TALENTGATE_API_URL";
pub const ENV_TOKEN_PATH: &str = "TALENTGATE_TOKEN_PATH";
pub const ENV_POLL_MS: &str = "TALENTGATE_POLL_MS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("invalid config file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// REST paths relative to `api_url`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub identity: String,
    pub login: String,
    pub logout: String,
    pub notifications: String,
    pub rooms: String,
    /// Prefix of per-room paths; `/{id}/messages` etc. are appended.
    pub room: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity: "/user".into(),
            login: "/auth/login".into(),
            logout: "/auth/logout".into(),
            notifications: "/chat/notifications".into(),
            rooms: "/chat/rooms".into(),
            room: "/chat/room".into(),
        }
    }
}

/// Redirect targets used by the route guard. Fixed per deployment, never derived at runtime.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Routes {
    pub login: String,
    pub admin_home: String,
    pub promoter_home: String,
    pub candidate_home: String,
    pub dashboard: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            login: "/login".into(),
            admin_home: "/admin".into(),
            promoter_home: "/promoteur".into(),
            candidate_home: "/candidat".into(),
            dashboard: "/dashboard".into(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default = "ClientConfig::default_api_url")]
    pub api_url: String,
    /// File holding the bearer token between runs.
    #[serde(default = "ClientConfig::default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "ClientConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-request timeout; transport default when unset.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub routes: Routes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Self::default_api_url(),
            token_path: Self::default_token_path(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            request_timeout_ms: None,
            endpoints: Endpoints::default(),
            routes: Routes::default(),
        }
    }
}

impl ClientConfig {
    fn default_api_url() -> String { "http://localhost:8000".to_string() }
    fn default_token_path() -> PathBuf { PathBuf::from(".talentgate").join("token") }
    fn default_poll_interval_ms() -> u64 { 30_000 }

    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }

    pub fn request_timeout(&self) -> Option<Duration> { self.request_timeout_ms.map(Duration::from_millis) }

    /// Parse a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Defaults, then `TALENTGATE_CONFIG` file if set, then individual env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(ENV_CONFIG_FILE) {
            Ok(p) if !p.trim().is_empty() => Self::from_file(Path::new(p.trim()))?,
            _ => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        info!(
            target: "config",
            "talentgate config: api_url='{}', token_path={:?}, poll_interval_ms={}",
            cfg.api_url, cfg.token_path, cfg.poll_interval_ms
        );
        Ok(cfg)
    }

    /// Apply overrides from a variable lookup. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(url) = get(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(p) = get(ENV_TOKEN_PATH) {
            self.token_path = PathBuf::from(p);
        }
        if let Some(ms) = get(ENV_POLL_MS) {
            self.poll_interval_ms = match ms.parse::<u64>() {
                Ok(v) if v > 0 => v,
                _ => return Err(ConfigError::InvalidValue { key: ENV_POLL_MS, value: ms }),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("client.json");
        std::fs::write(&p, r#"{"api_url":"https://api.example.test","routes":{"login":"/signin"}}"#).unwrap();
        let cfg = ClientConfig::from_file(&p).unwrap();
        assert_eq!(cfg.api_url, "https://api.example.test");
        assert_eq!(cfg.routes.login, "/signin");
        assert_eq!(cfg.routes.admin_home, "/admin");
        assert_eq!(cfg.endpoints.identity, "/user");
        assert_eq!(cfg.endpoints.room, "/chat/room");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_apply_and_validate() {
        let vars: HashMap<&str, &str> = [(ENV_API_URL, " http://127.0.0.1:9 "), (ENV_POLL_MS, "250"), (ENV_TOKEN_PATH, "")]
            .into_iter()
            .collect();
        let mut cfg = ClientConfig::default();
        cfg.apply_env(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.api_url, "http://127.0.0.1:9");
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.token_path, ClientConfig::default().token_path);

        let mut cfg = ClientConfig::default();
        let err = cfg.apply_env(|k| (k == ENV_POLL_MS).then(|| "0".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_POLL_MS, .. }));
    }

    #[test]
    fn bad_json_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("broken.json");
        std::fs::write(&p, "{ not json").unwrap();
        let err = ClientConfig::from_file(&p).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
