use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{BoardError, BoardResult};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const SERVER_URL_ENV: &str = "KANBAN_SERVER_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: Url,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    server_url: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server url is valid"),
        }
    }
}

impl ClientSettings {
    pub fn with_server_url(raw: &str) -> BoardResult<Self> {
        Ok(Self {
            server_url: parse_server_url(raw)?,
        })
    }

    /// `/ws` on the same host, `wss` for https servers and `ws` otherwise.
    pub fn websocket_url(&self) -> BoardResult<Url> {
        let mut ws_url = self.server_url.clone();
        let scheme = if ws_url.scheme() == "https" { "wss" } else { "ws" };
        ws_url
            .set_scheme(scheme)
            .map_err(|()| BoardError::Config(format!("cannot derive websocket url from {}", self.server_url)))?;
        ws_url.set_path("/ws");
        ws_url.set_query(None);
        ws_url.set_fragment(None);
        Ok(ws_url)
    }
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(".config").join("kanban").join("config.yaml")
}

pub fn load_settings() -> ClientSettings {
    let env_value = std::env::var(SERVER_URL_ENV).ok();
    load_settings_from(dirs::home_dir().as_deref(), env_value.as_deref())
}

/// Environment wins over the config file; anything unusable falls back to the default.
pub fn load_settings_from(home: Option<&Path>, env_value: Option<&str>) -> ClientSettings {
    if let Some(raw) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
        match parse_server_url(raw) {
            Ok(server_url) => return ClientSettings { server_url },
            Err(err) => warn!(env = SERVER_URL_ENV, "ignoring server url override: {err}"),
        }
    }

    let Some(home) = home else {
        return ClientSettings::default();
    };
    let path = config_path(home);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path = %path.display(), "no client config file: {err}");
            return ClientSettings::default();
        }
    };

    let file_cfg = match serde_yaml::from_str::<FileConfig>(&raw) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(path = %path.display(), "ignoring unreadable client config: {err}");
            return ClientSettings::default();
        }
    };

    let Some(raw) = file_cfg.server_url.as_deref() else {
        return ClientSettings::default();
    };
    match parse_server_url(raw) {
        Ok(server_url) => ClientSettings { server_url },
        Err(err) => {
            warn!(path = %path.display(), "ignoring server url in client config: {err}");
            ClientSettings::default()
        }
    }
}

pub fn parse_server_url(raw: &str) -> BoardResult<Url> {
    let parsed = Url::parse(raw.trim())
        .map_err(|err| BoardError::Config(format!("invalid server url '{raw}': {err}")))?;
    if parsed.host_str().is_none() {
        return Err(BoardError::Config(format!("server url '{raw}' has no host")));
    }
    Ok(parsed)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
