//! Process configuration, read once at startup.

use std::{fmt, fs, net::SocketAddr, path::Path, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::camera::DEFAULT_FETCH_TIMEOUT;
use crate::line_api::DEFAULT_LINE_API_BASE;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite(PathBuf),
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "" | "memory" => Ok(Self::Memory),
            other => match other.strip_prefix("sqlite:") {
                Some(path) if !path.is_empty() => Ok(Self::Sqlite(PathBuf::from(path))),
                _ => Err(anyhow!("unknown webhook store `{other}`")),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("unknown log format `{other}`")),
        }
    }
}

/// Channel credentials as found in a `keys.json` file.
#[derive(Clone, Deserialize)]
struct KeysFile {
    channel_secret: String,
    channel_token: String,
}

#[derive(Clone)]
pub struct RelayConfig {
    pub channel_secret: String,
    pub channel_token: String,
    pub bind: SocketAddr,
    pub line_api_base: String,
    pub store: StoreBackend,
    pub camera_fetch_timeout: Duration,
    pub log_format: LogFormat,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("channel_secret", &"<redacted>")
            .field("channel_token", &"<redacted>")
            .field("bind", &self.bind)
            .field("line_api_base", &self.line_api_base)
            .field("store", &self.store)
            .field("camera_fetch_timeout", &self.camera_fetch_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let keys = match lookup("CAMERA_RELAY_KEYS") {
            Some(path) => Some(load_keys(Path::new(&path))?),
            None => None,
        };
        let channel_secret = lookup("LINE_CHANNEL_SECRET")
            .or_else(|| keys.as_ref().map(|k| k.channel_secret.clone()))
            .filter(|s| !s.is_empty())
            .context("LINE_CHANNEL_SECRET is not set")?;
        let channel_token = lookup("LINE_CHANNEL_TOKEN")
            .or_else(|| keys.as_ref().map(|k| k.channel_token.clone()))
            .filter(|s| !s.is_empty())
            .context("LINE_CHANNEL_TOKEN is not set")?;

        let bind = lookup("BIND")
            .unwrap_or_else(|| DEFAULT_BIND.into())
            .parse::<SocketAddr>()
            .context("parse BIND")?;
        let line_api_base = lookup("LINE_API_BASE").unwrap_or_else(|| DEFAULT_LINE_API_BASE.into());
        let store = lookup("WEBHOOK_STORE")
            .unwrap_or_default()
            .parse::<StoreBackend>()
            .context("parse WEBHOOK_STORE")?;
        let camera_fetch_timeout = match lookup("CAMERA_FETCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("parse CAMERA_FETCH_TIMEOUT_SECS `{raw}`"))?;
                if secs == 0 {
                    bail!("CAMERA_FETCH_TIMEOUT_SECS must be positive");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_FETCH_TIMEOUT,
        };
        let log_format = lookup("LOG_FORMAT")
            .unwrap_or_default()
            .parse::<LogFormat>()
            .context("parse LOG_FORMAT")?;

        Ok(Self {
            channel_secret,
            channel_token,
            bind,
            line_api_base,
            store,
            camera_fetch_timeout,
            log_format,
        })
    }
}

fn load_keys(path: &Path) -> Result<KeysFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read channel keys {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse channel keys {}", path.display()))
}
