//! Campaign configuration.
//!
//! Layered like the rest of the workspace's config handling:
//! 1. Defaults (the live campaign's constants)
//! 2. TOML file (`~/.stampcard/config.toml` or an explicit path)
//! 3. Environment override `STAMPCARD_SERVER` for the backend base URL
//!
//! ```toml
//! server = "https://starlitetw.com/"
//! actid = "web_2025_itf_forest"
//! expires_days = 7
//!
//! [qr_codes]
//! h4f9k2w7p1xR = "item_1"
//! z8m3n6v2b9qE = "item_2"
//! a1s7d4f2g9kL = "item_3"
//! p5o8i3u7y2tW = "item_4"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::item::{ItemKey, QrTable, QrTableError};
use crate::store::{StoreKeys, Ttl};

pub const DEFAULT_SERVER: &str = "https://starlitetw.com/";
pub const DEFAULT_ACTID: &str = "web_2025_itf_forest";
pub const DEFAULT_EXPIRES_DAYS: u32 = 7;

/// Environment variable overriding [`CampaignConfig::server`].
pub const SERVER_ENV_VAR: &str = "STAMPCARD_SERVER";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error loading config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid server URL '{value}': {source}")]
    InvalidServer {
        value: String,
        source: url::ParseError,
    },

    #[error("config validation error: {0}")]
    Validation(String),

    #[error("invalid QR table: {0}")]
    QrTable(#[from] QrTableError),
}

pub(crate) fn default_qr_codes() -> BTreeMap<String, ItemKey> {
    [
        ("h4f9k2w7p1xR", ItemKey::Item1),
        ("z8m3n6v2b9qE", ItemKey::Item2),
        ("a1s7d4f2g9kL", ItemKey::Item3),
        ("p5o8i3u7y2tW", ItemKey::Item4),
    ]
    .into_iter()
    .map(|(token, item)| (token.to_string(), item))
    .collect()
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_actid() -> String {
    DEFAULT_ACTID.to_string()
}

fn default_expires_days() -> u32 {
    DEFAULT_EXPIRES_DAYS
}

/// Settings for one stamp-card campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Backend base URL; endpoints are resolved against it.
    #[serde(default = "default_server")]
    pub server: String,

    /// Campaign identifier. Prefixes every store key and is sent when
    /// requesting a token.
    #[serde(default = "default_actid")]
    pub actid: String,

    /// Lifetime in days of each game-state write.
    #[serde(default = "default_expires_days")]
    pub expires_days: u32,

    /// QR payload to item.
    #[serde(default = "default_qr_codes")]
    pub qr_codes: BTreeMap<String, ItemKey>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            actid: default_actid(),
            expires_days: default_expires_days(),
            qr_codes: default_qr_codes(),
        }
    }
}

impl CampaignConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CampaignConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` if given, else `<home>/config.toml` when it exists,
    /// else defaults. Applies the environment override last.
    pub fn load_layered(path: Option<&Path>, home: &Path) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = home.join(CONFIG_FILE);
                if default_path.exists() {
                    Self::load(&default_path)?
                } else {
                    tracing::debug!("no config at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };

        if let Ok(server) = std::env::var(SERVER_ENV_VAR)
            && !server.trim().is_empty()
        {
            tracing::debug!("{SERVER_ENV_VAR} overrides server with {server}");
            config.server = server;
            config.validate()?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actid.trim().is_empty() {
            return Err(ConfigError::Validation("actid must not be empty".to_string()));
        }
        if self.expires_days == 0 {
            return Err(ConfigError::Validation(
                "expires_days must be at least 1".to_string(),
            ));
        }
        self.base_url()?;
        self.qr_table()?;
        Ok(())
    }

    /// Parsed backend base URL. A trailing slash is added so endpoint
    /// joins keep any path prefix.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut value = self.server.trim().to_string();
        if !value.ends_with('/') {
            value.push('/');
        }
        Url::parse(&value).map_err(|source| ConfigError::InvalidServer {
            value: self.server.clone(),
            source,
        })
    }

    pub fn qr_table(&self) -> Result<QrTable, ConfigError> {
        Ok(QrTable::new(
            self.qr_codes
                .iter()
                .map(|(token, item)| (token.clone(), *item)),
        )?)
    }

    pub fn store_keys(&self) -> StoreKeys {
        StoreKeys::new(self.actid.clone())
    }

    pub fn state_ttl(&self) -> Ttl {
        Ttl::Days(self.expires_days)
    }
}

/// Default home directory (`$STAMPCARD_HOME` or `~/.stampcard`).
pub fn default_home() -> std::io::Result<PathBuf> {
    if let Ok(home) = std::env::var("STAMPCARD_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        )
    })?;
    Ok(home.join(".stampcard"))
}
