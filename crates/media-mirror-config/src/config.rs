use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One server endpoint: base URL plus access token.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerEndpoint {
    pub url: String,
    pub token: String,
}

impl ServerEndpoint {
    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty() && !self.token.trim().is_empty()
    }
}

/// Persistent configuration, stored as TOML. Environment variables
/// override the file; command-line flags override both (applied by the
/// CLI). Tokens live here, so the file is written with a warning-free
/// conscience only into the user config directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: Option<ServerEndpoint>,
    #[serde(default)]
    pub destination: Option<ServerEndpoint>,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

fn default_verify_ssl() -> bool {
    true
}

impl Config {
    /// Load from a TOML file; a missing file yields the default config.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config { verify_ssl: true, ..Default::default() });
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Overlay environment variables onto the file-backed values.
    ///
    /// `SRC_PLEX_URL`/`SRC_PLEX_TOKEN` configure the source;
    /// `DEST_PLEX_URL`/`DEST_PLEX_TOKEN` (falling back to
    /// `PLEX_URL`/`PLEX_TOKEN`) configure the destination; `VERIFY_SSL`
    /// accepts the usual falsy spellings.
    pub fn apply_env(&mut self) {
        let source_url = std::env::var("SRC_PLEX_URL").ok();
        let source_token = std::env::var("SRC_PLEX_TOKEN").ok();
        if source_url.is_some() || source_token.is_some() {
            let endpoint = self.source.get_or_insert_with(ServerEndpoint::default);
            if let Some(url) = source_url {
                endpoint.url = url;
            }
            if let Some(token) = source_token {
                endpoint.token = token;
            }
        }

        let dest_url = std::env::var("DEST_PLEX_URL")
            .or_else(|_| std::env::var("PLEX_URL"))
            .ok();
        let dest_token = std::env::var("DEST_PLEX_TOKEN")
            .or_else(|_| std::env::var("PLEX_TOKEN"))
            .ok();
        if dest_url.is_some() || dest_token.is_some() {
            let endpoint = self.destination.get_or_insert_with(ServerEndpoint::default);
            if let Some(url) = dest_url {
                endpoint.url = url;
            }
            if let Some(token) = dest_token {
                endpoint.token = token;
            }
        }

        if let Ok(value) = std::env::var("VERIFY_SSL") {
            self.verify_ssl = !matches!(value.to_lowercase().as_str(), "0" | "false" | "no");
        }
    }
}

/// Token display form for `config show`: enough to recognize, not enough
/// to leak.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        "<unset>".to_string()
    } else if token.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", &token[..4])
    }
}
