//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/gifs.sqlite"
//!
//! [assets]
//! dir = "./gifs"
//!
//! [search]
//! max_matches = 5
//! empty_query = "match_none"   # or "match_all"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! max_matches = 0              # 0 = unlimited
//!
//! [telegram]
//! token = "123:abc"            # or GIFBOT_TELEGRAM_TOKEN
//! service_chat_id = 100200300
//! auth_list = "./auth.txt"
//! proxy = "socks5://127.0.0.1:9050"
//! ```

use anyhow::{bail, Context, Result};
use gifbot_core::fuzzy::EmptyQueryPolicy;
use gifbot_core::search::SearchParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `[telegram].token` is not set.
pub const TOKEN_ENV: &str = "GIFBOT_TELEGRAM_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub assets: AssetsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
    #[serde(default)]
    pub empty_query: EmptyQueryPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_matches: default_max_matches(),
            empty_query: EmptyQueryPolicy::default(),
        }
    }
}

fn default_max_matches() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Result cap for the web front end; `0` means unlimited.
    #[serde(default)]
    pub max_matches: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_matches: 0,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Proxy URL for all Bot API traffic, e.g. `socks5://host:port`.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Chat that receives uploads made on behalf of inline queries.
    pub service_chat_id: i64,
    /// File with one authorized user id per line.
    pub auth_list: PathBuf,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_poll_timeout() -> u64 {
    60
}

impl TelegramConfig {
    /// The bot token from config, falling back to [`TOKEN_ENV`].
    pub fn resolve_token(&self) -> Result<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }
        match std::env::var(TOKEN_ENV) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => bail!(
                "telegram.token is not set and {} is empty or missing",
                TOKEN_ENV
            ),
        }
    }
}

impl Config {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            max_matches: self.search.max_matches,
            empty_query: self.search.empty_query,
        }
    }

    pub fn web_search_params(&self) -> SearchParams {
        SearchParams {
            max_matches: self.server.max_matches,
            empty_query: self.search.empty_query,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        bail!("db.path must not be empty");
    }
    if config.assets.dir.as_os_str().is_empty() {
        bail!("assets.dir must not be empty");
    }

    if let Some(tg) = &config.telegram {
        if tg.service_chat_id <= 0 {
            bail!("telegram.service_chat_id must be > 0");
        }
        if tg.poll_timeout_secs == 0 {
            bail!("telegram.poll_timeout_secs must be > 0");
        }
        if !tg.api_url.starts_with("http://") && !tg.api_url.starts_with("https://") {
            bail!("telegram.api_url must be an http(s) URL");
        }
    }

    Ok(config)
}
