use std::collections::HashMap;
use std::net::SocketAddr;

use anyhow::{Context, Result};

/// Environment key prefix for per-bot credentials, e.g. `BOT_TOKEN_NEWS`.
const TOKEN_PREFIX: &str = "BOT_TOKEN_";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub allowed_origin: String,
    pub telegram_api_base: String,
    pub credentials: CredentialStore,
}

impl Config {
    /// Build the full configuration from process environment variables.
    ///
    /// Recognized variables:
    /// - `RELAY_LISTEN_ADDR` (default `0.0.0.0:8080`)
    /// - `RELAY_ALLOWED_ORIGIN` (default `*`)
    /// - `TELEGRAM_API_BASE` (default `https://api.telegram.org`)
    /// - `BOT_TOKEN_<NAME>` — one secret per configured bot
    pub fn from_env() -> Result<Self> {
        let addr = env_or("RELAY_LISTEN_ADDR", default_listen_addr());
        let listen_addr = addr
            .parse()
            .with_context(|| format!("Invalid RELAY_LISTEN_ADDR: {addr}"))?;

        Ok(Self {
            listen_addr,
            allowed_origin: env_or("RELAY_ALLOWED_ORIGIN", default_allowed_origin()),
            telegram_api_base: env_or("TELEGRAM_API_BASE", default_api_base()),
            credentials: CredentialStore::from_env(),
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

/// Read-only mapping from bot name to its secret token.
///
/// Snapshotted once at startup from `BOT_TOKEN_*` environment variables and
/// never mutated afterwards, so it is safe to share across concurrent
/// requests. Tests construct one directly via [`CredentialStore::from_vars`].
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    tokens: HashMap<String, String>,
}

impl CredentialStore {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a store from arbitrary key/value pairs, keeping only entries
    /// whose key carries the `BOT_TOKEN_` prefix and a non-empty value.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let tokens = vars
            .into_iter()
            .filter(|(key, value)| key.starts_with(TOKEN_PREFIX) && !value.is_empty())
            .collect();
        Self { tokens }
    }

    /// Resolve the token for a bot name. The name is normalized to uppercase,
    /// so `news` and `NEWS` resolve to the same `BOT_TOKEN_NEWS` entry.
    pub fn token_for(&self, bot_name: &str) -> Option<&str> {
        let key = format!("{TOKEN_PREFIX}{}", bot_name.to_uppercase());
        self.tokens.get(&key).map(String::as_str)
    }

    /// Configured bot names (prefix stripped), for startup logging.
    pub fn bot_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tokens
            .keys()
            .filter_map(|key| key.strip_prefix(TOKEN_PREFIX))
            .collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
