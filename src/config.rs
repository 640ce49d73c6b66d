//! Engine-wide defaults.
//!
//! One [`EngineConfig`] is built at startup (or loaded from a JSON file) and
//! handed to every test as an `Arc`; the request compiler never reads global
//! state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = concat!("checkman/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const MAX_REDIRECTS: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config file `{path}`: {reason}")]
    Parse { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub user_agent: String,
    pub accept: String,
    pub timeout_ms: u64,
    /// Upper bound on followed redirects, clamped to [`MAX_REDIRECTS`].
    pub max_redirects: usize,
    pub verify_ssl: bool,
    pub proxy_url: Option<String>,
    /// Added to every request that does not set the header itself.
    pub default_headers: BTreeMap<String, String>,
    /// Seed for `{{RANDOM ...}}` placeholders; entropy when unset.
    pub random_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_redirects: MAX_REDIRECTS,
            verify_ssl: true,
            proxy_url: None,
            default_headers: BTreeMap::new(),
            random_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn redirect_limit(&self) -> usize {
        self.max_redirects.min(MAX_REDIRECTS)
    }
}
