use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::ledger::DEFAULT_API_ADDR;

/// Optional settings file. Every field can also be given on the command
/// line, which takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// host:port (or URL) of the walrus server
    pub api_addr: Option<String>,
    /// sign with a seed instead of a hardware device
    pub hot: Option<bool>,
    /// change address used when a command is not given `--change`
    pub change_address: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        tracing::info!("Config file {:?}", path);
        let file = File::open(path)
            .with_context(|| format!("Cannot read config file {path}", path = path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("Cannot parse config file {path}", path = path.display()))
    }
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_addr: String,
    pub hot: bool,
    pub change_address: Option<String>,
}

impl Settings {
    pub fn resolve(
        config: Option<Config>,
        api_addr: Option<String>,
        hot: bool,
        change_address: Option<String>,
    ) -> Self {
        let config = config.unwrap_or_default();
        Self {
            api_addr: api_addr
                .or(config.api_addr)
                .unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            hot: hot || config.hot.unwrap_or(false),
            change_address: change_address.or(config.change_address),
        }
    }
}
