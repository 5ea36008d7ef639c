use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_SETTINGS_FILE: &str = "heritage";
const ENV_PREFIX: &str = "HERITAGE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DesktopSettings {
    pub contract_url: String,
    pub wallet_key_path: PathBuf,
    pub log_filter: String,
    pub simulation_delay_ms: u64,
    pub watch_interval_secs: u64,
}

/// Command-line values that win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub contract_url: Option<String>,
    pub wallet_key_path: Option<PathBuf>,
    pub simulation_delay_ms: Option<u64>,
}

/// Defaults, then `heritage.toml` (or `file`), then `HERITAGE__*` env.
pub fn load_settings(file: Option<&Path>, overrides: &Overrides) -> Result<DesktopSettings> {
    let environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__");
    build_settings(file, environment, overrides)
}

pub(crate) fn build_settings(
    file: Option<&Path>,
    environment: Environment,
    overrides: &Overrides,
) -> Result<DesktopSettings> {
    let file_source = match file {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
    };

    let mut builder = Config::builder()
        .set_default("contract_url", "http://127.0.0.1:8545/")?
        .set_default("wallet_key_path", "./data/wallet.key")?
        .set_default("log_filter", "info")?
        .set_default("simulation_delay_ms", 3000_i64)?
        .set_default("watch_interval_secs", 5_i64)?
        .add_source(file_source)
        .add_source(environment);

    if let Some(url) = &overrides.contract_url {
        builder = builder.set_override("contract_url", url.as_str())?;
    }
    if let Some(path) = &overrides.wallet_key_path {
        builder = builder.set_override("wallet_key_path", path.to_string_lossy().as_ref())?;
    }
    if let Some(delay) = overrides.simulation_delay_ms {
        let delay = i64::try_from(delay).context("simulation delay is too large")?;
        builder = builder.set_override("simulation_delay_ms", delay)?;
    }

    builder
        .build()
        .context("failed to load desktop settings")?
        .try_deserialize()
        .context("invalid desktop settings")
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
