//! Loads the solver's `Config` (spec.md sec 6) from a file path using the
//! `config` crate, which sniffs the format from the file extension
//! (`.yaml`/`.yml`/`.json`/`.toml` all work; the flat document in
//! spec.md sec 6 is written as YAML in practice).

use anyhow::Context;
use config::{Config as ConfigSource, File};
use dg_core::Config;
use std::path::Path;

pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let source = ConfigSource::builder()
        .add_source(File::from(path))
        .build()
        .with_context(|| format!("loading config file {}", path.display()))?;
    let config: Config = source
        .try_deserialize()
        .with_context(|| format!("deserializing config file {}", path.display()))?;
    config.validate().context("config validation failed")?;
    Ok(config)
}
