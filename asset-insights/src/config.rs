//! Service configuration
//!
//! Two sources, checked explicitly by the caller: environment variables
//! (a `.env` file is honored) or a TOML file under the user config directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Connection settings for the read and write API families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the read (OData) API
    pub read_base_url: String,
    /// Base URL of the write API
    pub write_base_url: String,
    /// Bearer token presented on every request
    pub token: String,
}

impl Config {
    /// Read `INSIGHTS_READ_URL`, `INSIGHTS_WRITE_URL` and `INSIGHTS_TOKEN`
    /// from the environment, loading a `.env` file first when present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            read_base_url: std::env::var("INSIGHTS_READ_URL")
                .context("INSIGHTS_READ_URL is not set")?,
            write_base_url: std::env::var("INSIGHTS_WRITE_URL")
                .context("INSIGHTS_WRITE_URL is not set")?,
            token: std::env::var("INSIGHTS_TOKEN").context("INSIGHTS_TOKEN is not set")?,
        })
    }

    /// Load from `<config_dir>/asset-insights/config.toml`
    pub fn load() -> Result<Self> {
        let path = Self::default_path().context("could not determine the user config directory")?;
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("asset-insights").join("config.toml"))
    }
}
