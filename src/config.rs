use crate::types::JoinLevel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub map: MapConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Boundary geometry, .shp or .geojson
    pub boundaries: PathBuf,
    pub data_csv: PathBuf,
    /// CSV column holding the region identifier to join on
    pub key_column: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub variable: String,
    pub join: JoinLevel,
    pub title: String,
    pub caption: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
