use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "romdeck.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Candidate storage roots; the first one is active at startup.
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_roms_dir")]
    pub roms_dir: String,
    /// Platform slug to on-device directory name.
    #[serde(default)]
    pub platforms: BTreeMap<String, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            roms_dir: default_roms_dir(),
            platforms: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    /// Rows per page; derived from the terminal height when unset.
    pub page_size: Option<usize>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { frame_ms: default_frame_ms(), page_size: None }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("romdeck.log")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/mnt/mmc"), PathBuf::from("/mnt/sdcard")]
}

fn default_roms_dir() -> String {
    "ROMS".to_string()
}

fn default_frame_ms() -> u64 {
    33
}

impl Config {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Applies `ROMM_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ROMM_HOST") {
            self.server.host = host;
        }
        if let Some(user) = lookup("ROMM_USERNAME") {
            self.server.username = user;
        }
        if let Some(pass) = lookup("ROMM_PASSWORD") {
            self.server.password = pass;
        }
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        Ok(self)
    }
}

/// Picks the config path: explicit argument, then the working directory,
/// then the user config dir.
pub fn locate_config(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("romdeck").join(DEFAULT_CONFIG_FILE))
        .filter(|p| p.exists())
        .unwrap_or(local)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Config::parse(&content, path)?
    } else {
        Config::parse("", path)?
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()
}
