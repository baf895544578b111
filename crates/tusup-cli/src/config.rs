//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use tusup_client::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
use tusup_core::ByteSize;
use tusup_store::StoreKind;

/// Global configuration for tusup
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub upload: UploadSection,
    pub store: StoreSection,
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub chunk_size: ByteSize,
    pub min_chunk_size: ByteSize,
    /// `Name: Value` lines; a value of `${VAR}` is read from the environment
    #[serde(deserialize_with = "deserialize_headers")]
    pub headers: Vec<String>,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            chunk_size: ByteSize::new(DEFAULT_CHUNK_SIZE),
            min_chunk_size: ByteSize::new(MIN_CHUNK_SIZE),
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub kind: StoreKind,
    /// Defaults to `resume.db` in the user config directory
    pub path: Option<PathBuf>,
}

impl StoreSection {
    pub fn path_or_default(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_store_path)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Seconds
    pub connect_timeout: u64,
    /// Seconds, per request (one chunk must go through within this)
    pub request_timeout: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        let defaults = tusup_core::HttpConfig::default();
        Self {
            connect_timeout: defaults.connect_timeout.as_secs(),
            request_timeout: defaults.request_timeout.as_secs(),
        }
    }
}

impl HttpSection {
    pub fn to_http_config(self) -> tusup_core::HttpConfig {
        tusup_core::HttpConfig {
            connect_timeout: std::time::Duration::from_secs(self.connect_timeout),
            request_timeout: std::time::Duration::from_secs(self.request_timeout),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "tusup")
}

/// `<user config dir>/tusup/resume.db`, or `./tusup-resume.db` when the
/// platform has no home directory.
pub fn default_store_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("resume.db"))
        .unwrap_or_else(|| PathBuf::from("tusup-resume.db"))
}

/// Deserialize header lines, expanding `${VAR}` values. Lines whose
/// variable is unset are dropped.
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let lines: Vec<String> = Vec::deserialize(deserializer)?;
    Ok(lines
        .into_iter()
        .filter_map(|line| {
            let expanded = expand_header(&line);
            if expanded.is_none() {
                log::warn!("Skipping header {line:?}: environment variable not set");
            }
            expanded
        })
        .collect())
}

/// Expand a `Name: ${VAR}` header line. Lines without a colon are kept
/// as-is so header parsing reports them.
fn expand_header(line: &str) -> Option<String> {
    match line.split_once(':') {
        Some((name, value)) => {
            let value = expand_env_var(value.trim())?;
            Some(format!("{}: {value}", name.trim()))
        }
        None => Some(line.to_string()),
    }
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./tusup.toml (current directory)
    /// 2. ~/.config/tusup/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("tusup.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(dirs) = project_dirs() {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
