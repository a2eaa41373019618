//! Bootstrap configuration loading and root folder resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the service logs a warning and
//! starts with defaults. A TOML file that exists but fails to parse is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "METER_ROOT_FOLDER";

/// Environment variable overriding the recognition API key
pub const RECOGNITION_API_KEY_ENV: &str = "METER_RECOGNITION_API_KEY";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup. Restart to pick up changes.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder for artifacts and staging files
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Base URL used when building `image_url` values
    ///
    /// Defaults to `http://<bind_address>:<port>` when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Recognition service settings
    #[serde(default)]
    pub recognition: RecognitionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Recognition service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    /// API key (overridden by `METER_RECOGNITION_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name passed to the recognition endpoint
    #[serde(default = "default_model")]
    pub model: String,

    /// Endpoint base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5780
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            bind_address: default_bind_address(),
            public_base_url: None,
            max_upload_bytes: default_max_upload_bytes(),
            recognition: RecognitionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Public base URL with any trailing slash removed
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", self.bind_address, self.port),
        }
    }
}

/// Parse TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    Ok(toml::from_str(content)?)
}

/// Load TOML configuration, falling back to defaults when the file is absent
///
/// Runs before logging is initialized; callers report the outcome.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    parse_toml_config(&content)
}

/// Default configuration file path for the platform
///
/// `<config_dir>/meter/meter-reading.toml`, or `./meter-reading.toml` when
/// the platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("meter").join("meter-reading.toml"))
        .unwrap_or_else(|| PathBuf::from("meter-reading.toml"))
}

/// Root folder resolution: CLI → environment → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("meter"))
        .unwrap_or_else(|| PathBuf::from("./meter_data"))
}

/// Resolve the recognition API key: environment → TOML
///
/// Blank values are treated as unset.
pub fn resolve_recognition_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(RECOGNITION_API_KEY_ENV).ok();
    let toml_key = toml_config.recognition.api_key.clone();

    if let Some(key) = env_key.filter(|k| is_valid_key(k)) {
        info!("Recognition API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key.filter(|k| is_valid_key(k)) {
        info!("Recognition API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "Recognition API key not configured. Set {} or add api_key under [recognition] in the TOML config",
        RECOGNITION_API_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Directory layout under the root folder
#[derive(Debug, Clone)]
pub struct RootFolderLayout {
    root: PathBuf,
}

impl RootFolderLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted image artifacts
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    /// Temporary files released after each request
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// Create the root folder and its subdirectories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.root.clone(), self.artifacts_dir(), self.staging_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!("Created directory {}", dir.display());
            }
        }
        Ok(())
    }
}
