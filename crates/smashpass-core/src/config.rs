// Configuration loading and parsing (config/smashpass.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::session::SessionSettings;

/// Contents of `defaults/smashpass.toml`, written to `config/` on first run.
pub const DEFAULT_CONFIG: &str = include_str!("../../../defaults/smashpass.toml");

const CONFIG_FILE: &str = "smashpass.toml";

/// The game route only answers with JSON when `_data` names its loader;
/// without it the server renders HTML.
pub const DEFAULT_FEED_PATH: &str = "/game?_data=routes/game";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to write default config: {message}")]
    DefaultsWriteError { message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub game: GameConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_feed_path")]
    pub feed_path: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_prefetch_margin")]
    pub prefetch_margin: usize,
}

fn default_feed_path() -> String {
    DEFAULT_FEED_PATH.to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_page_size() -> u32 {
    10
}

fn default_prefetch_margin() -> usize {
    crate::feed::DEFAULT_PREFETCH_MARGIN
}

impl Config {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            page_size: self.game.page_size,
            prefetch_margin: self.game.prefetch_margin,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/smashpass.toml` relative to `base_dir`.
///
/// Does not create missing files; see [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::FileNotFound { path: path.clone() })?;
    let config = parse_config(&text, &path)?;
    validate(&config)?;
    Ok(config)
}

/// Write the built-in defaults to `config/smashpass.toml` if it is missing.
/// Returns the path written, or `None` when a config already existed.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsWriteError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let target = config_dir.join(CONFIG_FILE);
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, DEFAULT_CONFIG.as_bytes()).map_err(|e| {
                ConfigError::DefaultsWriteError {
                    message: format!("failed to write {}: {e}", target.display()),
                }
            })?;
            Ok(Some(target))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(ConfigError::DefaultsWriteError {
            message: format!("failed to create {}: {e}", target.display()),
        }),
    }
}

/// Convenience wrapper: loads config relative to the current working
/// directory, writing the defaults first if needed.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let url = &config.backend.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "backend.base_url".into(),
            message: format!("must start with http:// or https://, got {url:?}"),
        });
    }

    if !config.backend.feed_path.starts_with('/') {
        return Err(ConfigError::ValidationError {
            field: "backend.feed_path".into(),
            message: "must start with '/'".into(),
        });
    }

    if config.backend.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "backend.request_timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.game.page_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "game.page_size".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.game.prefetch_margin == 0 {
        return Err(ConfigError::ValidationError {
            field: "game.prefetch_margin".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}
