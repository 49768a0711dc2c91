use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE_PATH: &str = "flowchat.toml";
const DEFAULT_MAX_DISPATCH_STEPS: usize = 256;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where flow and tree snapshots are stored.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Model requested from the generation service.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Longest chain of steps dispatched without waiting for generation.
    #[serde(default = "default_max_dispatch_steps")]
    pub max_dispatch_steps: usize,
}

fn default_max_dispatch_steps() -> usize {
    DEFAULT_MAX_DISPATCH_STEPS
}

fn flowchat_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".flowchat")
}

fn flowchat_config_json_path() -> PathBuf {
    flowchat_dir().join("config.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            model: None,
            max_output_tokens: None,
            max_dispatch_steps: DEFAULT_MAX_DISPATCH_STEPS,
        }
    }
}

impl Config {
    /// Loads `~/.flowchat/config.json`, falling back to `./flowchat.toml`, then
    /// applies environment overrides. Unreadable files are skipped.
    pub fn new() -> Self {
        let mut config = Config::default();

        let json_path = flowchat_config_json_path();
        let mut loaded = false;
        if json_path.exists() {
            match Self::load_file(&json_path) {
                Ok(file_config) => {
                    config = file_config;
                    loaded = true;
                }
                Err(error) => tracing::warn!("Ignoring config: {}", error),
            }
        }

        if !loaded && Path::new(CONFIG_FILE_PATH).exists() {
            match Self::load_file(Path::new(CONFIG_FILE_PATH)) {
                Ok(file_config) => config = file_config,
                Err(error) => tracing::warn!("Ignoring config: {}", error),
            }
        }

        config.apply_env();
        config
    }

    /// Loads an explicit config file (JSON or TOML by extension) plus environment
    /// overrides, reporting errors instead of skipping the file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.apply_env();
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else {
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    fn apply_env(&mut self) {
        if let Ok(data_dir) = std::env::var("FLOWCHAT_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(data_dir));
        }
        if let Ok(model) = std::env::var("FLOWCHAT_MODEL") {
            self.model = Some(model);
        }
        if let Some(tokens) = parse_env("FLOWCHAT_MAX_OUTPUT_TOKENS") {
            self.max_output_tokens = Some(tokens);
        }
        if let Some(steps) = parse_env("FLOWCHAT_MAX_DISPATCH_STEPS") {
            self.max_dispatch_steps = steps;
        }
    }

    /// Data directory, defaulting to `~/.flowchat/data`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| flowchat_dir().join("data"))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring {}: not a number ({:?})", name, value);
            None
        }
    }
}
