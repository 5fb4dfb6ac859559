//! Configuration loading from relay.toml.

use crate::relay::Dialect;
use mcp::ProviderCommand;
use runtime::GeminiBackend;
use runtime::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

/// Top-level configuration. Every field has a default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    pub provider: ProviderConfig,
    pub server: ServerSection,
}

/// Language model settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub system: Option<String>,
    pub base_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            system: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// How to launch the tool provider.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Bare names are looked up next to the running executable, then on `PATH`.
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: "car-value".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            request_timeout_secs: None,
        }
    }
}

/// WebSocket server settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub dialect: Dialect,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            dialect: Dialect::Json,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `explicit` if given, else `relay.toml` if present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let var = &self.model.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey { var: var.clone() }),
        }
    }

    /// Build the model backend.
    pub fn backend(&self) -> Result<GeminiBackend, ConfigError> {
        Ok(GeminiBackend::builder(self.api_key()?)
            .model(&self.model.name)
            .base_url(&self.model.base_url)
            .build())
    }

    /// Build the provider launch command.
    pub fn provider_command(&self) -> ProviderCommand {
        let provider = &self.provider;
        let program = resolve_program(&provider.command, sibling_dir().as_deref());

        let mut command = ProviderCommand::new(program).args(provider.args.iter().cloned());
        for (key, value) in &provider.env {
            command = command.env(key, value);
        }
        if let Some(secs) = provider.request_timeout_secs {
            command = command.request_timeout(Duration::from_secs(secs));
        }
        command
    }
}

fn sibling_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()?
        .parent()
        .map(Path::to_path_buf)
}

/// Prefer an executable named `command` in `dir` when `command` is a bare name.
fn resolve_program(command: &str, dir: Option<&Path>) -> String {
    if Path::new(command).components().count() != 1 {
        return command.to_string();
    }
    let Some(dir) = dir else {
        return command.to_string();
    };
    let candidate = dir.join(format!("{command}{}", std::env::consts::EXE_SUFFIX));
    if candidate.is_file() {
        candidate.to_string_lossy().into_owned()
    } else {
        command.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set the {var} environment variable")]
    MissingApiKey { var: String },
}
