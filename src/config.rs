use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error_reporter::VerbosityLevel;
use crate::options::ValidationOptions;
use crate::output::OutputFormat;
use crate::validator::ValidationConfig as EngineConfig;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationSettings,
    pub queue: QueueSettings,
    pub output: OutputSettings,
}

/// Kind of data a tree holds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationMode {
    /// Plain data tree without type restriction
    #[default]
    Data,
    Config,
    Get,
    GetConfig,
    Edit,
    Filter,
    Rpc,
    RpcReply,
    Notification,
}

impl ValidationMode {
    pub fn options(self) -> ValidationOptions {
        match self {
            ValidationMode::Data => ValidationOptions::empty(),
            ValidationMode::Config => ValidationOptions::CONFIG,
            ValidationMode::Get => ValidationOptions::GET,
            ValidationMode::GetConfig => ValidationOptions::GET_CONFIG,
            ValidationMode::Edit => ValidationOptions::EDIT,
            ValidationMode::Filter => ValidationOptions::FILTER,
            ValidationMode::Rpc => ValidationOptions::RPC,
            ValidationMode::RpcReply => ValidationOptions::RPC_REPLY,
            ValidationMode::Notification => ValidationOptions::NOTIF,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Some(match value.to_lowercase().as_str() {
            "data" => ValidationMode::Data,
            "config" => ValidationMode::Config,
            "get" => ValidationMode::Get,
            "get-config" => ValidationMode::GetConfig,
            "edit" => ValidationMode::Edit,
            "filter" => ValidationMode::Filter,
            "rpc" => ValidationMode::Rpc,
            "rpc-reply" => ValidationMode::RpcReply,
            "notification" => ValidationMode::Notification,
            _ => return None,
        })
    }
}

/// Validation-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationSettings {
    pub mode: ValidationMode,
    /// Reject instances of obsolete definitions
    pub reject_obsolete: bool,
    /// Stop validation on first error
    pub fail_fast: bool,
}

/// Deferred request queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueSettings {
    /// Drop requests whose node was discarded during the pass
    pub prune_stale: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub verbosity: VerbosityLevel,
    /// Upper bound on failures listed in reports
    pub max_reported_failures: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { prune_stale: true }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Human,
            verbosity: VerbosityLevel::Normal,
            max_reported_failures: 50,
        }
    }
}

impl Config {
    /// Options for the validation engine
    pub fn options(&self) -> ValidationOptions {
        let mut options = self.validation.mode.options();
        if self.validation.reject_obsolete {
            options |= ValidationOptions::OBSOLETE;
        }
        options
    }

    /// Configuration for the validation engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fail_fast: self.validation.fail_fast,
            prune_stale_requests: self.queue.prune_stale,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment
    pub fn load_config(path: Option<&Path>) -> Result<Config> {
        Self::load_config_with(&SystemEnvProvider, path)
    }

    pub fn load_config_with(env: &impl EnvProvider, path: Option<&Path>) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = path {
            let file_config = Self::load_from_file(config_path)?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file()? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "validate-datatree.toml",
            "validate-datatree.json",
            ".validate-datatree.toml",
            ".validate-datatree.json",
        ];

        // Check current directory first
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("validate-datatree");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path)?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(mode) = env.get("VALIDATE_DATATREE_MODE") {
            config.validation.mode = ValidationMode::parse(&mode).ok_or_else(|| {
                ConfigError::Environment(format!("Invalid VALIDATE_DATATREE_MODE value: {}", mode))
            })?;
        }

        if let Some(obsolete) = env.get("VALIDATE_DATATREE_OBSOLETE") {
            config.validation.reject_obsolete = parse_env("VALIDATE_DATATREE_OBSOLETE", &obsolete)?;
        }

        if let Some(fail_fast) = env.get("VALIDATE_DATATREE_FAIL_FAST") {
            config.validation.fail_fast = parse_env("VALIDATE_DATATREE_FAIL_FAST", &fail_fast)?;
        }

        if let Some(prune) = env.get("VALIDATE_DATATREE_PRUNE_STALE") {
            config.queue.prune_stale = parse_env("VALIDATE_DATATREE_PRUNE_STALE", &prune)?;
        }

        if let Some(format) = env.get("VALIDATE_DATATREE_FORMAT") {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                "summary" => OutputFormat::Summary,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid VALIDATE_DATATREE_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        if let Some(verbosity) = env.get("VALIDATE_DATATREE_VERBOSITY") {
            config.output.verbosity = match verbosity.to_lowercase().as_str() {
                "quiet" => VerbosityLevel::Quiet,
                "normal" => VerbosityLevel::Normal,
                "verbose" => VerbosityLevel::Verbose,
                "debug" => VerbosityLevel::Debug,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid VALIDATE_DATATREE_VERBOSITY value: {}",
                        verbosity
                    )));
                }
            };
        }

        if let Some(max) = env.get("VALIDATE_DATATREE_MAX_FAILURES") {
            config.output.max_reported_failures = parse_env("VALIDATE_DATATREE_MAX_FAILURES", &max)?;
        }

        Ok(config)
    }

    /// Merge two configurations (second takes precedence)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        base.validation = override_config.validation;
        base.queue = override_config.queue;
        base.output = override_config.output;
        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        let max = config.output.max_reported_failures;
        if max == 0 {
            return Err(ConfigError::Validation(
                "max_reported_failures must be greater than 0".to_string(),
            ));
        }
        if max > 10_000 {
            return Err(ConfigError::Validation(
                "max_reported_failures cannot exceed 10000".to_string(),
            ));
        }

        if config.validation.mode == ValidationMode::Filter && config.validation.reject_obsolete {
            log::warn!("obsolete data checks have no effect on what a filter selects");
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
}
