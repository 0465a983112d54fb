//! Tool configuration and tracing setup shared by the jarsmith binaries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Once;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::prelude::*;

/// Environment variable naming a config file when `--tool-config` is absent.
pub const CONFIG_ENV_VAR: &str = "JARSMITH_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or an `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level with `RUST_LOG` merged in.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    /// Named pattern lists usable with `selector --config=<name>`.
    #[serde(default)]
    pub presets: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConverterConfig {
    #[serde(default = "ConverterConfig::default_wrapped_prefixes")]
    pub wrapped_prefixes: Vec<String>,
    #[serde(default = "ConverterConfig::default_wrapper_namespace")]
    pub wrapper_namespace: String,
}

impl ConverterConfig {
    fn default_wrapped_prefixes() -> Vec<String> {
        jarsmith_remap::WRAPPED_PREFIXES
            .iter()
            .map(|prefix| prefix.to_string())
            .collect()
    }

    fn default_wrapper_namespace() -> String {
        jarsmith_remap::WRAPPER_NAMESPACE.to_owned()
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            wrapped_prefixes: Self::default_wrapped_prefixes(),
            wrapper_namespace: Self::default_wrapper_namespace(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    #[serde(default = "GeneratorConfig::default_package_prefixes")]
    pub package_prefixes: Vec<String>,
}

impl GeneratorConfig {
    fn default_package_prefixes() -> Vec<String> {
        jarsmith_classfile::JDK_PACKAGE_PREFIXES
            .iter()
            .map(|prefix| prefix.to_string())
            .collect()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            package_prefixes: Self::default_package_prefixes(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` for `toml::de::Error` quotes the offending source line;
        // only the message is kept.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl ToolConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads the file named by `explicit` or [`CONFIG_ENV_VAR`]; defaults
    /// when neither is set.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path(explicit) {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }
}

pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CONFIG_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

static TRACING_INIT: Once = Once::new();

/// Installs the global subscriber, writing to stderr. Later calls are no-ops.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        };
        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!(
                target: "jarsmith.config",
                level = %config.level,
                json = config.json,
                "tracing initialized"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_directives_are_normalized() {
        assert_eq!(
            LoggingConfig::normalize_level_directives(" WARNING "),
            "warn"
        );
        assert_eq!(LoggingConfig::normalize_level_directives(""), "info");
        assert_eq!(
            LoggingConfig::normalize_level_directives("jarsmith.remap=trace"),
            "jarsmith.remap=trace"
        );
    }
}
