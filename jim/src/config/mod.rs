use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output format of the log backend installed by [`crate::logger::init`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    #[serde(alias = "PLAIN", alias = "Plain")]
    Plain,
    #[serde(alias = "JSON", alias = "Json")]
    Json,
}

/// Engine settings.
///
/// Every field has a default, so a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log each route as it is registered.
    pub log_routes: bool,
    /// Turn panicking handlers into `500` responses instead of unwinding.
    ///
    /// With `false` a panic in a handler unwinds out of `Engine::serve` into the
    /// caller's task, so the request gets no response unless a
    /// [`crate::middleware::recovery`] step wraps the chain. Errors returned by
    /// handlers are still answered with `500`.
    pub recover_panics: bool,
    pub log_format: LogFormat,
    /// `env_logger` filter directives, e.g. `info` or `jim=debug`.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_routes: true,
            recover_panics: true,
            log_format: LogFormat::Plain,
            log_filter: String::from("info"),
        }
    }
}

impl EngineConfig {
    /// Loads the config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        FileConfigProvider::new(path).load()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::parse)
    }
}

pub trait ConfigProvider<C>
where
    C: Default + DeserializeOwned,
{
    fn load(&self) -> Result<C, ConfigError>;
}

/// Reads a JSON config from disk.
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl<C> ConfigProvider<C> for FileConfigProvider
where
    C: Default + DeserializeOwned,
{
    fn load(&self) -> Result<C, ConfigError> {
        let file = File::open(&self.path).map_err(|e| ConfigError::read(&self.path, e))?;
        serde_json::from_reader(file).map_err(ConfigError::parse)
    }
}

/// Hands out a config built in code.
pub struct ProgrammaticConfigProvider<C> {
    pub config: C,
}

impl<C> ConfigProvider<C> for ProgrammaticConfigProvider<C>
where
    C: Default + DeserializeOwned + Clone,
{
    fn load(&self) -> Result<C, ConfigError> {
        Ok(self.config.clone())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}'.")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config.")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not install logger. {message}")]
    Logger { message: String },
}

impl ConfigError {
    #[inline]
    pub(crate) fn read(path: &Path, err: std::io::Error) -> Self {
        Self::Read {
            path: path.display().to_string(),
            source: err,
        }
    }

    #[inline]
    pub(crate) const fn parse(err: serde_json::Error) -> Self {
        Self::Parse { source: err }
    }

    #[inline]
    pub(crate) fn logger(msg: impl Into<String>) -> Self {
        Self::Logger {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.log_routes);
        assert!(config.recover_panics);
        assert_eq!(config.log_format, LogFormat::Plain);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"log_format": "json", "log_routes": false}"#).unwrap();
        assert!(!config.log_routes);
        assert!(config.recover_panics);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_filter, "info");

        let config = EngineConfig::from_json(r#"{"log_format": "JSON"}"#).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_json() {
        let err = EngineConfig::from_json(r#"{"log_routes": "yes"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("jim-config-{}.json", Uuid::new_v4()));
        let mut file = File::create(&path).unwrap();
        file.write_all(br#"{"recover_panics": false, "log_filter": "jim=trace"}"#)
            .unwrap();
        drop(file);

        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!config.recover_panics);
        assert_eq!(config.log_filter, "jim=trace");
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join(format!("jim-missing-{}.json", Uuid::new_v4()));
        let err = EngineConfig::load(&path).unwrap_err();
        match err {
            ConfigError::Read { path: reported, .. } => {
                assert_eq!(reported, path.display().to_string())
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_programmatic_provider() {
        let provider = ProgrammaticConfigProvider {
            config: EngineConfig {
                log_routes: false,
                ..EngineConfig::default()
            },
        };
        let config: EngineConfig = provider.load().unwrap();
        assert!(!config.log_routes);
    }
}
