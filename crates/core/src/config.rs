use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::lecture::LectureId;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub documents: DocumentsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    /// Milliseconds a connection waits on a locked database before giving
    /// up. The workflow transactions hold short write locks, so waiting
    /// beats surfacing SQLITE_BUSY to an approval tier.
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Private in-memory database: one connection, so every handle sees
    /// the same data. Used by the test suites.
    pub fn ephemeral() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocumentsConfig {
    /// Prefix of the opaque object keys recorded on leave documents. The
    /// document store owns the key format beyond this prefix.
    pub key_prefix: String,
}

impl DocumentsConfig {
    pub fn leave_document_key(&self, display_name: &str, lecture_id: &LectureId) -> String {
        format!("{}/{}/{}.pdf", self.key_prefix, display_name, lecture_id.0)
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub documents_key_prefix: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://classcover.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                busy_timeout_ms: 5_000,
            },
            documents: DocumentsConfig { key_prefix: "leaves".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabase>,
    documents: Option<FileDocuments>,
    logging: Option<FileLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDocuments {
    key_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

const DEFAULT_CONFIG_PATH: &str = "classcover.toml";

impl AppConfig {
    /// Layered load: defaults, then the TOML file (when present), then
    /// `CLASSCOVER_*` environment variables, then explicit overrides.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = options.config_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let file: FileConfig = toml::from_str(&raw)
                    .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
                config.apply_file(file);
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        }

        config.apply_env()?;
        config.apply_overrides(&options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
            if let Some(busy_timeout_ms) = database.busy_timeout_ms {
                self.database.busy_timeout_ms = busy_timeout_ms;
            }
        }
        if let Some(documents) = file.documents {
            if let Some(key_prefix) = documents.key_prefix {
                self.documents.key_prefix = key_prefix;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("CLASSCOVER_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(value) = env::var("CLASSCOVER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "CLASSCOVER_DATABASE_MAX_CONNECTIONS".to_string(),
                    value,
                }
            })?;
        }
        if let Ok(value) = env::var("CLASSCOVER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "CLASSCOVER_DATABASE_TIMEOUT_SECS".to_string(),
                    value,
                }
            })?;
        }
        if let Ok(value) = env::var("CLASSCOVER_DATABASE_BUSY_TIMEOUT_MS") {
            self.database.busy_timeout_ms = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "CLASSCOVER_DATABASE_BUSY_TIMEOUT_MS".to_string(),
                    value,
                }
            })?;
        }
        if let Ok(prefix) = env::var("CLASSCOVER_DOCUMENTS_KEY_PREFIX") {
            self.documents.key_prefix = prefix;
        }
        if let Ok(level) = env::var("CLASSCOVER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(value) = env::var("CLASSCOVER_LOG_FORMAT") {
            self.logging.format = match value.as_str() {
                "compact" => LogFormat::Compact,
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidEnvOverride {
                        key: "CLASSCOVER_LOG_FORMAT".to_string(),
                        value,
                    })
                }
            };
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.database_url {
            self.database.url = url.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(prefix) = &overrides.documents_key_prefix {
            self.documents.key_prefix = prefix.clone();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.documents.key_prefix.trim().is_empty() || self.documents.key_prefix.ends_with('/') {
            return Err(ConfigError::Validation(
                "documents.key_prefix must be a non-empty prefix without a trailing slash"
                    .to_string(),
            ));
        }
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {LEVELS:?}, got `{}`",
                self.logging.level
            )));
        }
        Ok(())
    }
}
