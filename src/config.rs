//! Configuration management for the fuel price inference pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// What to do with a numeric feature that has no observed value in the batch
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllMissingPolicy {
    /// Fail the request with an `EmptyFeature` error
    #[default]
    Fail,
    /// Fill the whole column with 0.0
    Zero,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    pub csv: CsvConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Model store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing one artifact per model id
    pub models_dir: PathBuf,
    /// Artifact file extension
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Number of threads for ONNX inference per session (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Keep loaded artifacts between requests
    #[serde(default)]
    pub cache: bool,
}

fn default_extension() -> String {
    "onnx".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

/// Preprocessing policy
#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessingConfig {
    /// Product the models were trained on; other rows are dropped
    #[serde(default = "default_product")]
    pub product: String,
    /// chrono formats tried in order when parsing `Data da Coleta`
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub all_missing: AllMissingPolicy,
}

fn default_product() -> String {
    "GASOLINA".to_string()
}

fn default_date_formats() -> Vec<String> {
    vec![
        "%d/%m/%Y".to_string(),
        "%Y-%m-%d".to_string(),
        "%Y-%m-%d %H:%M:%S".to_string(),
    ]
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            date_formats: default_date_formats(),
            all_missing: AllMissingPolicy::Fail,
        }
    }
}

/// CSV reading configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    /// Field delimiter (single ASCII character)
    pub delimiter: char,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of requests processed concurrently
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_path(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path, with `FUEL__`-prefixed
    /// environment variables taking precedence (e.g. `FUEL__MODELS__CACHE=true`).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FUEL").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                models_dir: PathBuf::from("trained_models"),
                extension: default_extension(),
                onnx_threads: 1,
                cache: false,
            },
            preprocessing: PreprocessingConfig::default(),
            csv: CsvConfig { delimiter: ';' },
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.models.models_dir, PathBuf::from("trained_models"));
        assert_eq!(config.models.extension, "onnx");
        assert!(!config.models.cache);
        assert_eq!(config.preprocessing.product, "GASOLINA");
        assert_eq!(config.preprocessing.all_missing, AllMissingPolicy::Fail);
        assert_eq!(config.csv.delimiter, ';');
    }

    #[test]
    fn test_load_from_path_applies_field_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[models]
models_dir = "/srv/models"

[preprocessing]
all_missing = "zero"

[csv]
delimiter = ";"

[pipeline]
workers = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.models.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(config.models.extension, "onnx");
        assert_eq!(config.models.onnx_threads, 1);
        assert_eq!(config.preprocessing.product, "GASOLINA");
        assert_eq!(config.preprocessing.date_formats.len(), 3);
        assert_eq!(config.preprocessing.all_missing, AllMissingPolicy::Zero);
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.logging.format, "json");
    }
}
