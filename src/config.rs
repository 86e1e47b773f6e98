//! Configuration management for the prediction server

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `PREDICTION_SERVER__SERVER__PORT`
pub const ENV_PREFIX: &str = "PREDICTION_SERVER";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Model store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing model artifacts
    pub models_dir: String,
    /// Number of threads for native booster inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Static frontend served on unmatched GET paths
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontendConfig {
    /// Directory holding `index.html` and assets; unset disables the frontend
    pub dir: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries; 0 disables them
    pub report_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from `config/default.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_with(None::<PathBuf>)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(Some(path))
    }

    /// Defaults, then `config/default.toml` if present, then `path` (which
    /// must exist when given), then environment variables
    fn load_with<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("models.models_dir", "models")?
            .set_default("models.onnx_threads", 1)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("metrics.report_interval_secs", 60)?
            .add_source(File::with_name("config/default").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Socket address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                onnx_threads: 1,
            },
            frontend: FrontendConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
        }
    }
}
