//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "AKASHGEN_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub timeouts: TimeoutConfig,
    pub polling: PollingConfig,
    pub admission: AdmissionConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long admitted requests may keep running after a shutdown signal
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6571
}

fn default_shutdown_grace() -> u64 {
    default_max_poll_duration() + default_generate_timeout() + default_image_fetch_timeout()
}

/// Upstream generation service endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_generate_url")]
    pub generate_url: String,
    #[serde(default = "default_status_url")]
    pub status_url: String,
    #[serde(default = "default_image_base")]
    pub image_base: String,
    /// Hardware preference sent with every submission, in priority order
    #[serde(default = "default_preferred_gpus")]
    pub preferred_gpus: Vec<String>,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_quality")]
    pub image_quality: u32,
}

fn default_generate_url() -> String {
    "https://gen.akash.network/api/generate".to_string()
}

fn default_status_url() -> String {
    "https://gen.akash.network/api/status".to_string()
}

fn default_image_base() -> String {
    "https://gen.akash.network".to_string()
}

fn default_preferred_gpus() -> Vec<String> {
    ["RTX4090", "A10", "A100", "V100-32Gi", "H100"]
        .iter()
        .map(|gpu| gpu.to_string())
        .collect()
}

fn default_image_width() -> u32 {
    2048
}

fn default_image_quality() -> u32 {
    100
}

/// Per-phase network timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_generate_timeout")]
    pub generate_secs: u64,
    #[serde(default = "default_status_timeout")]
    pub status_secs: u64,
    #[serde(default = "default_image_fetch_timeout")]
    pub image_fetch_secs: u64,
}

fn default_generate_timeout() -> u64 {
    30
}

fn default_status_timeout() -> u64 {
    10
}

fn default_image_fetch_timeout() -> u64 {
    30
}

/// Job polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_max_poll_duration")]
    pub max_duration_secs: u64,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_poll_duration() -> u64 {
    300
}

/// Admission gate configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl TimeoutConfig {
    pub fn generate(&self) -> Duration {
        Duration::from_secs(self.generate_secs)
    }

    pub fn status(&self) -> Duration {
        Duration::from_secs(self.status_secs)
    }

    pub fn image_fetch(&self) -> Duration {
        Duration::from_secs(self.image_fetch_secs)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

impl Settings {
    /// Load settings from the configuration file and environment variables.
    ///
    /// The file defaults to `config/default.toml` and may be redirected with
    /// `AKASHGEN_CONFIG`. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_str().ok_or_else(|| {
            AppError::Config(config::ConfigError::Message(
                "Configuration path is not valid UTF-8".to_string(),
            ))
        })?;

        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.shutdown_grace_secs", default_shutdown_grace() as i64)?
            .set_default("upstream.generate_url", default_generate_url())?
            .set_default("upstream.status_url", default_status_url())?
            .set_default("upstream.image_base", default_image_base())?
            .set_default("upstream.preferred_gpus", default_preferred_gpus())?
            .set_default("upstream.image_width", default_image_width() as i64)?
            .set_default("upstream.image_quality", default_image_quality() as i64)?
            .set_default("timeouts.generate_secs", default_generate_timeout() as i64)?
            .set_default("timeouts.status_secs", default_status_timeout() as i64)?
            .set_default("timeouts.image_fetch_secs", default_image_fetch_timeout() as i64)?
            .set_default("polling.interval_ms", default_poll_interval() as i64)?
            .set_default("polling.max_duration_secs", default_max_poll_duration() as i64)?
            .set_default("admission.max_concurrent", default_max_concurrent() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(File::with_name(path).required(false))
            // Override with environment variables (prefixed with AKASHGEN__)
            .add_source(
                Environment::with_prefix("AKASHGEN")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upstream.preferred_gpus")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.admission.max_concurrent == 0 {
            return Err(invalid("admission.max_concurrent must be at least 1"));
        }

        if self.polling.interval_ms == 0 {
            return Err(invalid("polling.interval_ms must be greater than 0"));
        }

        if self.polling.max_duration_secs == 0 {
            return Err(invalid("polling.max_duration_secs must be greater than 0"));
        }

        if self.upstream.preferred_gpus.is_empty() {
            return Err(invalid("upstream.preferred_gpus cannot be empty"));
        }

        for (key, url) in [
            ("upstream.generate_url", &self.upstream.generate_url),
            ("upstream.status_url", &self.upstream.status_url),
            ("upstream.image_base", &self.upstream.image_base),
        ] {
            if let Err(e) = reqwest::Url::parse(url) {
                return Err(invalid(&format!("{key} '{url}' is not a valid URL: {e}")));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                shutdown_grace_secs: default_shutdown_grace(),
            },
            upstream: UpstreamConfig {
                generate_url: default_generate_url(),
                status_url: default_status_url(),
                image_base: default_image_base(),
                preferred_gpus: default_preferred_gpus(),
                image_width: default_image_width(),
                image_quality: default_image_quality(),
            },
            timeouts: TimeoutConfig {
                generate_secs: default_generate_timeout(),
                status_secs: default_status_timeout(),
                image_fetch_secs: default_image_fetch_timeout(),
            },
            polling: PollingConfig {
                interval_ms: default_poll_interval(),
                max_duration_secs: default_max_poll_duration(),
            },
            admission: AdmissionConfig {
                max_concurrent: default_max_concurrent(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
