use eda_core::UploadPolicy;
use reqwest::Url;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;
const DEFAULT_ALLOWED_EXTENSIONS: &str = "csv,xlsx,xls";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base address of the analysis backend.
    pub server_url: Url,
    /// Bound on the upload request. `None` waits indefinitely.
    pub upload_timeout: Option<Duration>,
    pub max_file_size_mb: u64,
    pub allowed_extensions: Vec<String>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let server_url_str =
            std::env::var("EDA_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let server_url = parse_server_url(&server_url_str)
            .map_err(|e| ConfigError::InvalidValue("EDA_SERVER_URL".to_string(), e))?;

        let upload_timeout = match std::env::var("EDA_UPLOAD_TIMEOUT_SECS") {
            Ok(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| {
                        ConfigError::InvalidValue(
                            "EDA_UPLOAD_TIMEOUT_SECS".to_string(),
                            format!("'{}' is not a positive number of seconds", value),
                        )
                    })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let max_file_size_mb = match std::env::var("EDA_MAX_FILE_SIZE_MB") {
            Ok(value) => value.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("EDA_MAX_FILE_SIZE_MB".to_string(), e.to_string())
            })?,
            Err(_) => DEFAULT_MAX_FILE_SIZE_MB,
        };

        let allowed_extensions = std::env::var("EDA_ALLOWED_EXTENSIONS")
            .unwrap_or_else(|_| DEFAULT_ALLOWED_EXTENSIONS.to_string())
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            server_url,
            upload_timeout,
            max_file_size_mb,
            allowed_extensions,
            log_level,
        })
    }

    /// Replaces the server address, e.g. from a command-line flag.
    pub fn with_server_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.server_url = parse_server_url(url)
            .map_err(|e| ConfigError::InvalidValue("--server".to_string(), e))?;
        Ok(self)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::new(
            self.max_file_size_mb.saturating_mul(1024 * 1024),
            &self.allowed_extensions,
        )
    }
}

fn parse_server_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}
