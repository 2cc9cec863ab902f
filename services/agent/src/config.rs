use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Assembled once in `main` and passed explicitly to every component that
/// needs it; nothing reads the environment after this point.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub progress_service_url: String,
    pub room_admin_url: String,
    pub room_admin_token: Option<String>,
    pub openai_api_key: String,
    pub chat_model: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let progress_service_url = std::env::var("PROGRESS_SERVICE_URL")
            .map_err(|_| ConfigError::MissingVar("PROGRESS_SERVICE_URL".to_string()))?;

        let room_admin_url = std::env::var("ROOM_ADMIN_URL")
            .map_err(|_| ConfigError::MissingVar("ROOM_ADMIN_URL".to_string()))?;
        let room_admin_token = std::env::var("ROOM_ADMIN_TOKEN").ok();

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            progress_service_url,
            room_admin_url,
            room_admin_token,
            openai_api_key,
            chat_model,
            log_level,
        })
    }
}
