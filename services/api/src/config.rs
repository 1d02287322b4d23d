use chiron_core::{forwarder::ExecutorEndpoint, speech::SigningConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for lesson generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
    /// Canned lessons, no model calls.
    Mock,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub executor: ExecutorEndpoint,
    pub use_mock_executor: bool,
    pub mock_executor_port: u16,
    pub tts_api_key: Option<String>,
    pub signing: SigningConfig,
    pub expose_error_stack: bool,
    pub log_level: Level,
}

/// Reads a variable, treating an empty value as unset.
fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn bool_var(name: &str, default: bool) -> Result<bool, ConfigError> {
    match var(name).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a boolean", v),
            )),
        },
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = match var("BIND_ADDRESS") {
            Some(addr) => addr,
            None => format!("0.0.0.0:{}", parse_var::<u16>("PORT", 5001)?),
        };
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = var("LESSON_PROVIDER").unwrap_or_else(|| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "mock" => Provider::Mock,
            _ => Provider::Gemini,
        };

        let openai_api_key = var("OPENAI_API_KEY");
        let gemini_api_key = var("GEMINI_API_KEY");

        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| match provider {
            Provider::OpenAI => "gpt-4o".to_string(),
            _ => "gemini-2.0-flash-exp".to_string(),
        });

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
            Provider::Mock => {}
        }

        let mock_executor_port = parse_var::<u16>("MCP_PORT", 9876)?;
        let base_url = var("MCP_URL").unwrap_or_else(|| {
            format!(
                "{}://{}:{}",
                var("MCP_PROTOCOL").unwrap_or_else(|| "http".to_string()),
                var("MCP_HOST").unwrap_or_else(|| "localhost".to_string()),
                mock_executor_port
            )
        });
        let mut executor = ExecutorEndpoint::new(base_url);
        if let Some(path) = var("MCP_FORWARD_PATH") {
            executor.forward_path = path;
        }
        if let Some(path) = var("MCP_HEALTH_PATH") {
            executor.health_path = path;
        }
        executor.auth_token = var("MCP_AUTH_TOKEN");
        executor.forward_timeout = Duration::from_secs(parse_var::<u64>(
            "MCP_FORWARD_TIMEOUT_SECS",
            executor.forward_timeout.as_secs(),
        )?);

        let signing = SigningConfig {
            key: var("TTS_SIGNING_KEY"),
            key_id: var("TTS_SIGNING_KEY_ID"),
            required: bool_var("TTS_REQUIRE_SIGNING", true)?,
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            executor,
            use_mock_executor: bool_var("USE_MOCK_MCP", false)?,
            mock_executor_port,
            tts_api_key: var("GOOGLE_TTS_API_KEY"),
            signing,
            expose_error_stack: bool_var("EXPOSE_ERROR_STACK", false)?,
            log_level,
        })
    }
}
