use reqwest::Url;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: Url,
    pub realtime_url: Url,
    pub token_path: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_base_str =
            std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        let api_base_url = Url::parse(&api_base_str)
            .map_err(|e| ConfigError::InvalidValue("API_BASE_URL".to_string(), e.to_string()))?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("unsupported scheme '{}'", api_base_url.scheme()),
            ));
        }

        let realtime_url = match std::env::var("REALTIME_URL") {
            Ok(value) => {
                let url = Url::parse(&value).map_err(|e| {
                    ConfigError::InvalidValue("REALTIME_URL".to_string(), e.to_string())
                })?;
                if !matches!(url.scheme(), "ws" | "wss") {
                    return Err(ConfigError::InvalidValue(
                        "REALTIME_URL".to_string(),
                        format!("unsupported scheme '{}'", url.scheme()),
                    ));
                }
                url
            }
            Err(_) => realtime_url_for(&api_base_url)?,
        };

        let token_path = std::env::var("TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.tutorbot/token"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base_url,
            realtime_url,
            token_path,
            log_level,
        })
    }

    /// The REST base without a trailing slash, ready for `{base}{endpoint}` joins.
    pub fn api_base(&self) -> String {
        self.api_base_url.as_str().trim_end_matches('/').to_string()
    }
}

/// Derives the realtime endpoint from the REST origin: same host, `ws`
/// scheme, `/ws` path.
fn realtime_url_for(api_base_url: &Url) -> Result<Url, ConfigError> {
    let mut url = api_base_url.clone();
    let scheme = if api_base_url.scheme() == "https" {
        "wss"
    } else {
        "ws"
    };
    url.set_scheme(scheme).map_err(|_| {
        ConfigError::InvalidValue(
            "API_BASE_URL".to_string(),
            "cannot derive a WebSocket URL".to_string(),
        )
    })?;
    url.set_path("/ws");
    url.set_query(None);
    Ok(url)
}
