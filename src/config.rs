use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3002;
pub const DEFAULT_API_BASE: &str = "https://api.raindrop.io/rest/v1";
pub const DEFAULT_OAUTH_BASE: &str = "https://raindrop.io";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportMode,
    pub bind_addr: String,
    pub port: u16,
    pub access_token: Option<String>,
    pub api_base: String,
    pub upstream_timeout: Duration,
    pub oauth: OAuthConfig,
    pub log_level: String,
    pub app_env: AppEnv,
    pub api_token: Option<String>,
    pub session_recovery: bool,
    pub session_idle_timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be one of: stdio, http")]
    InvalidTransport,
    #[error("PORT must be a valid u16")]
    InvalidPort,
    #[error("RAINDROP_TIMEOUT_SECS must be a positive integer")]
    InvalidTimeout,
    #[error("MCP_SESSION_IDLE_SECS must be a positive integer")]
    InvalidIdleTimeout,
    #[error("MCP_SESSION_RECOVERY must be true or false")]
    InvalidRecoveryFlag,
    #[error("APP_ENV must be one of: development, production")]
    InvalidAppEnv,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let transport = match read("MCP_TRANSPORT")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("stdio") => TransportMode::Stdio,
            Some("http") => TransportMode::Http,
            _ => return Err(ConfigError::InvalidTransport),
        };

        let port = read("PORT")
            .or_else(|| read("HTTP_PORT"))
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let upstream_timeout = read("RAINDROP_TIMEOUT_SECS")
            .map(|value| parse_positive_secs(&value).ok_or(ConfigError::InvalidTimeout))
            .transpose()?
            .unwrap_or(Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS));

        let session_idle_timeout = read("MCP_SESSION_IDLE_SECS")
            .map(|value| parse_positive_secs(&value).ok_or(ConfigError::InvalidIdleTimeout))
            .transpose()?;

        let session_recovery = match read("MCP_SESSION_RECOVERY")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("true") | Some("1") | Some("yes") => true,
            Some("false") | Some("0") | Some("no") => false,
            _ => return Err(ConfigError::InvalidRecoveryFlag),
        };

        let app_env = match read("APP_ENV")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("production") | Some("prod") => AppEnv::Production,
            Some("development") | Some("dev") => AppEnv::Development,
            _ => return Err(ConfigError::InvalidAppEnv),
        };

        let redirect_uri = read("RAINDROP_REDIRECT_URI")
            .unwrap_or_else(|| format!("http://localhost:{port}/auth/raindrop/callback"));

        let config = Self {
            transport,
            bind_addr: read("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            access_token: read("RAINDROP_ACCESS_TOKEN"),
            api_base: read("RAINDROP_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            upstream_timeout,
            oauth: OAuthConfig {
                client_id: read("RAINDROP_CLIENT_ID"),
                client_secret: read("RAINDROP_CLIENT_SECRET"),
                redirect_uri,
                base_url: read("RAINDROP_OAUTH_BASE")
                    .map(|value| value.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_OAUTH_BASE.to_string()),
            },
            log_level: read("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            app_env,
            api_token: read("MCP_API_TOKEN"),
            session_recovery,
            session_idle_timeout,
        };

        if config.transport == TransportMode::Http {
            let _ = config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn parse_positive_secs(value: &str) -> Option<Duration> {
    value
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
