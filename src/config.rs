use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GENERATION_METHOD: &str = "generateContent";
pub const DEFAULT_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];
pub const DEFAULT_SOURCE_TEXT_CAP: usize = 3000;

/// Settings for talking to the generative-text service.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub generation_method: String,
    /// Ranked preference list; the first entry is the default model.
    pub models: Vec<String>,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            generation_method: DEFAULT_GENERATION_METHOD.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// Fallback credential when a session has not set its own.
    pub gemini_api_key: Option<String>,
    pub access_password: String,
    pub upstream: UpstreamConfig,
    pub source_text_cap: usize,
    pub fetch_timeout: Duration,
    /// Sessions untouched for this long are dropped.
    pub session_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let access_password = env::var("ACCESS_PASSWORD")?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let mut upstream = UpstreamConfig::default();
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            upstream.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(method) = env::var("GEMINI_GENERATION_METHOD") {
            upstream.generation_method = method;
        }
        if let Ok(models) = env::var("GEMINI_MODELS") {
            upstream.models = parse_model_list(&models)?;
        }
        upstream.timeout = Duration::from_secs(parse_number("UPSTREAM_TIMEOUT_SECS", 15)?);

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            gemini_api_key,
            access_password,
            upstream,
            source_text_cap: parse_number("SOURCE_TEXT_CAP", DEFAULT_SOURCE_TEXT_CAP as u64)? as usize,
            fetch_timeout: Duration::from_secs(parse_number("FETCH_TIMEOUT_SECS", 10)?),
            session_ttl: Duration::from_secs(parse_number("SESSION_TTL_SECS", 3600)?),
        })
    }
}

fn parse_number(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

pub fn parse_model_list(raw: &str) -> Result<Vec<String>> {
    let models: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();

    if models.is_empty() {
        return Err(AppError::ConfigError("GEMINI_MODELS must name at least one model".to_string()));
    }
    Ok(models)
}
