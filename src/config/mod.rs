/// Application configuration module
use std::env;

pub const DEFAULT_APOD_API_URL: &str = "https://api.nasa.gov/planetary/apod";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub apod_api_url: String,
    pub translate_api_url: String,
    pub translate_api_key: Option<String>,
    pub bind_addr: String,
    pub http_timeout_seconds: u64,
    pub network: NetworkConfig,
    pub image: ImageBounds,
    pub supersede_stale_loads: bool,
}

/// Conditions that gate the one-time translation model preparation.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub metered: bool,
    pub require_unmetered_for_model: bool,
}

/// Bounds the fetched image is scaled to fit into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageBounds {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://apod.db".to_string());

        let apod_api_url =
            env::var("APOD_API_URL").unwrap_or_else(|_| DEFAULT_APOD_API_URL.to_string());

        let translate_api_url = env::var("TRANSLATE_API_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());

        let translate_api_key = env::var("TRANSLATE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let defaults = ImageBounds::default();
        let image = ImageBounds {
            max_width: env_u32("IMAGE_MAX_WIDTH", defaults.max_width),
            max_height: env_u32("IMAGE_MAX_HEIGHT", defaults.max_height),
        };
        if image.max_width == 0 || image.max_height == 0 {
            anyhow::bail!("IMAGE_MAX_WIDTH and IMAGE_MAX_HEIGHT must be positive");
        }

        let network = NetworkConfig {
            metered: env_bool("NETWORK_METERED", false),
            require_unmetered_for_model: env_bool("TRANSLATION_REQUIRE_UNMETERED", true),
        };

        Ok(Self {
            database_url,
            apod_api_url,
            translate_api_url,
            translate_api_key,
            bind_addr,
            http_timeout_seconds: env_u64("HTTP_TIMEOUT_SECONDS", 30),
            network,
            image,
            supersede_stale_loads: env_bool("SUPERSEDE_STALE_LOADS", false),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|s| parse_bool(&s))
        .unwrap_or(default)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
