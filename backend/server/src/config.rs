use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};
use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub weather_url: String,
    pub weather_api_key: String,
    pub weather_ttl: Duration,
    pub weather_timeout: Duration,
    pub max_page_limit: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let max_page_limit: u64 = try_load("MAX_PAGE_LIMIT", "100")?;
        if max_page_limit == 0 {
            return Err(anyhow!("MAX_PAGE_LIMIT must be at least 1"));
        }

        Ok(Self {
            port: try_load("RUST_PORT", "3000")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            weather_url: try_load(
                "WEATHER_API_URL",
                "https://api.openweathermap.org/data/2.5/weather",
            )?,
            weather_api_key: read_secret("WEATHER_API_KEY"),
            weather_ttl: Duration::from_secs(try_load("WEATHER_TTL_SECS", "3600")?),
            weather_timeout: Duration::from_millis(try_load("WEATHER_TIMEOUT_MS", "5000")?),
            max_page_limit,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            redis_url: "memory://".to_string(),
            weather_url: String::new(),
            weather_api_key: String::new(),
            weather_ttl: Duration::from_secs(60 * 60),
            weather_timeout: Duration::from_secs(5),
            max_page_limit: 100,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse_setting(key, &raw)
}

fn parse_setting<T: FromStr>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}

/// Environment first, then the Docker secret file. Missing is allowed; the
/// provider will then reject lookups and callers see upstream unavailable.
fn read_secret(secret_name: &str) -> String {
    if let Some(value) = var(secret_name) {
        return value;
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
            String::new()
        })
}
