use std::sync::Arc;

use tracing::info;

use super::{
    config::Config,
    database::RedisStore,
    memory::MemoryStore,
    store::Store,
    weather::{OpenWeatherProvider, WeatherProvider},
};

pub const MEMORY_URL_SCHEME: &str = "memory://";

/// Shared by every handler. The store and provider are passed on explicitly
/// to each operation; nothing reaches for a global connection.
pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub weather: Arc<dyn WeatherProvider>,
}

impl State {
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn Store> = if config.redis_url.starts_with(MEMORY_URL_SCHEME) {
            info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(RedisStore::open(&config.redis_url)?)
        };

        let weather = Arc::new(OpenWeatherProvider::new(
            &config.weather_url,
            &config.weather_api_key,
            config.weather_timeout,
        )?);

        Ok(Self::from_parts(config, store, weather))
    }

    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        weather: Arc<dyn WeatherProvider>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            weather,
        })
    }
}
