use crate::{Config, WeatherSnapshot, provider::weatherapi::WeatherApiProvider};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod weatherapi;

/// Source of current weather readings.
///
/// One call is one attempt: implementations do not retry, and every failure
/// (transport, non-success status, missing or malformed body) is an error.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_current(&self, city: &str) -> anyhow::Result<WeatherSnapshot>;
}

/// Construct the WeatherAPI.com provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    build_provider(config, config.api_key())
}

fn build_provider(
    config: &Config,
    api_key: anyhow::Result<String>,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = api_key?;
    let provider = WeatherApiProvider::with_base_url(api_key, config.base_url());

    Ok(Arc::new(provider))
}
