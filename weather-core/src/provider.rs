use crate::{
    Config,
    model::{ForecastPoint, ObservationPayload, Units},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// External weather source. Implementations do not retry; callers decide retry policy.
#[async_trait]
pub trait WeatherProviderClient: Send + Sync + Debug {
    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> anyhow::Result<ObservationPayload>;

    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> anyhow::Result<Vec<ForecastPoint>>;
}

/// Construct the provider client from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProviderClient>> {
    let api_key = config.provider.api_key.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for the weather provider.\n\
                 Hint: run `weather configure` and enter your API key."
        )
    })?;

    let client = OpenWeatherClient::with_base_url(
        api_key.to_owned(),
        config.provider.base_url.clone(),
        config.fetch_timeout(),
    )?;

    Ok(Arc::new(client))
}
