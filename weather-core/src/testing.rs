//! Scripted provider and fixtures for unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use crate::{
    model::{ForecastPoint, NewLocation, ObservationPayload, Units},
    provider::WeatherProviderClient,
};

pub fn payload(temperature: f64, humidity: u8, pressure: u32) -> ObservationPayload {
    ObservationPayload {
        temperature: Some(temperature),
        feels_like: Some(temperature - 1.0),
        humidity: Some(humidity),
        pressure: Some(pressure),
        wind_speed: Some(3.5),
        wind_direction: Some(180),
        condition_code: "Clear".into(),
        condition_description: "clear sky".into(),
        icon_id: "01d".into(),
        cloudiness: Some(0),
        visibility: 10_000,
    }
}

pub fn new_location(name: &str, country: &str) -> NewLocation {
    NewLocation {
        name: name.into(),
        country: country.into(),
        latitude: 41.0,
        longitude: 69.0,
        display_name: None,
        is_favorite: None,
    }
}

#[derive(Debug)]
struct Script {
    payload: ObservationPayload,
    failing_latitudes: Vec<f64>,
    delay: Option<Duration>,
    last_request: Option<(f64, f64, Units)>,
}

/// Answers with a fixed payload, failing for chosen latitudes.
#[derive(Debug)]
pub struct FakeProvider {
    current_calls: AtomicUsize,
    script: Mutex<Script>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            current_calls: AtomicUsize::new(0),
            script: Mutex::new(Script {
                payload: payload(20.0, 50, 1013),
                failing_latitudes: Vec::new(),
                delay: None,
                last_request: None,
            }),
        }
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(f64, f64, Units)> {
        self.script.lock().last_request
    }

    pub fn set_payload(&self, payload: ObservationPayload) {
        self.script.lock().payload = payload;
    }

    pub fn fail_at_latitude(&self, latitude: f64) {
        self.script.lock().failing_latitudes.push(latitude);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = Some(delay);
    }

    /// Records the request and returns the configured delay, or an error for failing latitudes.
    fn begin(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> anyhow::Result<Option<Duration>> {
        let mut script = self.script.lock();
        script.last_request = Some((latitude, longitude, units));
        if script.failing_latitudes.contains(&latitude) {
            anyhow::bail!("OpenWeather weather request failed with status 503: upstream down");
        }
        Ok(script.delay)
    }
}

#[async_trait]
impl WeatherProviderClient for FakeProvider {
    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> anyhow::Result<ObservationPayload> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.begin(latitude, longitude, units)? {
            tokio::time::sleep(delay).await;
        }
        Ok(self.script.lock().payload.clone())
    }

    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> anyhow::Result<Vec<ForecastPoint>> {
        if let Some(delay) = self.begin(latitude, longitude, units)? {
            tokio::time::sleep(delay).await;
        }

        let start = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        Ok((0..2)
            .map(|i| ForecastPoint {
                forecast_time: start + chrono::Duration::hours(3 * i),
                temperature: Some(18.0 + i as f64),
                feels_like: None,
                humidity: Some(55),
                pressure: Some(1010),
                wind_speed: Some(2.0),
                wind_direction: None,
                condition_code: Some("Clouds".into()),
                condition_description: Some("scattered clouds".into()),
                icon_id: Some("03d".into()),
                cloudiness: Some(40),
                precipitation_probability: 0.1,
                rain_volume_3h: None,
            })
            .collect())
    }
}
