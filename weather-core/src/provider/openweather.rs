use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::model::{ForecastPoint, ObservationPayload, Units};

use super::WeatherProviderClient;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_VISIBILITY_M: u32 = 10_000;

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    /// Client against the public OpenWeather endpoint with the default request timeout.
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), DEFAULT_TIMEOUT)
    }

    /// Client against a custom endpoint with a request timeout applied to every call.
    pub fn with_base_url(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", latitude.to_string().as_str()),
                ("lon", longitude.to_string().as_str()),
                ("appid", self.api_key.as_str()),
                ("units", units.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({endpoint})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {endpoint} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {endpoint} request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse OpenWeather {endpoint} JSON"))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<u8>,
    pressure: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
    clouds: Option<OwClouds>,
    visibility: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
    clouds: Option<OwClouds>,
    pop: Option<f64>,
    rain: Option<OwRain>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

impl From<OwCurrentResponse> for ObservationPayload {
    fn from(parsed: OwCurrentResponse) -> Self {
        let main = parsed.main.as_ref();
        let wind = parsed.wind.as_ref();
        let condition = parsed.weather.into_iter().next();

        let (condition_code, condition_description, icon_id) = condition
            .map(|w| (w.main, w.description, w.icon))
            .unwrap_or_default();

        ObservationPayload {
            temperature: main.and_then(|m| m.temp),
            feels_like: main.and_then(|m| m.feels_like),
            humidity: main.and_then(|m| m.humidity),
            pressure: main.and_then(|m| m.pressure),
            wind_speed: wind.and_then(|w| w.speed),
            wind_direction: wind.and_then(|w| w.deg),
            condition_code,
            condition_description,
            icon_id,
            cloudiness: parsed.clouds.and_then(|c| c.all),
            visibility: parsed.visibility.unwrap_or(DEFAULT_VISIBILITY_M),
        }
    }
}

impl OwForecastEntry {
    fn into_point(self) -> Option<ForecastPoint> {
        let forecast_time = DateTime::<Utc>::from_timestamp(self.dt, 0)?;
        let main = self.main.as_ref();
        let wind = self.wind.as_ref();
        let condition = self.weather.into_iter().next();

        Some(ForecastPoint {
            forecast_time,
            temperature: main.and_then(|m| m.temp),
            feels_like: main.and_then(|m| m.feels_like),
            humidity: main.and_then(|m| m.humidity),
            pressure: main.and_then(|m| m.pressure),
            wind_speed: wind.and_then(|w| w.speed),
            wind_direction: wind.and_then(|w| w.deg),
            condition_code: condition.as_ref().map(|w| w.main.clone()),
            condition_description: condition.as_ref().map(|w| w.description.clone()),
            icon_id: condition.map(|w| w.icon),
            cloudiness: self.clouds.and_then(|c| c.all),
            precipitation_probability: self.pop.unwrap_or(0.0),
            rain_volume_3h: self.rain.map(|r| r.three_hours.unwrap_or(0.0)),
        })
    }
}

#[async_trait]
impl WeatherProviderClient for OpenWeatherClient {
    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> Result<ObservationPayload> {
        let parsed: OwCurrentResponse =
            self.get_json("weather", latitude, longitude, units).await?;
        Ok(parsed.into())
    }

    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> Result<Vec<ForecastPoint>> {
        let parsed: OwForecastResponse =
            self.get_json("forecast", latitude, longitude, units).await?;

        Ok(parsed.list.into_iter().filter_map(OwForecastEntry::into_point).collect())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenWeatherClient {
        OpenWeatherClient::with_base_url("KEY".into(), server.uri(), Duration::from_secs(5))
            .expect("client should build")
    }

    #[tokio::test]
    async fn current_weather_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "41.3"))
            .and(query_param("lon", "69.2"))
            .and(query_param("units", "imperial"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "main": { "temp": 71.6, "feels_like": 70.1, "humidity": 33, "pressure": 1015 },
                "wind": { "speed": 4.2, "deg": 270 },
                "weather": [{ "main": "Clouds", "description": "few clouds", "icon": "02d" }],
                "clouds": { "all": 20 },
                "visibility": 9000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = client(&server).fetch_current(41.3, 69.2, Units::Imperial).await.unwrap();

        assert_eq!(payload.temperature, Some(71.6));
        assert_eq!(payload.humidity, Some(33));
        assert_eq!(payload.pressure, Some(1015));
        assert_eq!(payload.wind_direction, Some(270));
        assert_eq!(payload.condition_code, "Clouds");
        assert_eq!(payload.icon_id, "02d");
        assert_eq!(payload.cloudiness, Some(20));
        assert_eq!(payload.visibility, 9000);
    }

    #[tokio::test]
    async fn missing_sections_fall_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "main": { "temp": 10.0, "feels_like": 9.0, "humidity": 80, "pressure": 1001 },
                "wind": { "speed": 1.0 }
            })))
            .mount(&server)
            .await;

        let payload = client(&server).fetch_current(0.0, 0.0, Units::Metric).await.unwrap();

        assert_eq!(payload.wind_direction, None);
        assert_eq!(payload.visibility, DEFAULT_VISIBILITY_M);
        assert_eq!(payload.condition_code, "");
        assert_eq!(payload.cloudiness, None);
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_current(0.0, 0.0, Units::Metric).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn forecast_points_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cod": "200",
                "cnt": 2,
                "list": [
                    {
                        "dt": 1_700_000_000,
                        "main": { "temp": 5.0, "feels_like": 2.0, "humidity": 90, "pressure": 1008 },
                        "weather": [{ "main": "Rain", "description": "light rain", "icon": "10n" }],
                        "wind": { "speed": 6.0, "deg": 180 },
                        "clouds": { "all": 100 },
                        "pop": 0.8,
                        "rain": { "3h": 1.25 }
                    },
                    {
                        "dt": 1_700_010_800,
                        "main": { "temp": 4.0, "feels_like": 1.0, "humidity": 85, "pressure": 1009 }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let points = client(&server).fetch_forecast(1.0, 2.0, Units::Metric).await.unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].forecast_time.timestamp(), 1_700_000_000);
        assert_eq!(points[0].precipitation_probability, 0.8);
        assert_eq!(points[0].rain_volume_3h, Some(1.25));
        assert_eq!(points[0].condition_description.as_deref(), Some("light rain"));
        assert_eq!(points[1].precipitation_probability, 0.0);
        assert_eq!(points[1].rain_volume_3h, None);
        assert_eq!(points[1].icon_id, None);
    }

    #[test]
    fn default_client_targets_public_endpoint() {
        let client = OpenWeatherClient::new("KEY".into()).expect("client should build");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.api_key, "KEY");
    }

    #[test]
    fn custom_base_url_drops_trailing_slash() {
        let client = OpenWeatherClient::with_base_url(
            "KEY".into(),
            "http://localhost:9000/data/".into(),
            DEFAULT_TIMEOUT,
        )
        .expect("client should build");
        assert_eq!(client.base_url, "http://localhost:9000/data");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
