use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::SyncError;

pub type LocationId = u64;

/// Unit system requested from the provider; stored values keep whatever system they were fetched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Standard,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Standard => "standard",
            Units::Imperial => "imperial",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "standard" => Ok(Units::Standard),
            "imperial" => Ok(Units::Imperial),
            _ => Err(SyncError::InvalidInput(format!(
                "Unknown units '{value}'. Supported units: metric, standard, imperial."
            ))),
        }
    }
}

/// A tracked place. Only `display_name` and `is_favorite` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    /// ISO-3166 alpha-2, uppercase.
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: Option<String>,
    pub is_favorite: bool,
}

impl Location {
    pub fn effective_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Input for registering a new location. `country` may be a code or an English country name.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct LocationUpdate {
    pub display_name: Option<String>,
    pub is_favorite: Option<bool>,
}

/// Provider response normalized into the fields we keep. Numeric values pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationPayload {
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    pub pressure: Option<u32>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<u16>,
    pub condition_code: String,
    pub condition_description: String,
    pub icon_id: String,
    pub cloudiness: Option<u8>,
    pub visibility: u32,
}

/// One appended snapshot for a location. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub location_id: LocationId,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    /// hPa
    pub pressure: Option<u32>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<u16>,
    pub condition_code: String,
    pub condition_description: String,
    pub icon_id: String,
    pub cloudiness: Option<u8>,
    /// meters
    pub visibility: u32,
    /// Units the provider was asked for; the numeric fields are in these units.
    pub units: Units,
    pub fetched_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl WeatherObservation {
    pub fn from_payload(
        location_id: LocationId,
        payload: ObservationPayload,
        units: Units,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            location_id,
            temperature: payload.temperature,
            feels_like: payload.feels_like,
            humidity: payload.humidity,
            pressure: payload.pressure,
            wind_speed: payload.wind_speed,
            wind_direction: payload.wind_direction,
            condition_code: payload.condition_code,
            condition_description: payload.condition_description,
            icon_id: payload.icon_id,
            cloudiness: payload.cloudiness,
            visibility: payload.visibility,
            units,
            fetched_at,
            recorded_at: fetched_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub forecast_time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    pub pressure: Option<u32>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<u16>,
    pub condition_code: Option<String>,
    pub condition_description: Option<String>,
    pub icon_id: Option<String>,
    pub cloudiness: Option<u8>,
    /// 0.0 to 1.0
    pub precipitation_probability: f64,
    /// millimeters over the last 3 hours
    pub rain_volume_3h: Option<f64>,
}

/// What callers see: location identity merged with its latest observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherView {
    pub location_id: LocationId,
    pub location_name: String,
    pub display_name: String,
    pub country: String,
    pub is_favorite: bool,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    pub pressure: Option<u32>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<u16>,
    pub condition_code: String,
    pub condition_description: String,
    pub icon_id: String,
    pub cloudiness: Option<u8>,
    pub visibility: u32,
    pub units: Units,
    pub last_updated: DateTime<Utc>,
}

impl WeatherView {
    pub fn new(location: &Location, observation: &WeatherObservation) -> Self {
        Self {
            location_id: location.id,
            location_name: location.name.clone(),
            display_name: location.effective_display_name().to_string(),
            country: location.country.clone(),
            is_favorite: location.is_favorite,
            temperature: observation.temperature,
            feels_like: observation.feels_like,
            humidity: observation.humidity,
            pressure: observation.pressure,
            wind_speed: observation.wind_speed,
            wind_direction: observation.wind_direction,
            condition_code: observation.condition_code.clone(),
            condition_description: observation.condition_description.clone(),
            icon_id: observation.icon_id.clone(),
            cloudiness: observation.cloudiness,
            visibility: observation.visibility,
            units: observation.units,
            last_updated: observation.fetched_at,
        }
    }
}

/// Global sync preferences. Absent preferences behave like `default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPreferences {
    pub auto_refresh_enabled: bool,
    pub default_units: Units,
    pub refresh_interval_minutes: u32,
}

impl Default for SyncPreferences {
    fn default() -> Self {
        Self {
            auto_refresh_enabled: false,
            default_units: Units::Metric,
            refresh_interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceUpdate {
    pub auto_refresh_enabled: Option<bool>,
    pub default_units: Option<Units>,
    pub refresh_interval_minutes: Option<u32>,
}

impl SyncPreferences {
    pub fn apply(&mut self, update: PreferenceUpdate) {
        if let Some(enabled) = update.auto_refresh_enabled {
            self.auto_refresh_enabled = enabled;
        }
        if let Some(units) = update.default_units {
            self.default_units = units;
        }
        if let Some(minutes) = update.refresh_interval_minutes {
            self.refresh_interval_minutes = minutes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(display_name: Option<&str>) -> Location {
        Location {
            id: 7,
            name: "Tashkent".into(),
            country: "UZ".into(),
            latitude: 41.3,
            longitude: 69.2,
            display_name: display_name.map(str::to_string),
            is_favorite: true,
        }
    }

    #[test]
    fn units_parse_case_insensitively() {
        assert_eq!("METRIC".parse::<Units>().unwrap(), Units::Metric);
        assert_eq!(" Imperial ".parse::<Units>().unwrap(), Units::Imperial);
        assert_eq!("standard".parse::<Units>().unwrap(), Units::Standard);
    }

    #[test]
    fn unknown_units_are_invalid_input() {
        let err = "kelvin".parse::<Units>().unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[test]
    fn effective_display_name_falls_back_to_name() {
        assert_eq!(location(None).effective_display_name(), "Tashkent");
        assert_eq!(location(Some("Home")).effective_display_name(), "Home");
    }

    #[test]
    fn view_carries_location_identity_and_fetch_time() {
        let fetched_at = Utc::now();
        let payload = ObservationPayload {
            temperature: Some(21.5),
            humidity: Some(40),
            pressure: Some(1012),
            condition_code: "Clear".into(),
            visibility: 10_000,
            ..Default::default()
        };
        let observation = WeatherObservation::from_payload(7, payload, Units::Imperial, fetched_at);
        let view = WeatherView::new(&location(None), &observation);

        assert_eq!(view.location_id, 7);
        assert_eq!(view.display_name, "Tashkent");
        assert!(view.is_favorite);
        assert_eq!(view.temperature, Some(21.5));
        assert_eq!(view.units, Units::Imperial);
        assert_eq!(view.last_updated, fetched_at);
    }

    #[test]
    fn preference_update_is_partial() {
        let mut prefs = SyncPreferences::default();
        prefs.apply(PreferenceUpdate {
            auto_refresh_enabled: Some(true),
            ..Default::default()
        });

        assert!(prefs.auto_refresh_enabled);
        assert_eq!(prefs.default_units, Units::Metric);
        assert_eq!(prefs.refresh_interval_minutes, 30);
    }
}
