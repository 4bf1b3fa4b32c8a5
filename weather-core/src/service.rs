//! Cache-aside weather sync.
//!
//! Reads serve the latest stored snapshot when one exists and only reach the provider on a
//! miss. Every fetch appends a new snapshot; nothing already stored is rewritten.

use chrono::{DateTime, Utc};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tracing::{debug, error, info, warn};

use crate::{
    country::normalize_country_code,
    drift::DriftDeltas,
    error::{SyncError, SyncResult},
    model::{
        ForecastPoint, Location, LocationId, LocationUpdate, NewLocation, Units,
        WeatherObservation, WeatherView,
    },
    provider::WeatherProviderClient,
    store::{LocationDirectory, ObservationStore},
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A location that could not be resolved during a bulk listing.
#[derive(Debug)]
pub struct LocationFailure {
    pub location_id: LocationId,
    pub location_name: String,
    pub error: SyncError,
}

/// Result of listing every tracked location. Failures do not hide the locations that resolved.
#[derive(Debug, Default)]
pub struct BulkWeather {
    pub views: Vec<WeatherView>,
    pub failures: Vec<LocationFailure>,
}

impl BulkWeather {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct WeatherSyncService {
    locations: Arc<dyn LocationDirectory>,
    observations: Arc<dyn ObservationStore>,
    provider: Arc<dyn WeatherProviderClient>,
    fetch_timeout: Duration,
    drift_warnings: AtomicU64,
}

impl WeatherSyncService {
    pub fn new(
        locations: Arc<dyn LocationDirectory>,
        observations: Arc<dyn ObservationStore>,
        provider: Arc<dyn WeatherProviderClient>,
    ) -> Self {
        Self {
            locations,
            observations,
            provider,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            drift_warnings: AtomicU64::new(0),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Number of significant drifts seen since the service was built.
    pub fn drift_warnings(&self) -> u64 {
        self.drift_warnings.load(Ordering::Relaxed)
    }

    /// Latest stored snapshot, or exactly one fetch-and-append when the location has none.
    /// Stored data is never checked for age here; freshness comes from refreshes.
    pub async fn get_current(&self, id: LocationId, units: Units) -> SyncResult<WeatherView> {
        let location = self.location(id)?;
        self.resolve(&location, units).await
    }

    /// Always fetches and appends, never serves from the store.
    pub async fn force_refresh(&self, id: LocationId, units: Units) -> SyncResult<WeatherView> {
        let location = self.location(id)?;
        let observation = self.fetch_and_store(&location, units).await?;
        Ok(WeatherView::new(&location, &observation))
    }

    /// Resolves every tracked location like `get_current`, in listing order.
    /// A failing location is recorded and skipped; the others are still returned.
    pub async fn list_all_with_weather(&self, units: Units) -> BulkWeather {
        let mut bulk = BulkWeather::default();

        for location in self.locations.list_ordered() {
            match self.resolve(&location, units).await {
                Ok(view) => bulk.views.push(view),
                Err(err) => {
                    warn!(
                        location_id = location.id,
                        location = %location.name,
                        error = %err,
                        "Skipping location in weather listing"
                    );
                    bulk.failures.push(LocationFailure {
                        location_id: location.id,
                        location_name: location.name,
                        error: err,
                    });
                }
            }
        }

        bulk
    }

    /// Forecast points straight from the provider; they are not stored.
    pub async fn forecast(&self, id: LocationId, units: Units) -> SyncResult<Vec<ForecastPoint>> {
        let location = self.location(id)?;

        self.call_provider(
            &location.name,
            "forecast",
            self.provider
                .fetch_forecast(location.latitude, location.longitude, units),
        )
        .await
    }

    /// Forecast for arbitrary coordinates, without registering a location.
    pub async fn forecast_at(
        &self,
        latitude: f64,
        longitude: f64,
        units: Units,
    ) -> SyncResult<Vec<ForecastPoint>> {
        validate_coordinates(latitude, longitude)?;

        self.call_provider(
            &format!("{latitude},{longitude}"),
            "forecast",
            self.provider.fetch_forecast(latitude, longitude, units),
        )
        .await
    }

    /// Snapshots fetched strictly after `since`, newest first.
    pub fn recent_history(
        &self,
        id: LocationId,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<WeatherObservation>> {
        let location = self.location(id)?;
        Ok(self.observations.recent_since(location.id, since))
    }

    /// Validates and stores a location without contacting the provider.
    pub fn register_location(&self, new: NewLocation) -> SyncResult<Location> {
        let new = validate_new_location(new)?;
        let location = self.locations.create(new)?;
        info!(
            location_id = location.id,
            location = %location.name,
            country = %location.country,
            "Location added"
        );
        Ok(location)
    }

    /// Registers a location, then tries an initial metric fetch.
    /// The initial fetch is best effort: a provider failure leaves the location registered.
    pub async fn add_location(&self, new: NewLocation) -> SyncResult<Location> {
        let location = self.register_location(new)?;

        if let Err(err) = self.fetch_and_store(&location, Units::Metric).await {
            warn!(
                location = %location.name,
                error = %err,
                "Failed to fetch initial weather for new location"
            );
        }

        Ok(location)
    }

    pub fn update_location(&self, id: LocationId, update: LocationUpdate) -> SyncResult<Location> {
        if let Some(display_name) = &update.display_name {
            if display_name.trim().is_empty() {
                return Err(SyncError::InvalidInput("Display name must not be blank".into()));
            }
        }

        self.locations
            .update(id, update)
            .ok_or(SyncError::NotFound(id))
    }

    pub fn delete_location(&self, id: LocationId) -> SyncResult<()> {
        if self.locations.remove(id) {
            info!(location_id = id, "Location deleted");
            Ok(())
        } else {
            Err(SyncError::NotFound(id))
        }
    }

    fn location(&self, id: LocationId) -> SyncResult<Location> {
        self.locations.get(id).ok_or(SyncError::NotFound(id))
    }

    async fn resolve(&self, location: &Location, units: Units) -> SyncResult<WeatherView> {
        let observation = match self.observations.latest(location.id) {
            Some(stored) => {
                debug!(
                    location_id = location.id,
                    fetched_at = %stored.fetched_at,
                    "Serving stored weather"
                );
                stored
            }
            None => self.fetch_and_store(location, units).await?,
        };

        Ok(WeatherView::new(location, &observation))
    }

    async fn fetch_and_store(
        &self,
        location: &Location,
        units: Units,
    ) -> SyncResult<WeatherObservation> {
        let payload = self
            .call_provider(
                &location.name,
                "current weather",
                self.provider
                    .fetch_current(location.latitude, location.longitude, units),
            )
            .await?;

        let mut observation =
            WeatherObservation::from_payload(location.id, payload, units, Utc::now());

        // Read before the write so the comparison is against the previous snapshot.
        if let Some(previous) = self.observations.latest(location.id) {
            if let Some(deltas) = DriftDeltas::between(&previous, &observation) {
                if deltas.is_significant() {
                    self.drift_warnings.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        location_id = location.id,
                        location = %location.name,
                        temperature_delta = deltas.temperature,
                        humidity_delta = deltas.humidity,
                        pressure_delta = deltas.pressure,
                        "Significant weather drift detected. Keeping historical data and appending latest snapshot."
                    );
                }
            }
        }

        observation.recorded_at = Utc::now();
        self.observations.append(observation.clone());
        Ok(observation)
    }

    /// Runs a provider call under the fetch timeout and maps any failure to `UpstreamUnavailable`.
    async fn call_provider<T>(
        &self,
        target: &str,
        what: &str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> SyncResult<T> {
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                error!(
                    location = target,
                    error = %format!("{err:#}"),
                    "Provider error while fetching {what}"
                );
                Err(SyncError::UpstreamUnavailable(format!("{err:#}")))
            }
            Err(_) => {
                error!(
                    location = target,
                    timeout = ?self.fetch_timeout,
                    "Provider timed out while fetching {what}"
                );
                Err(SyncError::UpstreamUnavailable(format!(
                    "{what} request timed out after {:?}",
                    self.fetch_timeout
                )))
            }
        }
    }
}

/// Rejects coordinates the provider cannot answer for: non-finite or outside the globe.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> SyncResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(SyncError::InvalidInput(format!(
            "Latitude {latitude} must be between -90 and 90"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(SyncError::InvalidInput(format!(
            "Longitude {longitude} must be between -180 and 180"
        )));
    }
    Ok(())
}

fn validate_new_location(mut new: NewLocation) -> SyncResult<NewLocation> {
    new.name = new.name.trim().to_string();
    if new.name.is_empty() {
        return Err(SyncError::InvalidInput("City name is required".into()));
    }

    validate_coordinates(new.latitude, new.longitude)?;

    new.country = normalize_country_code(&new.country)?;
    new.display_name = new
        .display_name
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(new)
}
