//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weather provider abstraction and its OpenWeather client
//! - Cache-aside weather sync with append-only snapshot history and drift warnings
//! - A bulk refresh scheduler that isolates per-location failures
//! - A per-client sliding-window rate limiter
//!
//! Storage is reached through the traits in [`store`]; in-memory implementations are included.

pub mod config;
pub mod country;
pub mod drift;
pub mod error;
pub mod model;
pub mod provider;
pub mod rate_limit;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{Config, ProviderConfig, RateLimitConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use model::{
    ForecastPoint, Location, LocationId, LocationUpdate, NewLocation, ObservationPayload,
    PreferenceUpdate, SyncPreferences, Units, WeatherObservation, WeatherView,
};
pub use provider::{WeatherProviderClient, provider_from_config};
pub use rate_limit::{SlidingWindowLimiter, client_key};
pub use scheduler::{BulkSyncScheduler, SweepOutcome, SweepSummary};
pub use service::{BulkWeather, LocationFailure, WeatherSyncService, validate_coordinates};
pub use store::{
    InMemoryLocations, InMemoryObservations, InMemoryPreferences, LocationDirectory,
    ObservationStore, PreferenceStore,
};
