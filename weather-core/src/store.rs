//! Collaborator seams used by the sync service and scheduler, plus in-memory implementations.
//!
//! The traits are synchronous: store reads and writes are expected to complete without
//! waiting on the network. Only the weather provider suspends.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    error::{SyncError, SyncResult},
    model::{
        Location, LocationId, LocationUpdate, NewLocation, PreferenceUpdate, SyncPreferences,
        WeatherObservation,
    },
};

pub trait LocationDirectory: Send + Sync {
    fn get(&self, id: LocationId) -> Option<Location>;

    /// Favorites first, then display name (unset last), then name. Ties keep id order.
    fn list_ordered(&self) -> Vec<Location>;

    /// Stores an already-validated location. Fails with `Duplicate` on a name + country clash.
    fn create(&self, location: NewLocation) -> SyncResult<Location>;

    fn update(&self, id: LocationId, update: LocationUpdate) -> Option<Location>;

    fn remove(&self, id: LocationId) -> bool;
}

/// Append-only snapshot history.
pub trait ObservationStore: Send + Sync {
    /// Entry with the greatest `fetched_at` for the location.
    fn latest(&self, location_id: LocationId) -> Option<WeatherObservation>;

    fn append(&self, observation: WeatherObservation);

    /// Entries fetched strictly after `since`, newest first.
    fn recent_since(&self, location_id: LocationId, since: DateTime<Utc>)
    -> Vec<WeatherObservation>;

    fn count(&self, location_id: LocationId) -> usize;
}

pub trait PreferenceStore: Send + Sync {
    /// Stored preferences, or defaults when none were ever saved.
    fn get(&self) -> SyncPreferences;

    fn update(&self, update: PreferenceUpdate) -> SyncPreferences;
}

fn ordering_key(location: &Location) -> (bool, bool, &str, &str, LocationId) {
    (
        !location.is_favorite,
        location.display_name.is_none(),
        location.display_name.as_deref().unwrap_or_default(),
        location.name.as_str(),
        location.id,
    )
}

#[derive(Debug, Default)]
pub struct InMemoryLocations {
    next_id: AtomicU64,
    locations: RwLock<BTreeMap<LocationId, Location>>,
}

impl InMemoryLocations {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationDirectory for InMemoryLocations {
    fn get(&self, id: LocationId) -> Option<Location> {
        self.locations.read().get(&id).cloned()
    }

    fn list_ordered(&self) -> Vec<Location> {
        let mut all: Vec<Location> = self.locations.read().values().cloned().collect();
        all.sort_by(|a, b| ordering_key(a).cmp(&ordering_key(b)));
        all
    }

    fn create(&self, location: NewLocation) -> SyncResult<Location> {
        let mut locations = self.locations.write();

        let clash = locations
            .values()
            .any(|l| l.name == location.name && l.country == location.country);
        if clash {
            return Err(SyncError::Duplicate {
                name: location.name,
                country: location.country,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let created = Location {
            id,
            name: location.name,
            country: location.country,
            latitude: location.latitude,
            longitude: location.longitude,
            display_name: location.display_name,
            is_favorite: location.is_favorite.unwrap_or(false),
        };
        locations.insert(id, created.clone());
        Ok(created)
    }

    fn update(&self, id: LocationId, update: LocationUpdate) -> Option<Location> {
        let mut locations = self.locations.write();
        let location = locations.get_mut(&id)?;

        if let Some(display_name) = update.display_name {
            location.display_name = Some(display_name);
        }
        if let Some(is_favorite) = update.is_favorite {
            location.is_favorite = is_favorite;
        }
        Some(location.clone())
    }

    fn remove(&self, id: LocationId) -> bool {
        self.locations.write().remove(&id).is_some()
    }
}

/// Per-location vectors in a sharded map; appends for different locations never contend.
#[derive(Debug, Default)]
pub struct InMemoryObservations {
    history: DashMap<LocationId, Vec<WeatherObservation>>,
}

impl InMemoryObservations {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObservationStore for InMemoryObservations {
    fn latest(&self, location_id: LocationId) -> Option<WeatherObservation> {
        self.history
            .get(&location_id)?
            .iter()
            .max_by_key(|o| o.fetched_at)
            .cloned()
    }

    fn append(&self, observation: WeatherObservation) {
        self.history
            .entry(observation.location_id)
            .or_default()
            .push(observation);
    }

    fn recent_since(
        &self,
        location_id: LocationId,
        since: DateTime<Utc>,
    ) -> Vec<WeatherObservation> {
        let Some(entries) = self.history.get(&location_id) else {
            return Vec::new();
        };

        let mut recent: Vec<WeatherObservation> =
            entries.iter().filter(|o| o.fetched_at > since).cloned().collect();
        recent.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        recent
    }

    fn count(&self, location_id: LocationId) -> usize {
        self.history.get(&location_id).map_or(0, |entries| entries.len())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    stored: RwLock<Option<SyncPreferences>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(preferences: SyncPreferences) -> Self {
        Self {
            stored: RwLock::new(Some(preferences)),
        }
    }
}

impl PreferenceStore for InMemoryPreferences {
    fn get(&self) -> SyncPreferences {
        self.stored.read().unwrap_or_default()
    }

    fn update(&self, update: PreferenceUpdate) -> SyncPreferences {
        let mut stored = self.stored.write();
        let mut preferences = stored.unwrap_or_default();
        preferences.apply(update);
        *stored = Some(preferences);
        preferences
    }
}
