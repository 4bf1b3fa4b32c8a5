//! Periodic refresh of every tracked location.
//!
//! Each sweep is independent: it reads the current preferences, refreshes each location in
//! listing order and reports how many succeeded. One location failing never stops the sweep.

use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{SyncError, SyncResult},
    model::LocationId,
    service::WeatherSyncService,
    store::{LocationDirectory, PreferenceStore},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub succeeded: usize,
    pub total: usize,
    /// Locations that failed, with the error message.
    pub failures: Vec<(LocationId, String)>,
}

impl std::fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} locations refreshed", self.succeeded, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Auto-refresh is off; nothing was touched.
    Skipped,
    Completed(SweepSummary),
}

pub struct BulkSyncScheduler {
    service: Arc<WeatherSyncService>,
    locations: Arc<dyn LocationDirectory>,
    preferences: Arc<dyn PreferenceStore>,
}

impl BulkSyncScheduler {
    pub fn new(
        service: Arc<WeatherSyncService>,
        locations: Arc<dyn LocationDirectory>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            service,
            locations,
            preferences,
        }
    }

    pub async fn run_sweep(&self) -> SweepOutcome {
        let preferences = self.preferences.get();
        if !preferences.auto_refresh_enabled {
            debug!("Auto-refresh is disabled, skipping scheduled sync");
            return SweepOutcome::Skipped;
        }

        let units = preferences.default_units;
        let locations = self.locations.list_ordered();
        info!(total = locations.len(), %units, "Scheduled sync started");

        let mut summary = SweepSummary {
            succeeded: 0,
            total: locations.len(),
            failures: Vec::new(),
        };

        for location in locations {
            match self.service.force_refresh(location.id, units).await {
                Ok(_) => summary.succeeded += 1,
                Err(err) => {
                    warn!(
                        location_id = location.id,
                        location = %location.name,
                        error = %err,
                        "Scheduled sync failed for location"
                    );
                    summary.failures.push((location.id, err.to_string()));
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            total = summary.total,
            "Scheduled sync completed: {summary}"
        );
        SweepOutcome::Completed(summary)
    }

    /// Sweeps once immediately and then every `interval`, until `shutdown` is cancelled.
    /// A slow sweep delays the next tick rather than causing a burst.
    ///
    /// A zero interval is rejected with `InvalidInput` before any sweep runs.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) -> SyncResult<()> {
        if interval.is_zero() {
            return Err(SyncError::InvalidInput("Sync interval must be greater than zero".into()));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Weather sync scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_sweep().await;
                }
            }
        }

        Ok(())
    }
}
