use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

use weather_core::{
    BulkSyncScheduler, Config, ForecastPoint, InMemoryLocations, InMemoryObservations,
    InMemoryPreferences, NewLocation, SyncPreferences, Units, WeatherSyncService, WeatherView,
    provider_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather sync CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the weather provider API key.
    Configure,

    /// Show current weather for coordinates.
    Show {
        /// City name, used for display.
        name: String,

        /// ISO code or English country name.
        #[arg(long)]
        country: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// metric, standard or imperial.
        #[arg(long, default_value = "metric")]
        units: Units,
    },

    /// Show the forecast for coordinates.
    Forecast {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long, default_value = "metric")]
        units: Units,
    },

    /// Track the locations listed in a TOML file and refresh them on a schedule until Ctrl-C.
    Watch {
        /// File with `[[locations]]` entries (name, country, latitude, longitude).
        locations: PathBuf,

        #[arg(long, default_value = "metric")]
        units: Units,

        /// Overrides `sync.interval_minutes` from the config file.
        #[arg(long)]
        interval_minutes: Option<u64>,
    },
}

#[derive(Debug, Deserialize)]
struct LocationsFile {
    #[serde(default)]
    locations: Vec<NewLocation>,
}

struct Stack {
    service: Arc<WeatherSyncService>,
    locations: Arc<InMemoryLocations>,
}

fn build_stack(config: &Config) -> Result<Stack> {
    let provider = provider_from_config(config)?;
    let locations = Arc::new(InMemoryLocations::new());
    let service = WeatherSyncService::new(
        locations.clone(),
        Arc::new(InMemoryObservations::new()),
        provider,
    )
    .with_fetch_timeout(config.fetch_timeout());

    Ok(Stack {
        service: Arc::new(service),
        locations,
    })
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show {
                name,
                country,
                lat,
                lon,
                units,
            } => {
                let config = Config::load()?;
                let stack = build_stack(&config)?;

                let location = stack.service.register_location(NewLocation {
                    name,
                    country,
                    latitude: lat,
                    longitude: lon,
                    display_name: None,
                    is_favorite: None,
                })?;

                let view = stack.service.get_current(location.id, units).await?;
                print_view(&view);
                Ok(())
            }
            Command::Forecast { lat, lon, units } => {
                let config = Config::load()?;
                let stack = build_stack(&config)?;

                let points = stack.service.forecast_at(lat, lon, units).await?;
                for point in &points {
                    print_forecast_point(point, units);
                }
                Ok(())
            }
            Command::Watch {
                locations,
                units,
                interval_minutes,
            } => watch(locations, units, interval_minutes).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key.trim().to_string());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn watch(path: PathBuf, units: Units, interval_minutes: Option<u64>) -> Result<()> {
    let config = Config::load()?;
    let stack = build_stack(&config)?;

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read locations file: {}", path.display()))?;
    let file: LocationsFile = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse locations file: {}", path.display()))?;

    if file.locations.is_empty() {
        bail!("No locations found in {}", path.display());
    }

    for new in file.locations {
        let name = new.name.clone();
        stack
            .service
            .add_location(new)
            .await
            .with_context(|| format!("Failed to add location '{name}'"))?;
    }

    let interval = interval_minutes
        .map(|m| Duration::from_secs(m.saturating_mul(60)))
        .unwrap_or_else(|| config.sync_interval());

    let preferences = Arc::new(InMemoryPreferences::with(SyncPreferences {
        auto_refresh_enabled: true,
        default_units: units,
        refresh_interval_minutes: u32::try_from(interval.as_secs() / 60).unwrap_or(u32::MAX),
    }));
    let scheduler =
        BulkSyncScheduler::new(stack.service.clone(), stack.locations.clone(), preferences);

    let shutdown = CancellationToken::new();
    let ctrl_c = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        })
    };

    info!(interval = ?interval, %units, "Watching locations, press Ctrl-C to stop");
    let result = scheduler.run(interval, shutdown).await;
    ctrl_c.abort();
    result?;

    let bulk = stack.service.list_all_with_weather(units).await;
    for view in &bulk.views {
        print_view(view);
    }
    for failure in &bulk.failures {
        println!("{}: {}", failure.location_name, failure.error);
    }

    Ok(())
}

fn temperature_unit(units: Units) -> &'static str {
    match units {
        Units::Metric => "°C",
        Units::Imperial => "°F",
        Units::Standard => "K",
    }
}

fn speed_unit(units: Units) -> &'static str {
    match units {
        Units::Imperial => "mph",
        Units::Metric | Units::Standard => "m/s",
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Labels follow the units the snapshot was fetched in, not the units asked for now.
fn format_view(view: &WeatherView) -> String {
    let units = view.units;
    let star = if view.is_favorite { "★ " } else { "" };
    [
        format!("{star}{} ({}, {})", view.display_name, view.location_name, view.country),
        format!(
            "  {}{} (feels like {}{}), {}",
            fmt_opt(view.temperature),
            temperature_unit(units),
            fmt_opt(view.feels_like),
            temperature_unit(units),
            view.condition_description,
        ),
        format!(
            "  humidity {}%, pressure {} hPa, wind {} {}, clouds {}%, visibility {} m",
            fmt_opt(view.humidity),
            fmt_opt(view.pressure),
            fmt_opt(view.wind_speed),
            speed_unit(units),
            fmt_opt(view.cloudiness),
            view.visibility,
        ),
        format!("  updated {}", view.last_updated.format("%Y-%m-%d %H:%M:%S UTC")),
    ]
    .join("\n")
}

fn print_view(view: &WeatherView) {
    println!("{}", format_view(view));
}

fn print_forecast_point(point: &ForecastPoint, units: Units) {
    println!(
        "{}  {}{}  {}  rain chance {:.0}%{}",
        point.forecast_time.format("%a %d %b %H:%M"),
        fmt_opt(point.temperature),
        temperature_unit(units),
        point.condition_description.as_deref().unwrap_or("-"),
        point.precipitation_probability * 100.0,
        point
            .rain_volume_3h
            .map(|mm| format!(", {mm} mm/3h"))
            .unwrap_or_default(),
    );
}
