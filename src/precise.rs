//! One-shot acquisition of the device's precise position.
//!
//! [`PreciseLocation`] asks a [`DeviceLocator`] for a fresh fix at most once
//! per run and memoizes the reverse-geocoded label. The request is skipped
//! when no locator is configured or when the log API origin is neither served
//! over https nor a local development host.

use crate::geocode::ReverseGeocoder;
use crate::models::GeoLabel;
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a position request may take before it counts as failed.
pub const POSITION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Maximum age of a cached fix the locator may return. Zero forces a fresh one.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: POSITION_TIMEOUT,
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("permission to read the device position was denied")]
    PermissionDenied,
    #[error("no position fix within {0:?}")]
    Timeout(Duration),
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Source of device coordinates.
#[async_trait]
pub trait DeviceLocator: Send + Sync {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, PositionError>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Locator for a stationary machine whose coordinates come from config.
pub struct ManualLocator {
    coords: Coordinates,
}

impl ManualLocator {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coords: Coordinates {
                latitude,
                longitude,
            },
        }
    }
}

#[async_trait]
impl DeviceLocator for ManualLocator {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, PositionError> {
        let Coordinates {
            latitude,
            longitude,
        } = self.coords;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(PositionError::Unavailable(format!(
                "configured coordinates ({}, {}) are out of range",
                latitude, longitude
            )));
        }
        Ok(self.coords)
    }

    fn name(&self) -> &'static str {
        "Manual"
    }
}

/// Whether the origin the client talks to allows device location.
///
/// Mirrors the browser rule: https, or a recognised local development host.
pub fn is_trusted_origin(origin: &Url) -> bool {
    if origin.scheme() == "https" {
        return true;
    }
    matches!(origin.host_str(), Some("localhost") | Some("127.0.0.1"))
}

/// Result of the single precise-location attempt of this run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PreciseGeoState {
    pub label: Option<GeoLabel>,
    pub tried: bool,
}

pub struct PreciseLocation {
    locator: Option<Arc<dyn DeviceLocator>>,
    trusted_origin: bool,
    options: PositionOptions,
    state: PreciseGeoState,
}

impl PreciseLocation {
    pub fn new(locator: Option<Arc<dyn DeviceLocator>>, trusted_origin: bool) -> Self {
        Self {
            locator,
            trusted_origin,
            options: PositionOptions::default(),
            state: PreciseGeoState::default(),
        }
    }

    /// Overrides the request options. Used to shorten the timeout in tests.
    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn has_capability(&self) -> bool {
        self.locator.is_some()
    }

    pub fn state(&self) -> &PreciseGeoState {
        &self.state
    }

    /// Marks the attempt as spent without contacting the device.
    pub fn decline(&mut self) {
        if !self.state.tried {
            debug!("Precise location declined for this session");
        }
        self.state.tried = true;
    }

    /// Requests the device position once and reverse geocodes it.
    ///
    /// Later calls return the memoized label without a new request. `None`
    /// means "fall back to IP geolocation" and is never an error.
    pub async fn acquire(&mut self, geocoder: &ReverseGeocoder) -> Option<GeoLabel> {
        if self.state.tried {
            return self.state.label.clone();
        }
        self.state.tried = true;

        let Some(locator) = self.locator.clone() else {
            debug!("No device locator configured; skipping precise location");
            return None;
        };
        if !self.trusted_origin {
            info!("Precise location blocked: log API origin is neither https nor localhost");
            return None;
        }

        let request = locator.current_position(&self.options);
        let outcome = match tokio::time::timeout(self.options.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(PositionError::Timeout(self.options.timeout)),
        };

        match outcome {
            Ok(coords) => {
                info!(
                    "{} locator reported ({}, {})",
                    locator.name(),
                    coords.latitude,
                    coords.longitude
                );
                let label = geocoder
                    .reverse_geocode(coords.latitude, coords.longitude)
                    .await;
                self.state.label = Some(label.clone());
                Some(label)
            }
            Err(e) => {
                warn!("Precise location failed, falling back to IP: {}", e);
                None
            }
        }
    }
}
