//! IP based location labels for log entries.
//!
//! This module provides [`IpGeolocator`], which turns the source address of a
//! log entry into a "City, Country" label through an ipapi.co-compatible
//! service. Private or missing addresses are not sent to the service; the
//! provider is asked for the caller's own apparent address instead.

use crate::ip::is_private;
use crate::models::GeoLabel;
use color_eyre::Result;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    city: Option<String>,
    country_name: Option<String>,
}

pub struct IpGeolocator {
    client: Client,
    base_url: String,
}

impl IpGeolocator {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint to query for `ip`.
    ///
    /// Missing and private addresses map to the "own address" endpoint.
    pub fn endpoint_for(&self, ip: Option<&str>) -> String {
        match ip {
            Some(ip) if !is_private(Some(ip)) => format!("{}/{}/json/", self.base_url, ip),
            _ => format!("{}/json/", self.base_url),
        }
    }

    /// Resolves `ip` to a label.
    ///
    /// Does not fail: network errors, provider errors and empty responses all
    /// come back as [`GeoLabel::unknown`].
    pub async fn ip_geo_label(&self, ip: Option<&str>) -> GeoLabel {
        let endpoint = self.endpoint_for(ip);
        match self.lookup(&endpoint).await {
            Ok(Some(label)) => {
                debug!("IP geolocation for {:?} resolved to {}", ip, label);
                label
            }
            Ok(None) => {
                warn!("IP geolocation for {:?} returned no city or country", ip);
                GeoLabel::unknown()
            }
            Err(e) => {
                warn!("Error using IP geolocation service at {}: {}", endpoint, e);
                GeoLabel::unknown()
            }
        }
    }

    async fn lookup(&self, endpoint: &str) -> Result<Option<GeoLabel>> {
        let res = self
            .client
            .get(endpoint)
            .header(header::CACHE_CONTROL, "no-store")
            .send()
            .await?
            .error_for_status()?
            .json::<IpApiResponse>()
            .await?;

        Ok(GeoLabel::compose(
            res.city.as_deref(),
            res.country_name.as_deref(),
        ))
    }
}
