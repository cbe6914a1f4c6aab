//! Coordinate to "City, Country" resolution through a Nominatim-compatible
//! reverse geocoding service.

use crate::models::GeoLabel;
use color_eyre::Result;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl Address {
    fn settlement(&self) -> Option<&str> {
        [
            &self.city,
            &self.town,
            &self.village,
            &self.municipality,
            &self.county,
        ]
        .into_iter()
        .filter_map(|s| s.as_deref())
        .find(|s| !s.trim().is_empty())
    }
}

pub struct ReverseGeocoder {
    client: Client,
    base_url: String,
    language: String,
}

impl ReverseGeocoder {
    pub fn new(client: Client, base_url: &str, language: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }

    /// Resolves coordinates to a label. Every failure yields [`GeoLabel::unknown`].
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> GeoLabel {
        match self.lookup(lat, lon).await {
            Ok(Some(label)) => {
                debug!("Reverse geocoded ({}, {}) to {}", lat, lon, label);
                label
            }
            Ok(None) => {
                warn!("Reverse geocoder returned no address for ({}, {})", lat, lon);
                GeoLabel::unknown()
            }
            Err(e) => {
                warn!("Reverse geocoding of ({}, {}) failed: {}", lat, lon, e);
                GeoLabel::unknown()
            }
        }
    }

    async fn lookup(&self, lat: f64, lon: f64) -> Result<Option<GeoLabel>> {
        let url = format!("{}/reverse", self.base_url);
        let res = self
            .client
            .get(url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("zoom", "10".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .header(header::ACCEPT_LANGUAGE, &self.language)
            .header(header::CACHE_CONTROL, "no-store")
            .send()
            .await?
            .error_for_status()?
            .json::<ReverseResponse>()
            .await?;

        let address = res.address.unwrap_or_default();
        Ok(GeoLabel::compose(
            address.settlement(),
            address.country.as_deref(),
        ))
    }
}
