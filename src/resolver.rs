//! Best-effort location label for a log entry.
//!
//! Order of preference: the device's precise location (cached for the run
//! once obtained), then IP geolocation of the entry's source address, then
//! the "Unknown" sentinel.

use crate::geocode::ReverseGeocoder;
use crate::location::IpGeolocator;
use crate::models::GeoLabel;
use crate::precise::{PreciseGeoState, PreciseLocation};

pub struct GeoResolver {
    geocoder: ReverseGeocoder,
    ip_locator: IpGeolocator,
    precise: PreciseLocation,
}

impl GeoResolver {
    pub fn new(geocoder: ReverseGeocoder, ip_locator: IpGeolocator, precise: PreciseLocation) -> Self {
        Self {
            geocoder,
            ip_locator,
            precise,
        }
    }

    pub fn has_device_location(&self) -> bool {
        self.precise.has_capability()
    }

    pub fn precise_state(&self) -> &PreciseGeoState {
        self.precise.state()
    }

    pub async fn acquire_precise_location(&mut self) -> Option<GeoLabel> {
        self.precise.acquire(&self.geocoder).await
    }

    pub fn decline_precise_location(&mut self) {
        self.precise.decline();
    }

    pub async fn best_geo_label(&mut self, ip: Option<&str>) -> GeoLabel {
        if let Some(label) = self.memoized_precise() {
            return label;
        }

        if let Some(label) = self.precise.acquire(&self.geocoder).await {
            if !label.is_unknown() {
                return label;
            }
        }

        self.ip_locator.ip_geo_label(ip).await
    }

    fn memoized_precise(&self) -> Option<GeoLabel> {
        self.precise
            .state()
            .label
            .as_ref()
            .filter(|label| !label.is_unknown())
            .cloned()
    }
}
