//! IP geolocation: providers, the per-session cache, and country centroids

pub mod cache;
pub mod centroids;
pub mod http;
pub mod maxmind;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use cache::GeoCache;
pub use http::HttpGeoLookup;
pub use maxmind::MaxMindLookup;

pub const LOCAL_COUNTRY: &str = "Local Network";
pub const LOCAL_CITY: &str = "Local Area";
pub const UNKNOWN_PLACE: &str = "Unknown";

/// Location attached to an IP address
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub country_name: String,
    pub city: String,
}

impl GeoRecord {
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Error)]
pub enum GeoLookupError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("lookup service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed location: {0}")]
    Malformed(String),

    #[error("no location for {0}")]
    NotFound(String),

    #[error("geoip database: {0}")]
    Database(String),
}

/// A source of geolocation for a single IP address
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<GeoRecord, GeoLookupError>;
}

/// Addresses that carry no public location: `192.168.*`, `10.*` and `127.0.0.1`
pub fn is_local_address(ip: &str) -> bool {
    ip.starts_with("192.168.") || ip.starts_with("10.") || ip == "127.0.0.1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ranges() {
        assert!(is_local_address("192.168.1.5"));
        assert!(is_local_address("10.0.0.1"));
        assert!(is_local_address("127.0.0.1"));
        assert!(!is_local_address("127.0.0.2"));
        assert!(!is_local_address("8.8.8.8"));
        assert!(!is_local_address("100.1.2.3"));
    }

    #[test]
    fn coordinate_bounds() {
        let mut record = GeoRecord {
            latitude: 90.0,
            longitude: -180.0,
            country_name: UNKNOWN_PLACE.to_string(),
            city: UNKNOWN_PLACE.to_string(),
        };
        assert!(record.has_valid_coordinates());
        record.latitude = 90.5;
        assert!(!record.has_valid_coordinates());
        record.latitude = f64::NAN;
        assert!(!record.has_valid_coordinates());
    }
}
