//! Geolocation from a local MaxMind GeoLite2-City database

use async_trait::async_trait;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::{info, warn};

use super::{GeoLookup, GeoLookupError, GeoRecord, UNKNOWN_PLACE};

/// GeoLite2 reader; lookups fail (and fall back in the cache) when no database is loaded
pub struct MaxMindLookup {
    reader: Option<Reader<Vec<u8>>>,
}

impl MaxMindLookup {
    /// Load the database if available
    pub fn new(database_path: &str) -> Self {
        let path = Path::new(database_path);

        if !path.exists() {
            warn!("GeoIP database not found at: {}", database_path);
            warn!("Download GeoLite2-City.mmdb from MaxMind and place it at: {}", database_path);
            return Self { reader: None };
        }

        match Reader::open_readfile(path) {
            Ok(reader) => {
                info!("GeoIP database loaded: {}", database_path);
                Self { reader: Some(reader) }
            }
            Err(e) => {
                warn!("Failed to load GeoIP database: {}", e);
                Self { reader: None }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.reader.is_some()
    }

    fn lookup_sync(&self, ip: &str) -> Result<GeoRecord, GeoLookupError> {
        let reader = self
            .reader
            .as_ref()
            .ok_or_else(|| GeoLookupError::Database("database not loaded".to_string()))?;

        let addr: IpAddr = ip
            .parse()
            .map_err(|_| GeoLookupError::Malformed(format!("not an IP address: {}", ip)))?;

        let city: geoip2::City = reader
            .lookup(addr)
            .map_err(|e| GeoLookupError::Database(e.to_string()))?;

        let location = city
            .location
            .as_ref()
            .ok_or_else(|| GeoLookupError::NotFound(ip.to_string()))?;
        let (Some(latitude), Some(longitude)) = (location.latitude, location.longitude) else {
            return Err(GeoLookupError::NotFound(ip.to_string()));
        };

        let country_name = city
            .country
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en").copied())
            .unwrap_or(UNKNOWN_PLACE)
            .to_string();
        let city_name = city
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en").copied())
            .unwrap_or(UNKNOWN_PLACE)
            .to_string();

        Ok(GeoRecord {
            latitude,
            longitude,
            country_name,
            city: city_name,
        })
    }
}

#[async_trait]
impl GeoLookup for MaxMindLookup {
    async fn lookup(&self, ip: &str) -> Result<GeoRecord, GeoLookupError> {
        self.lookup_sync(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_database_fails_lookups() {
        let lookup = MaxMindLookup::new("/nonexistent/GeoLite2-City.mmdb");
        assert!(!lookup.is_available());
        assert!(matches!(
            lookup.lookup("8.8.8.8").await,
            Err(GeoLookupError::Database(_))
        ));
    }
}
