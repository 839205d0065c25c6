//! Geolocation over the dashboard's `/api/ipgeo` endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{GeoLookup, GeoLookupError, GeoRecord, UNKNOWN_PLACE};

/// Body of `GET /api/ipgeo?ip=<address>`
#[derive(Debug, Deserialize)]
struct IpGeoResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

impl IpGeoResponse {
    fn into_record(self, ip: &str) -> Result<GeoRecord, GeoLookupError> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(GeoLookupError::Malformed(format!("missing coordinates for {}", ip)));
        };

        let record = GeoRecord {
            latitude,
            longitude,
            country_name: non_blank(self.country_name),
            city: non_blank(self.city),
        };
        if !record.has_valid_coordinates() {
            return Err(GeoLookupError::Malformed(format!(
                "coordinates ({}, {}) out of range for {}",
                latitude, longitude, ip
            )));
        }
        Ok(record)
    }
}

fn non_blank(value: Option<String>) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_PLACE.to_string())
}

pub struct HttpGeoLookup {
    client: Client,
    url: String,
}

impl HttpGeoLookup {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    async fn lookup(&self, ip: &str) -> Result<GeoRecord, GeoLookupError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("ip", ip)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoLookupError::Status(status));
        }

        let body = response.bytes().await?;
        let parsed: IpGeoResponse = serde_json::from_slice(&body)
            .map_err(|e| GeoLookupError::Malformed(e.to_string()))?;
        parsed.into_record(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoCache;
    use axum::{
        extract::Query,
        http::StatusCode as ServerStatus,
        response::{IntoResponse, Response},
        routing::get,
        Router,
    };
    use std::collections::HashMap;
    use std::sync::Arc;

    /// `/api/ipgeo` stand-in: one known IP, one server error, garbage otherwise
    async fn ipgeo(Query(params): Query<HashMap<String, String>>) -> Response {
        match params.get("ip").map(String::as_str) {
            Some("8.8.8.8") => r#"{"country_name":"United States","city":"Mountain View","latitude":37.386,"longitude":-122.0838}"#
                .into_response(),
            Some("1.1.1.1") => (ServerStatus::INTERNAL_SERVER_ERROR, "boom").into_response(),
            _ => "not json".into_response(),
        }
    }

    async fn serve() -> HttpGeoLookup {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/api/ipgeo", get(ipgeo));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        HttpGeoLookup::new(Client::new(), format!("http://{}/api/ipgeo", addr))
    }

    #[tokio::test]
    async fn http_replies_map_to_lookup_results() {
        let lookup = serve().await;

        let record = lookup.lookup("8.8.8.8").await.unwrap();
        assert_eq!(record.country_name, "United States");
        assert_eq!(record.city, "Mountain View");

        match lookup.lookup("1.1.1.1").await {
            Err(GeoLookupError::Status(status)) => assert_eq!(status.as_u16(), 500),
            other => panic!("expected status error, got {:?}", other),
        }

        assert!(matches!(
            lookup.lookup("77.88.55.88").await,
            Err(GeoLookupError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn failed_http_lookups_fall_back_to_unknown() {
        let cache = GeoCache::new(Arc::new(serve().await), Some(9));

        assert_eq!(cache.resolve("8.8.8.8").await.country_name, "United States");
        for ip in ["1.1.1.1", "77.88.55.88"] {
            let record = cache.resolve(ip).await;
            assert_eq!(record.country_name, UNKNOWN_PLACE);
            assert_eq!(record.city, UNKNOWN_PLACE);
            assert!(record.has_valid_coordinates());
        }
    }

    fn parse(body: &str) -> Result<GeoRecord, GeoLookupError> {
        let parsed: IpGeoResponse = serde_json::from_str(body).unwrap();
        parsed.into_record("8.8.8.8")
    }

    #[test]
    fn maps_country_name_field() {
        let record = parse(
            r#"{"ip":"8.8.8.8","country_code2":"US","country_name":"United States","city":"Mountain View","latitude":37.386,"longitude":-122.0838}"#,
        )
        .unwrap();

        assert_eq!(record.country_name, "United States");
        assert_eq!(record.city, "Mountain View");
        assert_eq!(record.latitude, 37.386);
    }

    #[test]
    fn missing_names_become_unknown() {
        let record = parse(r#"{"latitude":1.0,"longitude":2.0,"city":""}"#).unwrap();
        assert_eq!(record.country_name, UNKNOWN_PLACE);
        assert_eq!(record.city, UNKNOWN_PLACE);
    }

    #[test]
    fn missing_or_invalid_coordinates_are_malformed() {
        assert!(matches!(
            parse(r#"{"country_name":"Nowhere"}"#),
            Err(GeoLookupError::Malformed(_))
        ));
        assert!(matches!(
            parse(r#"{"latitude":95.0,"longitude":0.0}"#),
            Err(GeoLookupError::Malformed(_))
        ));
    }
}
