//! Geo-enrichment of raw connection snapshots and map weights
//!
//! Each distinct destination IP is resolved through the [`GeoCache`]. All
//! resolutions for a cycle are issued together and awaited before anything is
//! returned, so a sink never sees a partially located map.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::geo::centroids::country_centroid;
use crate::geo::{GeoCache, GeoRecord};
use crate::stats::Rollup;

/// One weighted point for the heat/marker map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    pub total_bytes: u64,
    pub weight: f64,
}

/// How total bytes become a map weight: `ln(T + 1) / divisor`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weighting {
    /// Constant divisor
    Fixed(f64),
    /// Divisor `ln(max + 1)` over the cycle's locations, so weights land in `[0, 1]`
    RelativeToMax,
}

impl Default for Weighting {
    fn default() -> Self {
        Self::Fixed(10.0)
    }
}

impl Weighting {
    fn divisor(&self, max_total: u64) -> f64 {
        let divisor = match self {
            Self::Fixed(divisor) => *divisor,
            Self::RelativeToMax => ((max_total as f64) + 1.0).ln(),
        };
        if divisor.is_finite() && divisor > 0.0 {
            divisor
        } else {
            1.0
        }
    }

    pub fn weight(&self, total_bytes: u64, max_total: u64) -> f64 {
        ((total_bytes as f64) + 1.0).ln() / self.divisor(max_total)
    }
}

/// Location-dependent output for one raw snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub countries: Rollup,
    pub locations: BTreeMap<String, GeoRecord>,
    pub map_points: Vec<MapPoint>,
}

/// Resolve every IP of an already-built IP rollup and fold its traffic by country
pub async fn enrich(ips: &Rollup, cache: &GeoCache, weighting: Weighting) -> Enrichment {
    let resolved = join_all(ips.iter().map(|(ip, _)| async move {
        (ip.clone(), cache.resolve(ip).await)
    }))
    .await;
    let locations: BTreeMap<String, GeoRecord> = resolved.into_iter().collect();

    let mut countries = Rollup::new();
    let mut located = Vec::with_capacity(locations.len());
    for (ip, entry) in ips.iter() {
        let Some(geo) = locations.get(ip) else {
            continue;
        };
        countries.merge(&geo.country_name, entry);
        located.push((ip.clone(), geo.latitude, geo.longitude, entry.total_bytes()));
    }

    Enrichment {
        countries,
        locations,
        map_points: weigh(located, weighting),
    }
}

/// Map points for a pre-aggregated snapshot, placed on country centroids
pub fn country_points(countries: &Rollup, weighting: Weighting) -> Vec<MapPoint> {
    let located = countries
        .iter()
        .filter_map(|(code, entry)| {
            let (name, latitude, longitude) = country_centroid(code)?;
            Some((name.to_string(), latitude, longitude, entry.total_bytes()))
        })
        .collect();
    weigh(located, weighting)
}

fn weigh(located: Vec<(String, f64, f64, u64)>, weighting: Weighting) -> Vec<MapPoint> {
    let max_total = located.iter().map(|(.., total)| *total).max().unwrap_or(0);

    located
        .into_iter()
        .filter(|(.., total)| *total > 0)
        .map(|(label, latitude, longitude, total_bytes)| MapPoint {
            weight: weighting.weight(total_bytes, max_total),
            label,
            latitude,
            longitude,
            total_bytes,
        })
        .collect()
}
