//! One cycle's finished dashboard data

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::enrich::{country_points, enrich, MapPoint, Weighting};
use crate::geo::{GeoCache, GeoRecord};
use crate::stats::{aggregate, Rollup, StatsSnapshot, Totals};

/// Everything the sinks need to redraw, built from a single snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub totals: Totals,
    pub users: Rollup,
    pub apis: Rollup,
    pub countries: Rollup,
    pub ips: Rollup,
    pub locations: BTreeMap<String, GeoRecord>,
    pub map_points: Vec<MapPoint>,
    pub generated_at: DateTime<Utc>,
}

impl DashboardView {
    /// Aggregate a snapshot, geo-enriching it when it carries raw connections
    pub async fn build(snapshot: &StatsSnapshot, cache: &GeoCache, weighting: Weighting) -> Self {
        let agg = aggregate(snapshot);

        let (countries, locations, map_points) = match snapshot {
            StatsSnapshot::Raw(_) => {
                let enrichment = enrich(&agg.ips, cache, weighting).await;
                (enrichment.countries, enrichment.locations, enrichment.map_points)
            }
            StatsSnapshot::Aggregated(_) => {
                let points = country_points(&agg.countries, weighting);
                (agg.countries, BTreeMap::new(), points)
            }
        };

        Self {
            totals: agg.totals,
            users: agg.users,
            apis: agg.apis,
            countries,
            ips: agg.ips,
            locations,
            map_points,
            generated_at: Utc::now(),
        }
    }

    /// Country and city label for an IP row, e.g. `"Sydney, Australia"`
    pub fn place_of(&self, ip: &str) -> Option<String> {
        self.locations
            .get(ip)
            .map(|geo| format!("{}, {}", geo.city, geo.country_name))
    }
}
