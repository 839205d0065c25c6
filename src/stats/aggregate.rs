//! Snapshot -> totals and per-dimension rollups
//!
//! Raw snapshots are folded in a single pass. The fold is a sum per key, so the
//! result does not depend on connection order. Country rollups for raw
//! snapshots need geolocation and are filled in by [`crate::enrich`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AggregatedSnapshot, ConnectionRecord, Rollup, StatsSnapshot};

/// Global counters shown on the summary cards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub active_connections: u64,
    pub total_upload_bytes: u64,
    pub total_download_bytes: u64,
    pub unique_ips: u64,
    pub unique_apis: u64,
    pub last_update_time: Option<DateTime<Utc>>,
}

/// Output of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub totals: Totals,
    pub users: Rollup,
    pub apis: Rollup,
    pub countries: Rollup,
    pub ips: Rollup,
}

/// Normalize either snapshot shape into totals and rollups
pub fn aggregate(snapshot: &StatsSnapshot) -> Aggregate {
    match snapshot {
        StatsSnapshot::Raw(connections) => aggregate_connections(connections),
        StatsSnapshot::Aggregated(snapshot) => passthrough(snapshot),
    }
}

fn aggregate_connections(connections: &[ConnectionRecord]) -> Aggregate {
    let mut out = Aggregate::default();

    for record in connections {
        out.users.record(record.user_label(), record);
        out.apis.record(record.api_label(), record);
        if let Some(ip) = record.dst_ip.as_deref() {
            out.ips.record(ip, record);
        }
        // Counts come straight from the server; clamp instead of wrapping
        out.totals.total_upload_bytes = out.totals.total_upload_bytes.saturating_add(record.upload);
        out.totals.total_download_bytes =
            out.totals.total_download_bytes.saturating_add(record.download);
    }

    out.totals.active_connections = connections.len() as u64;
    out.totals.unique_ips = out.ips.len() as u64;
    out.totals.unique_apis = out.apis.len() as u64;
    out
}

fn passthrough(snapshot: &AggregatedSnapshot) -> Aggregate {
    let users: Rollup = snapshot.user_stats.iter().map(|(k, v)| (k.clone(), *v)).collect();
    let countries: Rollup = snapshot
        .country_stats
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    let ips: Rollup = snapshot.ip_stats.iter().map(|(k, v)| (k.clone(), *v)).collect();

    Aggregate {
        totals: Totals {
            active_connections: snapshot.active_connections,
            total_upload_bytes: snapshot.total_upload_bytes,
            total_download_bytes: snapshot.total_download_bytes,
            unique_ips: ips.len() as u64,
            unique_apis: 0,
            last_update_time: snapshot.last_update_time,
        },
        users,
        apis: Rollup::new(),
        countries,
        ips,
    }
}
