//! Stats snapshot model and per-dimension rollups

pub mod aggregate;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub use aggregate::{aggregate, Aggregate, Totals};

/// Label used when a connection carries no user
pub const ANONYMOUS_USER: &str = "anonymous";
/// Label used when a connection carries no API
pub const UNKNOWN_API: &str = "unknown";

/// One proxied connection as reported by the stats endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionRecord {
    #[serde(default, deserialize_with = "non_empty")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub dst_ip: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub api: Option<String>,
    #[serde(default)]
    pub upload: u64,
    #[serde(default)]
    pub download: u64,
}

impl ConnectionRecord {
    pub fn user_label(&self) -> &str {
        self.user.as_deref().unwrap_or(ANONYMOUS_USER)
    }

    pub fn api_label(&self) -> &str {
        self.api.as_deref().unwrap_or(UNKNOWN_API)
    }
}

/// Treat `""` and `null` the same as an absent field
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Upload/download pair as found in `userStats` and `ipStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteCounts {
    #[serde(default)]
    pub upload_bytes: u64,
    #[serde(default)]
    pub download_bytes: u64,
}

/// Entry of `countryStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryCounts {
    #[serde(default)]
    pub upload_bytes: u64,
    #[serde(default)]
    pub download_bytes: u64,
    #[serde(default)]
    pub connections: u64,
}

/// Snapshot already rolled up by the server
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSnapshot {
    #[serde(default)]
    pub active_connections: u64,
    pub total_upload_bytes: u64,
    pub total_download_bytes: u64,
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_stats: HashMap<String, ByteCounts>,
    #[serde(default)]
    pub country_stats: HashMap<String, CountryCounts>,
    #[serde(default)]
    pub ip_stats: HashMap<String, ByteCounts>,
}

/// One payload from the stats endpoint, in whichever shape the server emits
#[derive(Debug, Clone, PartialEq)]
pub enum StatsSnapshot {
    Raw(Vec<ConnectionRecord>),
    Aggregated(AggregatedSnapshot),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot is not a JSON object")]
    NotAnObject,
}

impl StatsSnapshot {
    /// Parse a response body, picking the shape once by the presence of `connections`
    pub fn from_slice(body: &[u8]) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, SnapshotError> {
        let mut object = match value {
            serde_json::Value::Object(map) => map,
            _ => return Err(SnapshotError::NotAnObject),
        };

        match object.remove("connections") {
            Some(serde_json::Value::Null) => Ok(Self::Raw(Vec::new())),
            Some(connections) => Ok(Self::Raw(serde_json::from_value(connections)?)),
            None => Ok(Self::Aggregated(serde_json::from_value(
                serde_json::Value::Object(object),
            )?)),
        }
    }

    #[cfg(test)]
    pub fn connections(&self) -> Option<&[ConnectionRecord]> {
        match self {
            Self::Raw(connections) => Some(connections),
            Self::Aggregated(_) => None,
        }
    }
}

/// Aggregated traffic for one key of one dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollupEntry {
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub connections: u64,
}

impl RollupEntry {
    pub fn total_bytes(&self) -> u64 {
        self.upload_bytes.saturating_add(self.download_bytes)
    }

    pub fn add_connection(&mut self, record: &ConnectionRecord) {
        self.upload_bytes = self.upload_bytes.saturating_add(record.upload);
        self.download_bytes = self.download_bytes.saturating_add(record.download);
        self.connections = self.connections.saturating_add(1);
    }
}

impl From<ByteCounts> for RollupEntry {
    fn from(counts: ByteCounts) -> Self {
        Self {
            upload_bytes: counts.upload_bytes,
            download_bytes: counts.download_bytes,
            connections: 0,
        }
    }
}

impl From<CountryCounts> for RollupEntry {
    fn from(counts: CountryCounts) -> Self {
        Self {
            upload_bytes: counts.upload_bytes,
            download_bytes: counts.download_bytes,
            connections: counts.connections,
        }
    }
}

// totalBytes is derived, never stored
impl Serialize for RollupEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RollupEntry", 4)?;
        state.serialize_field("uploadBytes", &self.upload_bytes)?;
        state.serialize_field("downloadBytes", &self.download_bytes)?;
        state.serialize_field("totalBytes", &self.total_bytes())?;
        state.serialize_field("connections", &self.connections)?;
        state.end()
    }
}

/// Traffic keyed by one dimension (user, country, IP or API)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Rollup(BTreeMap<String, RollupEntry>);

impl Rollup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, record: &ConnectionRecord) {
        self.0.entry(key.to_string()).or_default().add_connection(record);
    }

    /// Fold an already-aggregated entry into `key`
    pub fn merge(&mut self, key: &str, entry: &RollupEntry) {
        let slot = self.0.entry(key.to_string()).or_default();
        slot.upload_bytes = slot.upload_bytes.saturating_add(entry.upload_bytes);
        slot.download_bytes = slot.download_bytes.saturating_add(entry.download_bytes);
        slot.connections = slot.connections.saturating_add(entry.connections);
    }

    pub fn get(&self, key: &str) -> Option<&RollupEntry> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RollupEntry)> {
        self.0.iter()
    }

    #[cfg(test)]
    pub fn upload_sum(&self) -> u64 {
        self.0.values().fold(0, |sum, e| sum.saturating_add(e.upload_bytes))
    }

    #[cfg(test)]
    pub fn download_sum(&self) -> u64 {
        self.0.values().fold(0, |sum, e| sum.saturating_add(e.download_bytes))
    }

    /// Entries ordered by total traffic, heaviest first; ties break on key
    pub fn sorted_by_total(&self) -> Vec<(&str, &RollupEntry)> {
        let mut entries: Vec<_> = self.0.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| b.1.total_bytes().cmp(&a.1.total_bytes()).then(a.0.cmp(b.0)));
        entries
    }

    pub fn top(&self, n: usize) -> Vec<(&str, &RollupEntry)> {
        let mut entries = self.sorted_by_total();
        entries.truncate(n);
        entries
    }
}

impl<K: Into<String>, V: Into<RollupEntry>> FromIterator<(K, V)> for Rollup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
