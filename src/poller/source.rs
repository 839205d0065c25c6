//! Where snapshots come from

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::sinks::CycleNotice;
use crate::stats::{SnapshotError, StatsSnapshot};

/// Whole-cycle failure on the stats endpoint
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("stats endpoint returned {0}")]
    Status(StatusCode),

    #[error("stats endpoint has no data yet")]
    NotFound,

    #[error("malformed snapshot: {0}")]
    Parse(#[from] SnapshotError),
}

impl FetchError {
    pub fn notice(&self) -> CycleNotice {
        match self {
            Self::NotFound => CycleNotice::NotYetAvailable,
            other => CycleNotice::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}

#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self) -> Result<StatsSnapshot, FetchError>;
}

/// `GET /api/stats`
pub struct HttpStatsSource {
    client: Client,
    url: String,
}

impl HttpStatsSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn fetch(&self) -> Result<StatsSnapshot, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(StatsSnapshot::from_slice(&body)?)
    }
}
