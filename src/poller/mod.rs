//! Poll loop: fetch -> aggregate -> enrich -> render, with backoff on failure
//!
//! ```text
//!   Idle --Start--> Fetching --Fetched------> Succeeded --Rescheduled--> Idle
//!                            \--FetchFailed-> Failed    --Rescheduled--> Idle
//! ```
//!
//! Exactly one cycle is in flight at a time. The delay before the next cycle
//! starts only once the current one has rendered or reported its failure.

pub mod source;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

use crate::enrich::Weighting;
use crate::geo::GeoCache;
use crate::sinks::{CycleNotice, SharedSink};
use crate::view::DashboardView;

pub use source::{FetchError, HttpStatsSource, StatsSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    Start,
    Fetched,
    FetchFailed,
    Rescheduled,
}

impl PollState {
    /// Transition table; `None` for events that are not valid in this state
    pub fn on(self, event: PollEvent) -> Option<PollState> {
        use PollEvent::*;
        use PollState::*;
        match (self, event) {
            (Idle, Start) => Some(Fetching),
            (Fetching, Fetched) => Some(Succeeded),
            (Fetching, FetchFailed) => Some(Failed),
            (Succeeded, Rescheduled) | (Failed, Rescheduled) => Some(Idle),
            _ => None,
        }
    }

    /// Wait before the next fetch, for the two settled states
    pub fn delay(self, intervals: &Intervals) -> Option<Duration> {
        match self {
            PollState::Succeeded => Some(intervals.normal),
            PollState::Failed => Some(intervals.backoff),
            PollState::Idle | PollState::Fetching => None,
        }
    }
}

/// Normal and failure polling intervals; backoff is never shorter than normal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub normal: Duration,
    pub backoff: Duration,
}

impl Intervals {
    pub fn new(normal: Duration, backoff: Duration) -> Self {
        Self {
            normal,
            backoff: backoff.max(normal),
        }
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(15))
    }
}

/// Waits between cycles; swapped out in tests to avoid real timers
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct Poller {
    source: Arc<dyn StatsSource>,
    cache: Arc<GeoCache>,
    sinks: Vec<SharedSink>,
    intervals: Intervals,
    weighting: Weighting,
    sleeper: Arc<dyn Sleeper>,
    state: PollState,
    cycles: u64,
}

impl Poller {
    pub fn new(
        source: Arc<dyn StatsSource>,
        cache: Arc<GeoCache>,
        sinks: Vec<SharedSink>,
        intervals: Intervals,
        weighting: Weighting,
    ) -> Self {
        Self {
            source,
            cache,
            sinks,
            intervals,
            weighting,
            sleeper: Arc::new(TokioSleeper),
            state: PollState::Idle,
            cycles: 0,
        }
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    fn advance(&mut self, event: PollEvent) {
        match self.state.on(event) {
            Some(next) => self.state = next,
            None => debug!("Ignoring {:?} in state {:?}", event, self.state),
        }
    }

    /// Run one full cycle and return the delay before the next one
    pub async fn run_cycle(&mut self) -> Duration {
        self.cycles += 1;
        let span = info_span!("cycle", n = self.cycles);
        self.cycle().instrument(span).await
    }

    async fn cycle(&mut self) -> Duration {
        self.advance(PollEvent::Start);

        match self.source.fetch().await {
            Ok(snapshot) => {
                let view = DashboardView::build(&snapshot, &self.cache, self.weighting).await;
                self.advance(PollEvent::Fetched);
                for sink in &self.sinks {
                    sink.render(&view);
                }
                let cache = self.cache.stats();
                debug!(
                    "Geo cache: {} entries, {} hits, {} misses",
                    cache.entries, cache.hits, cache.misses
                );
            }
            Err(e) => {
                self.advance(PollEvent::FetchFailed);
                let notice = e.notice();
                match notice {
                    CycleNotice::NotYetAvailable => info!("Stats endpoint has no data yet"),
                    CycleNotice::Unavailable { .. } => info!("Stats fetch failed: {}", e),
                }
                for sink in &self.sinks {
                    sink.notify(&notice);
                }
            }
        }

        self.state.delay(&self.intervals).unwrap_or(self.intervals.backoff)
    }

    /// Poll until `shutdown` resolves. Shutdown is only observed between cycles.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Polling every {:?} (backoff {:?})",
            self.intervals.normal, self.intervals.backoff
        );

        loop {
            let delay = self.run_cycle().await;
            let sleeper = self.sleeper.clone();
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Poller stopping after {} cycles ({:?})", self.cycles, self.state());
                    break;
                }
                _ = sleeper.sleep(delay) => {
                    self.advance(PollEvent::Rescheduled);
                }
            }
        }
    }
}
