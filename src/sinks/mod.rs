//! Render sinks: consumers of finished dashboard views

pub mod console;

use serde::Serialize;
use std::sync::Arc;

use crate::view::DashboardView;

pub use console::ConsoleSink;

/// Cycle-level failure shown to the user instead of a redraw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CycleNotice {
    /// Stats endpoint answered 404: the server is not producing data yet
    NotYetAvailable,
    /// Anything else that kept the cycle from completing
    Unavailable { reason: String },
}

impl std::fmt::Display for CycleNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotYetAvailable => write!(f, "statistics are not available yet"),
            Self::Unavailable { reason } => write!(f, "statistics unavailable: {}", reason),
        }
    }
}

/// Receives one complete view per successful cycle, or a notice on failure
pub trait RenderSink: Send + Sync {
    fn render(&self, view: &DashboardView);

    /// Called instead of `render`; previously rendered data stays as it is
    fn notify(&self, notice: &CycleNotice);
}

pub type SharedSink = Arc<dyn RenderSink>;
