//! Event bus for broadcasting dashboard updates to live subscribers

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::sinks::CycleNotice;
use crate::view::DashboardView;

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DashboardEvent {
    Update(DashboardView),
    Notice(CycleNotice),
}

impl DashboardEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Notice(_) => "notice",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<DashboardEvent>>,
}

impl EventBus {
    pub fn new(sender: broadcast::Sender<Arc<DashboardEvent>>) -> Self {
        Self { sender }
    }

    pub fn publish(&self, event: DashboardEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DashboardEvent>> {
        self.sender.subscribe()
    }
}
