//! Dashboard web surface: latest view as JSON, live updates over SSE

mod middleware;
mod routes;
mod sse;

use anyhow::Result;
use axum::{routing::get, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::ServerConfig;
use crate::events::{DashboardEvent, EventBus};
use crate::sinks::{CycleNotice, RenderSink};
use crate::view::DashboardView;

/// What `/api/dashboard` returns
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub view: Option<DashboardView>,
    pub notice: Option<CycleNotice>,
}

/// Web render sink: keeps the last good view and the current notice
pub struct DashboardState {
    latest: RwLock<DashboardSnapshot>,
    event_bus: EventBus,
}

impl DashboardState {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            latest: RwLock::new(DashboardSnapshot::default()),
            event_bus,
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

impl RenderSink for DashboardState {
    fn render(&self, view: &DashboardView) {
        {
            let mut latest = self.latest.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            latest.view = Some(view.clone());
            latest.notice = None;
        }
        self.event_bus.publish(DashboardEvent::Update(view.clone()));
    }

    fn notify(&self, notice: &CycleNotice) {
        {
            let mut latest = self.latest.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            latest.notice = Some(notice.clone());
        }
        self.event_bus.publish(DashboardEvent::Notice(notice.clone()));
    }
}

pub fn router(state: Arc<DashboardState>, static_dir: &str) -> Router {
    Router::new()
        .route("/api/dashboard", get(routes::api_dashboard))
        .route("/events", get(sse::events_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(routes::not_found)
        .layer(middleware::RequestLoggingLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: &ServerConfig, state: Arc<DashboardState>) -> Result<()> {
    let app = router(state, &config.static_dir);

    let addr = format!("{}:{}", config.host, config.http_port);
    info!("Dashboard server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
