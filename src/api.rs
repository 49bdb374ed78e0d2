//! HTTP surface of the ingestion host: manual trigger, run status and the
//! configured keyword/platform lists. Reporting consumers read the database
//! directly; nothing here serves stored articles.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::orchestrator::RunSummary;
use crate::ingest::scheduler::{Scheduler, TriggerStatus};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/fetch", post(trigger_fetch))
        .route("/api/status", get(status))
        .route("/api/keywords", get(keywords))
        .route("/api/platforms", get(platforms))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct TriggerResp {
    status: TriggerStatus,
    message: &'static str,
}

async fn trigger_fetch(State(state): State<AppState>) -> Json<TriggerResp> {
    let status = state.scheduler.trigger();
    let message = match status {
        TriggerStatus::Started => "Data fetch started in background.",
        TriggerStatus::AlreadyRunning => "A fetch is already running.",
    };
    Json(TriggerResp { status, message })
}

#[derive(serde::Serialize)]
struct StatusResp {
    running: bool,
    last_run: Option<RunSummary>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    Json(StatusResp {
        running: state.scheduler.is_running(),
        last_run: state.scheduler.last_run(),
    })
}

#[derive(serde::Serialize)]
struct KeywordsResp {
    keywords: Vec<String>,
}

async fn keywords(State(state): State<AppState>) -> Json<KeywordsResp> {
    Json(KeywordsResp {
        keywords: state.scheduler.keywords().to_vec(),
    })
}

#[derive(serde::Serialize)]
struct PlatformsResp {
    platforms: Vec<String>,
}

async fn platforms(State(state): State<AppState>) -> Json<PlatformsResp> {
    Json(PlatformsResp {
        platforms: state.scheduler.platforms(),
    })
}
