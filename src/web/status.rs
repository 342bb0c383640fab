//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::trace;
use ts_rs::TS;

use crate::data::models::{RunKind, RunStatus};
use crate::data::scrape_runs;
use crate::state::{AppState, ServiceStatus};
use crate::web::error::{ApiError, db_error};

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LastRunInfo {
    pub kind: RunKind,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_added: i32,
    pub records_updated: i32,
    pub records_deleted: i32,
}

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusResponse {
    pub status: ServiceStatus,
    pub version: String,
    pub commit: String,
    pub services: BTreeMap<String, ServiceStatus>,
    pub last_run: Option<LastRunInfo>,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Status endpoint showing service health and the most recent pipeline run.
pub(super) async fn status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut services = BTreeMap::new();
    for (name, svc_status) in state.service_statuses.all() {
        services.insert(name, svc_status);
    }

    let overall_status = if services
        .values()
        .any(|s| matches!(s, ServiceStatus::Error))
    {
        ServiceStatus::Error
    } else if services.is_empty() {
        ServiceStatus::Disabled
    } else {
        ServiceStatus::Active
    };

    let last_run = scrape_runs::latest(&state.db_pool)
        .await
        .map_err(db_error)?
        .map(|run| LastRunInfo {
            kind: run.kind,
            status: run.status,
            started_at: run.started_at,
            completed_at: run.completed_at,
            records_added: run.records_added,
            records_updated: run.records_updated,
            records_deleted: run.records_deleted,
        });

    Ok(Json(StatusResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        services,
        last_run,
    }))
}
