//! Alert endpoints: manual check, gate status and delivery history.

use axum::{
    extract::Query,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{error_response, AppState, DEFAULT_LIMIT};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/alerts/check", post(check_handler))
        .route("/api/alerts/status", get(status_handler))
        .route("/api/alerts/history", get(history_handler))
}

/// `POST /api/alerts/check` – run one alert cycle now.
async fn check_handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    info!("POST /api/alerts/check - running alert cycle");

    match state.alerts.run_cycle().await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "alert_sent": report.dispatched > 0,
                "report": report,
                "timestamp": Utc::now(),
            })),
        )
            .into_response(),
        Err(e) => error_response("Alert cycle failed", e),
    }
}

/// `GET /api/alerts/status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let gate = state.alerts.gate();
    let remaining = gate.remaining_at(Utc::now());
    let last_sent_at = gate.last_sent_at();

    Json(json!({
        "active": true,
        "last_alert_sent": last_sent_at,
        "cooldown_secs": gate.cooldown().as_secs(),
        "cooldown_remaining_secs": remaining.as_secs(),
        "criteria": state.alerts.criteria(),
        "notifier": state.alerts.notifier_kind(),
        "scan_interval_secs": state.config.alert_scan_interval.map(|d| d.as_secs()),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    node_id: Option<String>,
    limit: Option<i64>,
}

/// `GET /api/alerts/history` – newest first.
async fn history_handler(
    Query(params): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    match state
        .store
        .alert_history(params.node_id.as_deref(), limit)
        .await
    {
        Ok(alerts) => {
            let total = alerts.len();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "alerts": alerts, "total": total })),
            )
                .into_response()
        }
        Err(e) => error_response("Failed to fetch alert history", e),
    }
}
