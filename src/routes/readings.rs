use axum::{
    extract::rejection::JsonRejection, extract::Query, extract::State, http::StatusCode,
    response::IntoResponse, routing::get, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{error_response, rejection_response, AppState, DEFAULT_LIMIT};
use crate::store::ReadingSource;
use crate::RawReading;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/readings", get(list_handler).post(create_handler))
        .route("/api/readings/latest", get(latest_handler))
}

/// `POST /api/readings` – sensor node submission.
async fn create_handler(
    State(state): State<AppState>,
    payload: Result<Json<RawReading>, JsonRejection>,
) -> impl IntoResponse {
    // ---
    let Json(raw) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected reading body: {}", rejection.body_text());
            return rejection_response("Invalid reading", rejection);
        }
    };

    let reading = match raw.validate(Utc::now()) {
        Ok(reading) => reading,
        Err(e) => {
            warn!("Rejected reading: {}", e);
            return error_response("Invalid reading", e);
        }
    };

    match state.store.node_exists(&reading.node_id).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Reading from unregistered node {}", reading.node_id);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": "Node does not exist; register it first via /api/nodes",
                    "node_id": reading.node_id,
                })),
            )
                .into_response();
        }
        Err(e) => return error_response("Failed to verify node", e),
    }

    match state.store.insert_reading(&reading).await {
        Ok(id) => {
            info!(node_id = %reading.node_id, id, "Reading stored");
            (
                StatusCode::CREATED,
                Json(json!({ "success": true, "id": id, "node_id": reading.node_id })),
            )
                .into_response()
        }
        Err(e) => error_response("Failed to store reading", e),
    }
}

/// Query parameters for listing readings
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    node_id: Option<String>,
    limit: Option<i64>,
}

/// `GET /api/readings` – newest readings joined with node location.
async fn list_handler(
    Query(params): Query<ReadingsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    debug!("GET /api/readings {:?}", params);

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    match state
        .store
        .recent_readings(params.node_id.as_deref(), limit)
        .await
    {
        Ok(readings) => {
            info!("Returning {} readings", readings.len());
            let total = readings.len();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "data": readings,
                    "total": total,
                    "timestamp": Utc::now(),
                })),
            )
                .into_response()
        }
        Err(e) => error_response("Failed to fetch readings", e),
    }
}

/// `GET /api/readings/latest`
async fn latest_handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match state.store.latest_reading().await {
        Ok(Some(reading)) => (StatusCode::OK, Json(json!(reading))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "No readings yet" })),
        )
            .into_response(),
        Err(e) => error_response("Failed to fetch latest reading", e),
    }
}
