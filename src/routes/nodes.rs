//! Node registration: each ESP32 registers its fixed coordinates once before
//! it starts submitting readings.

use axum::{
    extract::rejection::JsonRejection, extract::State, http::StatusCode, response::IntoResponse,
    routing::post, Json, Router,
};
use serde_json::json;
use tracing::info;

use super::{error_response, rejection_response, AppState};
use crate::RawNode;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/nodes", post(handler))
}

async fn handler(
    State(state): State<AppState>,
    payload: Result<Json<RawNode>, JsonRejection>,
) -> impl IntoResponse {
    // ---
    let Json(raw) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response("Invalid node registration", rejection),
    };

    let node = match raw.validate() {
        Ok(node) => node,
        Err(e) => return error_response("Invalid node registration", e),
    };

    if let Err(e) = state.store.upsert_node(&node).await {
        return error_response("Failed to register node", e);
    }

    info!(node_id = %node.id, "Node registered at ({}, {})", node.latitude, node.longitude);
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "node_id": node.id,
            "coordinates": { "latitude": node.latitude, "longitude": node.longitude },
        })),
    )
        .into_response()
}
