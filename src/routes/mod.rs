//! Route gateway: merges every sub-router and attaches the shared state.

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse,
    response::Response, Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::{AlertPipeline, Config, PgStore, VematError};

mod alerts;
mod epi_weeks;
mod health;
mod nodes;
mod readings;

// ---

/// Default page size of list endpoints.
const DEFAULT_LIMIT: i64 = 50;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub store: PgStore,
    pub config: Config,
    pub alerts: Arc<AlertPipeline>,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(nodes::router())
        .merge(epi_weeks::router())
        .merge(alerts::router())
        .merge(health::router())
        .with_state(state)
}

/// Map a domain error to a JSON error response.
fn error_response(context: &str, err: VematError) -> Response {
    // ---
    let status = match err {
        VematError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("{}: {}", context, err);
    }

    (
        status,
        Json(json!({ "success": false, "error": context, "details": err.to_string() })),
    )
        .into_response()
}

/// A body axum could not decode is invalid input like any other.
fn rejection_response(context: &str, rejection: JsonRejection) -> Response {
    error_response(context, VematError::invalid(rejection.body_text()))
}
