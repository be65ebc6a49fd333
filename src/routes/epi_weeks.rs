use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{error_response, AppState};
use crate::aggregate_by_epi_week;
use crate::epi_week::epi_week_from_str;

// ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/epi-weeks", get(handler))
        .route("/api/epi-weeks/of", get(of_date_handler))
}

#[derive(Debug, Deserialize)]
pub struct EpiWeeksQuery {
    node_id: Option<String>,
}

/// `GET /api/epi-weeks` – per-week avg/min/max, only weeks with data.
async fn handler(
    Query(params): Query<EpiWeeksQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let readings = match state.store.readings_for(params.node_id.as_deref()).await {
        Ok(readings) => readings,
        Err(e) => return error_response("Failed to fetch readings", e),
    };

    let weeks = aggregate_by_epi_week(&readings);
    debug!(
        "Aggregated {} readings into {} epi weeks",
        readings.len(),
        weeks.len()
    );

    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": weeks, "total": weeks.len() })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct OfDateQuery {
    date: String,
}

/// `GET /api/epi-weeks/of?date=2024-01-07` – epi week of one date.
async fn of_date_handler(Query(params): Query<OfDateQuery>) -> impl IntoResponse {
    // ---
    match epi_week_from_str(&params.date) {
        Ok(week) => (
            StatusCode::OK,
            Json(json!({
                "date": params.date,
                "key": week.key(),
                "name": week.label(),
                "year": week.year,
                "week": week.week,
            })),
        )
            .into_response(),
        Err(e) => error_response("Invalid date", e),
    }
}
