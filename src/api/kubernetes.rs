use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::AppState;

/// GET /api/kubernetes/statistics
pub async fn statistics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.devices().cluster_totals().await {
        Ok(totals) => Json(totals).into_response(),
        Err(e) => e.into_response(),
    }
}
