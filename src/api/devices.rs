use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    inventory::model::{DeviceRegisterRequest, HostQuery, NodeQuery, PodQuery, RegistrationOutcome},
    AppState,
};

/// POST /api/devices/register
pub async fn register_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceRegisterRequest>,
) -> impl IntoResponse {
    match state.devices().register(&req).await {
        Ok(registration) => {
            let status = match registration.outcome {
                RegistrationOutcome::Created { .. } => StatusCode::CREATED,
                _ => StatusCode::OK,
            };
            (status, Json(registration)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/devices/hosts
pub async fn list_hosts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HostQuery>,
) -> impl IntoResponse {
    match state.devices().list_hosts(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/devices/nodes
pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NodeQuery>,
) -> impl IntoResponse {
    match state.devices().list_nodes(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/devices/pods
pub async fn list_pods(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PodQuery>,
) -> impl IntoResponse {
    match state.devices().list_pods(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/devices/:id
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.devices().by_id(id).await {
        Ok(device) => Json(device).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/devices/:id/ban
pub async fn ban_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.devices().ban(id).await {
        Ok(device) => Json(device).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/devices/:id/unban
pub async fn unban_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.devices().unban(id).await {
        Ok(device) => Json(device).into_response(),
        Err(e) => e.into_response(),
    }
}
