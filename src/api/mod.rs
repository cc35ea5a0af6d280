pub mod devices;
pub mod kubernetes;

use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        // Registration
        .route("/api/devices/register", post(devices::register_device))
        // Inventory
        .route("/api/devices/hosts", get(devices::list_hosts))
        .route("/api/devices/nodes", get(devices::list_nodes))
        .route("/api/devices/pods", get(devices::list_pods))
        .route("/api/devices/:id", get(devices::get_device))
        .route("/api/devices/:id/ban", post(devices::ban_device))
        .route("/api/devices/:id/unban", post(devices::unban_device))
        // Kubernetes
        .route("/api/kubernetes/statistics", get(kubernetes::statistics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
