//! Router construction: the unfold endpoint plus admin endpoints.

use std::sync::Arc;

use axum::routing::{get, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::health::{self, HealthService};
use crate::unfolder::{self, Unfolder};

pub const UNFOLDER_PATH: &str = "/content-collection/:collection_type/:uuid";

#[derive(Clone)]
pub struct AppState {
    pub unfolder: Arc<Unfolder>,
    pub health: Arc<HealthService>,
}

pub fn build_router(unfolder: Arc<Unfolder>, health_service: Arc<HealthService>) -> Router {
    let state = AppState {
        unfolder,
        health: health_service,
    };

    Router::new()
        .route(UNFOLDER_PATH, put(unfolder::handle))
        .route("/__health", get(health::health))
        .route("/__gtg", get(health::gtg))
        .route("/__ping", get(health::ping))
        .route("/__build-info", get(health::build_info))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
