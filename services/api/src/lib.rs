pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod extractors;
pub mod notifications;
pub mod scheduler;
pub mod store;
pub mod v1;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::engine::WithdrawEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: WithdrawEngine,
}

impl AppState {
    pub fn new(engine: WithdrawEngine) -> Self {
        Self { engine }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "withdraw-api"
    }))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/v1", v1::router())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
