//! API router.
//!
//! Returns a composable `Router` mounting every core-facing operation
//! under `/api/`. The surface does no business logic: handlers parse
//! identifiers, hop onto the blocking pool, and map core errors to
//! structured JSON bodies.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/consultations", post(endpoints::consultations::start))
        .route(
            "/consultations/:id",
            get(endpoints::consultations::detail),
        )
        .route(
            "/consultations/:id/messages",
            post(endpoints::consultations::message),
        )
        .route(
            "/consultations/:id/analysis",
            post(endpoints::consultations::analysis),
        )
        .route(
            "/consultations/:id/plan",
            post(endpoints::consultations::plan),
        )
        .route(
            "/patients/:id/consultations",
            get(endpoints::consultations::list_for_patient),
        )
        .route(
            "/patients/:id/medications",
            get(endpoints::medications::list).post(endpoints::medications::add),
        )
        .route(
            "/medications/:id/reminders",
            post(endpoints::medications::reminders),
        )
        .route("/doctor/queue", get(endpoints::doctor::queue))
        .route("/doctor/tickets/:id", get(endpoints::doctor::ticket))
        .route(
            "/doctor/tickets/:id/approve",
            post(endpoints::doctor::approve),
        )
        .route(
            "/doctor/tickets/:id/reject",
            post(endpoints::doctor::reject),
        )
        .with_state(ctx);

    Router::new().nest("/api", routes).layer(CorsLayer::permissive())
}
