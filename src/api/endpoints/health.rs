//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext};
use crate::config::APP_VERSION;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// `GET /api/health`
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = run_blocking(ctx.core.clone(), |core| {
        Ok(match core.open_db() {
            Ok(_) => "ok",
            Err(_) => "unreachable",
        })
    })
    .await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: APP_VERSION,
        database,
    }))
}
