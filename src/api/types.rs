//! Shared types for the API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Parse a path/body identifier, mapping failures to a 400.
pub fn parse_id(kind: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {kind} ID: {e}")))
}

/// Run a blocking core operation off the async runtime.
///
/// The core is synchronous (SQLite access plus blocking HTTP clients);
/// handlers hop onto the blocking pool for the duration of the call.
pub async fn run_blocking<T, F>(core: Arc<CoreState>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CoreState) -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(core.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
