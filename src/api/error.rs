//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::pipeline::workflow::WorkflowError;
use crate::pipeline::AgentError;
use crate::review::ReviewError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Concurrent update, retry the request")]
    Conflict,
    #[error("Reasoning service unavailable: {0}")]
    AgentUnavailable(String),
    #[error("Reasoning service returned malformed output: {0}")]
    AgentMalformed(String),
    #[error("Ticket already decided: {0}")]
    TicketDecided(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::InvalidState(detail) => {
                (StatusCode::CONFLICT, "INVALID_STATE", detail.clone())
            }
            ApiError::Conflict => (
                StatusCode::CONFLICT,
                "CONFLICT",
                "The record was modified concurrently; retry the request".to_string(),
            ),
            ApiError::AgentUnavailable(detail) => {
                tracing::warn!(detail, "Agent unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "AGENT_UNAVAILABLE",
                    "The assistant is temporarily unavailable, please retry".to_string(),
                )
            }
            ApiError::AgentMalformed(detail) => {
                tracing::error!(detail, "Agent returned malformed output");
                (
                    StatusCode::BAD_GATEWAY,
                    "AGENT_MALFORMED",
                    "The assistant returned an unusable reply, please retry".to_string(),
                )
            }
            ApiError::TicketDecided(detail) => {
                (StatusCode::CONFLICT, "TICKET_DECIDED", detail.clone())
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(_) => ApiError::NotFound(err.to_string()),
            WorkflowError::InvalidState { .. } => ApiError::InvalidState(err.to_string()),
            WorkflowError::Conflict => ApiError::Conflict,
            WorkflowError::Agent(agent) => agent.into(),
            WorkflowError::Database(e) => ApiError::Internal(e.to_string()),
            WorkflowError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match &err {
            AgentError::Unavailable(_) => ApiError::AgentUnavailable(err.to_string()),
            AgentError::MalformedOutput { .. } => ApiError::AgentMalformed(err.to_string()),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::TicketNotFound(_) => ApiError::NotFound(err.to_string()),
            ReviewError::TicketAlreadyDecided(_) => ApiError::TicketDecided(err.to_string()),
            ReviewError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        match err {
            crate::db::DatabaseError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            crate::db::DatabaseError::StaleWrite { .. } => ApiError::Conflict,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    use crate::models::enums::ConsultationStage;
    use crate::pipeline::stages::StageKind;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::from(WorkflowError::NotFound(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn invalid_state_returns_409() {
        let err = ApiError::from(WorkflowError::InvalidState {
            operation: "request_plan",
            stage: ConsultationStage::Interviewing,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_STATE");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("request_plan"));
    }

    #[tokio::test]
    async fn agent_unavailable_returns_503_with_retry_message() {
        let err = ApiError::from(AgentError::Unavailable("connection refused".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AGENT_UNAVAILABLE");
        // Upstream details stay in the logs, not the client message
        assert!(json["error"]["message"].as_str().unwrap().contains("retry"));
        assert!(!json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn agent_malformed_returns_502() {
        let err = ApiError::from(AgentError::MalformedOutput {
            stage: StageKind::Analysis,
            reason: "missing severity".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AGENT_MALFORMED");
    }

    #[tokio::test]
    async fn ticket_decided_returns_409() {
        let err = ApiError::from(ReviewError::TicketAlreadyDecided(Uuid::new_v4()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "TICKET_DECIDED");
    }

    #[tokio::test]
    async fn conflict_returns_409() {
        let response = ApiError::from(WorkflowError::Conflict).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("secret details".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn bad_request_returns_400() {
        let response = ApiError::BadRequest("Invalid consultation ID".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
