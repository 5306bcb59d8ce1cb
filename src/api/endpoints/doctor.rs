//! Doctor-facing endpoints: the review queue and the decision gate.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, run_blocking, ApiContext};
use crate::models::MedicalTicket;
use crate::pipeline::stages::CarePlan;
use crate::review::{self, ApproveOutcome, RejectOutcome, TicketQueueEntry};

#[derive(Deserialize)]
pub struct ApproveRequest {
    pub doctor_id: Uuid,
    pub notes: Option<String>,
    pub modifications: Option<CarePlan>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub doctor_id: Uuid,
    pub notes: Option<String>,
}

/// `GET /api/doctor/queue`: pending tickets, most urgent first.
pub async fn queue(
    State(ctx): State<ApiContext>,
) -> Result<Json<Vec<TicketQueueEntry>>, ApiError> {
    let entries = run_blocking(ctx.core.clone(), |core| {
        let conn = core.open_db()?;
        review::list_queue(&conn).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(entries))
}

/// `GET /api/doctor/tickets/:id`
pub async fn ticket(
    State(ctx): State<ApiContext>,
    Path(ticket_id): Path<String>,
) -> Result<Json<MedicalTicket>, ApiError> {
    let ticket_id = parse_id("ticket", &ticket_id)?;

    let ticket = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        review::get_ticket_detail(&conn, ticket_id).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(ticket))
}

/// `POST /api/doctor/tickets/:id/approve`
///
/// A calendar sync failure is reported in the outcome body, never as an
/// error status: the medical decision stands on its own.
pub async fn approve(
    State(ctx): State<ApiContext>,
    Path(ticket_id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<ApproveOutcome>, ApiError> {
    let ticket_id = parse_id("ticket", &ticket_id)?;

    if let Some(modifications) = &request.modifications {
        if let Err(reason) = modifications.validate() {
            return Err(ApiError::BadRequest(format!(
                "invalid plan modifications: {reason}"
            )));
        }
    }

    let outcome = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        review::approve(
            &conn,
            ticket_id,
            request.doctor_id,
            request.notes.as_deref(),
            request.modifications,
            core.calendar(),
        )
        .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(outcome))
}

/// `POST /api/doctor/tickets/:id/reject`
pub async fn reject(
    State(ctx): State<ApiContext>,
    Path(ticket_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<RejectOutcome>, ApiError> {
    let ticket_id = parse_id("ticket", &ticket_id)?;

    let outcome = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        review::reject(
            &conn,
            ticket_id,
            request.doctor_id,
            request.notes.as_deref(),
        )
        .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(outcome))
}
