//! Consultation endpoints: the patient-facing pipeline surface.
//!
//! Identities arrive as already-authenticated ids; token issuance and
//! validation live in the auth layer in front of this service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, run_blocking, ApiContext};
use crate::models::Consultation;
use crate::pipeline::stages::{AnalysisResult, CarePlan};
use crate::pipeline::workflow::InterviewReply;

#[derive(Deserialize)]
pub struct StartConsultationRequest {
    pub patient_id: Uuid,
    pub message: String,
}

#[derive(Deserialize)]
pub struct ContinueConsultationRequest {
    pub message: String,
}

/// Interview state surfaced to the client after each message.
#[derive(Serialize)]
pub struct InterviewReplyBody {
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl From<InterviewReply> for InterviewReplyBody {
    fn from(reply: InterviewReply) -> Self {
        match reply {
            InterviewReply::Question(question) => Self {
                completed: false,
                question: Some(question),
            },
            InterviewReply::InterviewComplete => Self {
                completed: true,
                question: None,
            },
        }
    }
}

#[derive(Serialize)]
pub struct StartConsultationResponse {
    pub consultation_id: Uuid,
    #[serde(flatten)]
    pub reply: InterviewReplyBody,
}

/// `POST /api/consultations`: open a consultation with the first message.
pub async fn start(
    State(ctx): State<ApiContext>,
    Json(request): Json<StartConsultationRequest>,
) -> Result<(StatusCode, Json<StartConsultationResponse>), ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let started = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        core.workflow()
            .start(&conn, request.patient_id, &request.message)
            .map_err(ApiError::from)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(StartConsultationResponse {
            consultation_id: started.consultation_id,
            reply: started.reply.into(),
        }),
    ))
}

/// `POST /api/consultations/:id/messages`: next interview message.
pub async fn message(
    State(ctx): State<ApiContext>,
    Path(consultation_id): Path<String>,
    Json(request): Json<ContinueConsultationRequest>,
) -> Result<Json<InterviewReplyBody>, ApiError> {
    let consultation_id = parse_id("consultation", &consultation_id)?;
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let reply = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        core.workflow()
            .continue_consultation(&conn, consultation_id, &request.message)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(reply.into()))
}

/// `POST /api/consultations/:id/analysis`: run (or re-read) the analysis stage.
pub async fn analysis(
    State(ctx): State<ApiContext>,
    Path(consultation_id): Path<String>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let consultation_id = parse_id("consultation", &consultation_id)?;

    let analysis = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        core.workflow()
            .request_analysis(&conn, consultation_id)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(analysis))
}

/// `POST /api/consultations/:id/plan`: run (or re-read) the planner stage.
pub async fn plan(
    State(ctx): State<ApiContext>,
    Path(consultation_id): Path<String>,
) -> Result<Json<CarePlan>, ApiError> {
    let consultation_id = parse_id("consultation", &consultation_id)?;

    let plan = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        core.workflow()
            .request_plan(&conn, consultation_id)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(plan))
}

/// `GET /api/consultations/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(consultation_id): Path<String>,
) -> Result<Json<Consultation>, ApiError> {
    let consultation_id = parse_id("consultation", &consultation_id)?;

    let consultation = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        core.workflow()
            .get(&conn, consultation_id)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(consultation))
}

/// `GET /api/patients/:id/consultations`
pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<Consultation>>, ApiError> {
    let patient_id = parse_id("patient", &patient_id)?;

    let consultations = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        core.workflow()
            .list_for_patient(&conn, patient_id)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(consultations))
}
