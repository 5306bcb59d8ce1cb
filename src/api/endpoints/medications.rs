//! Medication endpoints: patient medication list and reminder sync.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, run_blocking, ApiContext};
use crate::calendar::{sync_medication, SyncReport, SyncStatus};
use crate::db::repository::{
    get_medication, insert_medication, list_medications_for_patient, set_calendar_events,
};
use crate::models::{Medication, NewMedication};

/// `GET /api/patients/:id/medications`
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let patient_id = parse_id("patient", &patient_id)?;

    let medications = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        list_medications_for_patient(&conn, &patient_id).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(medications))
}

/// `POST /api/patients/:id/medications`
pub async fn add(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    Json(request): Json<NewMedication>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    let patient_id = parse_id("patient", &patient_id)?;
    if request.name.trim().is_empty() || request.dosage.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and dosage must not be empty".into(),
        ));
    }

    let medication = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        let medication = request.into_medication(patient_id);
        insert_medication(&conn, &medication)?;
        Ok(medication)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(medication)))
}

/// `POST /api/medications/:id/reminders`: create calendar reminders for
/// a medication's dose times and remember the created event ids.
pub async fn reminders(
    State(ctx): State<ApiContext>,
    Path(medication_id): Path<String>,
) -> Result<Json<SyncReport>, ApiError> {
    let medication_id = parse_id("medication", &medication_id)?;

    let report = run_blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        let medication = get_medication(&conn, &medication_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("Medication not found: {medication_id}"))
        })?;

        let report = sync_medication(core.calendar(), medication.patient_id, &medication);
        if matches!(report.status, SyncStatus::Synced { .. }) {
            set_calendar_events(&conn, &medication_id, &report.event_ids)?;
        }
        Ok(report)
    })
    .await?;

    Ok(Json(report))
}
