use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_timestamp, parse_uuid, to_json};
use crate::db::DatabaseError;
use crate::models::enums::ConsultationStage;
use crate::models::{CollectedData, Consultation};
use crate::pipeline::stages::{AnalysisResult, CarePlan};

const COLUMNS: &str = "id, patient_id, stage, collected_data, analysis_result, \
     care_plan, version, created_at, updated_at";

pub fn insert_consultation(
    conn: &Connection,
    consultation: &Consultation,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO consultations (id, patient_id, stage, collected_data,
         analysis_result, care_plan, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            consultation.id.to_string(),
            consultation.patient_id.to_string(),
            consultation.stage.as_str(),
            to_json("collected_data", &consultation.collected_data)?,
            consultation
                .analysis_result
                .as_ref()
                .map(|a| to_json("analysis_result", a))
                .transpose()?,
            consultation
                .care_plan
                .as_ref()
                .map(|p| to_json("care_plan", p))
                .transpose()?,
            consultation.version,
            consultation.created_at.to_rfc3339(),
            consultation.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_consultation(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Consultation>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM consultations WHERE id = ?1"),
            params![id.to_string()],
            row_to_raw,
        )
        .optional()?;

    raw.map(consultation_from_raw).transpose()
}

/// All consultations for a patient, newest first.
pub fn list_consultations_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Consultation>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM consultations
         WHERE patient_id = ?1 ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], row_to_raw)?;

    let mut consultations = Vec::new();
    for row in rows {
        consultations.push(consultation_from_raw(row?)?);
    }
    Ok(consultations)
}

/// Persist an interview turn: the updated collected data plus the
/// (possibly advanced) stage, in one conditional write. Fails with
/// `StaleWrite` if the row's version no longer matches what was read.
pub fn update_interview(
    conn: &Connection,
    id: &Uuid,
    expected_version: i64,
    data: &CollectedData,
    stage: ConsultationStage,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE consultations
         SET collected_data = ?1, stage = ?2, version = version + 1, updated_at = ?3
         WHERE id = ?4 AND version = ?5",
        params![
            to_json("collected_data", data)?,
            stage.as_str(),
            Utc::now().to_rfc3339(),
            id.to_string(),
            expected_version,
        ],
    )?;
    stale_write_check(updated, id)
}

/// Persist the analysis artifact and advance to the planning stage in a
/// single conditional write.
pub fn store_analysis(
    conn: &Connection,
    id: &Uuid,
    expected_version: i64,
    analysis: &AnalysisResult,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE consultations
         SET analysis_result = ?1, stage = ?2, version = version + 1, updated_at = ?3
         WHERE id = ?4 AND version = ?5",
        params![
            to_json("analysis_result", analysis)?,
            ConsultationStage::Planning.as_str(),
            Utc::now().to_rfc3339(),
            id.to_string(),
            expected_version,
        ],
    )?;
    stale_write_check(updated, id)
}

/// Persist the care plan and advance to awaiting_review in a single
/// conditional write. Run inside the same transaction as the ticket
/// insert so the transition is all-or-nothing.
pub fn store_care_plan(
    conn: &Connection,
    id: &Uuid,
    expected_version: i64,
    plan: &CarePlan,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE consultations
         SET care_plan = ?1, stage = ?2, version = version + 1, updated_at = ?3
         WHERE id = ?4 AND version = ?5",
        params![
            to_json("care_plan", plan)?,
            ConsultationStage::AwaitingReview.as_str(),
            Utc::now().to_rfc3339(),
            id.to_string(),
            expected_version,
        ],
    )?;
    stale_write_check(updated, id)
}

/// Move an awaiting-review consultation to completed (doctor approval).
/// Conditional on the current stage rather than a version: the review
/// gate's single-decision ticket update already serializes callers.
pub fn complete_consultation(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE consultations
         SET stage = ?1, version = version + 1, updated_at = ?2
         WHERE id = ?3 AND stage = ?4",
        params![
            ConsultationStage::Completed.as_str(),
            Utc::now().to_rfc3339(),
            id.to_string(),
            ConsultationStage::AwaitingReview.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::StaleWrite {
            entity: "consultation",
            id: id.to_string(),
        });
    }
    Ok(())
}

fn stale_write_check(updated: usize, id: &Uuid) -> Result<(), DatabaseError> {
    if updated == 0 {
        return Err(DatabaseError::StaleWrite {
            entity: "consultation",
            id: id.to_string(),
        });
    }
    Ok(())
}

// ── Row mapping ─────────────────────────────────────────────

struct RawConsultation {
    id: String,
    patient_id: String,
    stage: String,
    collected_data: String,
    analysis_result: Option<String>,
    care_plan: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawConsultation> {
    Ok(RawConsultation {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        stage: row.get(2)?,
        collected_data: row.get(3)?,
        analysis_result: row.get(4)?,
        care_plan: row.get(5)?,
        version: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn consultation_from_raw(raw: RawConsultation) -> Result<Consultation, DatabaseError> {
    Ok(Consultation {
        id: parse_uuid("id", &raw.id)?,
        patient_id: parse_uuid("patient_id", &raw.patient_id)?,
        stage: ConsultationStage::from_str(&raw.stage)?,
        collected_data: from_json("collected_data", &raw.collected_data)?,
        analysis_result: raw
            .analysis_result
            .as_deref()
            .map(|s| from_json("analysis_result", s))
            .transpose()?,
        care_plan: raw
            .care_plan
            .as_deref()
            .map(|s| from_json("care_plan", s))
            .transpose()?,
        version: raw.version,
        created_at: parse_timestamp("created_at", &raw.created_at)?,
        updated_at: parse_timestamp("updated_at", &raw.updated_at)?,
    })
}
