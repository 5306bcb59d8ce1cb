use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_timestamp, parse_uuid, to_json};
use crate::db::DatabaseError;
use crate::models::Medication;

const COLUMNS: &str = "id, patient_id, name, dosage, frequency, timing, instructions, \
     start_date, duration, active, calendar_event_ids, created_at, updated_at";

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, patient_id, name, dosage, frequency, timing,
         instructions, start_date, duration, active, calendar_event_ids,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            med.id.to_string(),
            med.patient_id.to_string(),
            med.name,
            med.dosage,
            med.frequency,
            to_json("timing", &med.timing)?,
            med.instructions,
            med.start_date.to_string(),
            med.duration,
            med.active as i32,
            to_json("calendar_event_ids", &med.calendar_event_ids)?,
            med.created_at.to_rfc3339(),
            med.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM medications WHERE id = ?1"),
            params![id.to_string()],
            row_to_raw,
        )
        .optional()?;
    raw.map(medication_from_raw).transpose()
}

/// A patient's medications; active ones first, then by name.
pub fn list_medications_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM medications
         WHERE patient_id = ?1 ORDER BY active DESC, name ASC"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], row_to_raw)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_raw(row?)?);
    }
    Ok(meds)
}

/// Store the calendar event ids created for a medication's reminders.
pub fn set_calendar_events(
    conn: &Connection,
    id: &Uuid,
    event_ids: &[String],
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medications SET calendar_event_ids = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            to_json("calendar_event_ids", &event_ids)?,
            Utc::now().to_rfc3339(),
            id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "medication".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ── Row mapping ─────────────────────────────────────────────

struct RawMedication {
    id: String,
    patient_id: String,
    name: String,
    dosage: String,
    frequency: String,
    timing: String,
    instructions: Option<String>,
    start_date: String,
    duration: Option<String>,
    active: i32,
    calendar_event_ids: String,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMedication> {
    Ok(RawMedication {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        dosage: row.get(3)?,
        frequency: row.get(4)?,
        timing: row.get(5)?,
        instructions: row.get(6)?,
        start_date: row.get(7)?,
        duration: row.get(8)?,
        active: row.get(9)?,
        calendar_event_ids: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn medication_from_raw(raw: RawMedication) -> Result<Medication, DatabaseError> {
    let start_date = NaiveDate::parse_from_str(&raw.start_date, "%Y-%m-%d").map_err(|e| {
        DatabaseError::CorruptColumn {
            column: "start_date",
            reason: e.to_string(),
        }
    })?;

    Ok(Medication {
        id: parse_uuid("id", &raw.id)?,
        patient_id: parse_uuid("patient_id", &raw.patient_id)?,
        name: raw.name,
        dosage: raw.dosage,
        frequency: raw.frequency,
        timing: from_json("timing", &raw.timing)?,
        instructions: raw.instructions,
        start_date,
        duration: raw.duration,
        active: raw.active != 0,
        calendar_event_ids: from_json("calendar_event_ids", &raw.calendar_event_ids)?,
        created_at: parse_timestamp("created_at", &raw.created_at)?,
        updated_at: parse_timestamp("updated_at", &raw.updated_at)?,
    })
}
