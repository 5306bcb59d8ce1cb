use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{from_json, parse_timestamp, parse_uuid, to_json};
use crate::db::DatabaseError;
use crate::models::enums::TicketStatus;
use crate::models::MedicalTicket;
use crate::pipeline::stages::CarePlan;

const COLUMNS: &str = "id, consultation_id, patient_id, status, priority_score, summary, \
     analysis_result, care_plan, doctor_id, doctor_notes, plan_modifications, \
     created_at, reviewed_at";

pub fn insert_ticket(conn: &Connection, ticket: &MedicalTicket) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO tickets (id, consultation_id, patient_id, status, priority_score,
         summary, analysis_result, care_plan, doctor_id, doctor_notes,
         plan_modifications, created_at, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            ticket.id.to_string(),
            ticket.consultation_id.to_string(),
            ticket.patient_id.to_string(),
            ticket.status.as_str(),
            ticket.summary.priority_score,
            to_json("summary", &ticket.summary)?,
            to_json("analysis_result", &ticket.analysis_result)?,
            to_json("care_plan", &ticket.care_plan)?,
            ticket.doctor_id.map(|id| id.to_string()),
            ticket.doctor_notes,
            ticket
                .plan_modifications
                .as_ref()
                .map(|p| to_json("plan_modifications", p))
                .transpose()?,
            ticket.created_at.to_rfc3339(),
            ticket.reviewed_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

pub fn get_ticket(conn: &Connection, id: &Uuid) -> Result<Option<MedicalTicket>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM tickets WHERE id = ?1"),
            params![id.to_string()],
            row_to_raw,
        )
        .optional()?;
    raw.map(ticket_from_raw).transpose()
}

pub fn get_ticket_for_consultation(
    conn: &Connection,
    consultation_id: &Uuid,
) -> Result<Option<MedicalTicket>, DatabaseError> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM tickets WHERE consultation_id = ?1"),
            params![consultation_id.to_string()],
            row_to_raw,
        )
        .optional()?;
    raw.map(ticket_from_raw).transpose()
}

/// Pending tickets in review order: most urgent first, oldest first
/// within the same urgency.
pub fn list_pending_tickets(conn: &Connection) -> Result<Vec<MedicalTicket>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM tickets
         WHERE status = 'pending'
         ORDER BY priority_score ASC, created_at ASC"
    ))?;

    let rows = stmt.query_map([], row_to_raw)?;

    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(ticket_from_raw(row?)?);
    }
    Ok(tickets)
}

/// Record the doctor's decision as a single-shot conditional update.
///
/// Returns `false` when the ticket was already decided (the row exists
/// but is no longer pending); the caller distinguishes that from a
/// missing ticket. Decision fields are written exactly once.
pub fn decide_ticket(
    conn: &Connection,
    id: &Uuid,
    status: TicketStatus,
    doctor_id: &Uuid,
    notes: Option<&str>,
    plan_modifications: Option<&CarePlan>,
    reviewed_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE tickets
         SET status = ?1, doctor_id = ?2, doctor_notes = ?3,
             plan_modifications = ?4, reviewed_at = ?5
         WHERE id = ?6 AND status = 'pending'",
        params![
            status.as_str(),
            doctor_id.to_string(),
            notes,
            plan_modifications
                .map(|p| to_json("plan_modifications", p))
                .transpose()?,
            reviewed_at.to_rfc3339(),
            id.to_string(),
        ],
    )?;
    Ok(updated == 1)
}

// ── Row mapping ─────────────────────────────────────────────

struct RawTicket {
    id: String,
    consultation_id: String,
    patient_id: String,
    status: String,
    summary: String,
    analysis_result: String,
    care_plan: String,
    doctor_id: Option<String>,
    doctor_notes: Option<String>,
    plan_modifications: Option<String>,
    created_at: String,
    reviewed_at: Option<String>,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTicket> {
    Ok(RawTicket {
        id: row.get(0)?,
        consultation_id: row.get(1)?,
        patient_id: row.get(2)?,
        status: row.get(3)?,
        // priority_score (index 4) lives inside the summary JSON as well;
        // the column exists only for SQL-side ordering.
        summary: row.get(5)?,
        analysis_result: row.get(6)?,
        care_plan: row.get(7)?,
        doctor_id: row.get(8)?,
        doctor_notes: row.get(9)?,
        plan_modifications: row.get(10)?,
        created_at: row.get(11)?,
        reviewed_at: row.get(12)?,
    })
}

fn ticket_from_raw(raw: RawTicket) -> Result<MedicalTicket, DatabaseError> {
    Ok(MedicalTicket {
        id: parse_uuid("id", &raw.id)?,
        consultation_id: parse_uuid("consultation_id", &raw.consultation_id)?,
        patient_id: parse_uuid("patient_id", &raw.patient_id)?,
        status: TicketStatus::from_str(&raw.status)?,
        summary: from_json("summary", &raw.summary)?,
        analysis_result: from_json("analysis_result", &raw.analysis_result)?,
        care_plan: from_json("care_plan", &raw.care_plan)?,
        doctor_id: raw
            .doctor_id
            .as_deref()
            .map(|s| parse_uuid("doctor_id", s))
            .transpose()?,
        doctor_notes: raw.doctor_notes,
        plan_modifications: raw
            .plan_modifications
            .as_deref()
            .map(|s| from_json("plan_modifications", s))
            .transpose()?,
        created_at: parse_timestamp("created_at", &raw.created_at)?,
        reviewed_at: raw
            .reviewed_at
            .as_deref()
            .map(|s| parse_timestamp("reviewed_at", s))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::consultation::insert_consultation;
    use crate::models::enums::{ConsultationStage, Severity};
    use crate::models::{CollectedData, Consultation, TicketSummary};
    use crate::pipeline::stages::AnalysisResult;

    fn seed_consultation(conn: &Connection) -> Consultation {
        let now = Utc::now();
        let consultation = Consultation {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            stage: ConsultationStage::AwaitingReview,
            collected_data: CollectedData::default(),
            analysis_result: None,
            care_plan: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        insert_consultation(conn, &consultation).unwrap();
        consultation
    }

    fn new_ticket(consultation: &Consultation, severity: Severity) -> MedicalTicket {
        MedicalTicket {
            id: Uuid::new_v4(),
            consultation_id: consultation.id,
            patient_id: consultation.patient_id,
            status: TicketStatus::Pending,
            summary: TicketSummary {
                chief_complaint: "heart_disease".into(),
                key_symptoms: vec!["chest pain".into()],
                urgency: severity,
                priority_score: severity.priority_score(),
            },
            analysis_result: AnalysisResult {
                condition: "heart_disease".into(),
                severity,
                recommendations: "See a cardiologist.".into(),
                reasoning: "Exertional pain.".into(),
            },
            care_plan: CarePlan {
                daily_actions: vec!["Rest".into()],
                monitoring: vec![],
                red_flags: vec![],
                goals: vec![],
                lifestyle_changes: vec![],
            },
            doctor_id: None,
            doctor_notes: None,
            plan_modifications: None,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let consultation = seed_consultation(&conn);
        let ticket = new_ticket(&consultation, Severity::High);
        insert_ticket(&conn, &ticket).unwrap();

        let loaded = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(loaded.consultation_id, consultation.id);
        assert_eq!(loaded.status, TicketStatus::Pending);
        assert_eq!(loaded.summary.priority_score, 2);
        assert!(loaded.doctor_id.is_none());
        assert!(loaded.reviewed_at.is_none());
    }

    #[test]
    fn one_ticket_per_consultation() {
        let conn = open_memory_database().unwrap();
        let consultation = seed_consultation(&conn);
        insert_ticket(&conn, &new_ticket(&consultation, Severity::Low)).unwrap();

        let duplicate = new_ticket(&consultation, Severity::Low);
        let err = insert_ticket(&conn, &duplicate).unwrap_err();
        assert!(matches!(err, DatabaseError::Sqlite(_)));
    }

    #[test]
    fn pending_queue_ordered_by_priority_then_age() {
        let conn = open_memory_database().unwrap();

        let moderate_old = {
            let c = seed_consultation(&conn);
            let mut t = new_ticket(&c, Severity::Moderate);
            t.created_at = Utc::now() - chrono::Duration::hours(3);
            insert_ticket(&conn, &t).unwrap();
            t
        };
        let critical = {
            let c = seed_consultation(&conn);
            let t = new_ticket(&c, Severity::Critical);
            insert_ticket(&conn, &t).unwrap();
            t
        };
        let moderate_new = {
            let c = seed_consultation(&conn);
            let t = new_ticket(&c, Severity::Moderate);
            insert_ticket(&conn, &t).unwrap();
            t
        };

        let queue = list_pending_tickets(&conn).unwrap();
        let ids: Vec<Uuid> = queue.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![critical.id, moderate_old.id, moderate_new.id]);
    }

    #[test]
    fn decided_tickets_leave_the_queue() {
        let conn = open_memory_database().unwrap();
        let consultation = seed_consultation(&conn);
        let ticket = new_ticket(&consultation, Severity::High);
        insert_ticket(&conn, &ticket).unwrap();

        let doctor = Uuid::new_v4();
        let decided = decide_ticket(
            &conn,
            &ticket.id,
            TicketStatus::Approved,
            &doctor,
            Some("Plan looks appropriate."),
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(decided);
        assert!(list_pending_tickets(&conn).unwrap().is_empty());

        let loaded = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(loaded.status, TicketStatus::Approved);
        assert_eq!(loaded.doctor_id, Some(doctor));
        assert!(loaded.reviewed_at.is_some());
    }

    #[test]
    fn second_decision_is_a_no_op() {
        let conn = open_memory_database().unwrap();
        let consultation = seed_consultation(&conn);
        let ticket = new_ticket(&consultation, Severity::High);
        insert_ticket(&conn, &ticket).unwrap();

        let first_doctor = Uuid::new_v4();
        assert!(decide_ticket(
            &conn,
            &ticket.id,
            TicketStatus::Rejected,
            &first_doctor,
            Some("Needs an in-person exam first."),
            None,
            Utc::now(),
        )
        .unwrap());

        // A second decision must not overwrite the first
        let second = decide_ticket(
            &conn,
            &ticket.id,
            TicketStatus::Approved,
            &Uuid::new_v4(),
            Some("Approved"),
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(!second);

        let loaded = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(loaded.status, TicketStatus::Rejected);
        assert_eq!(loaded.doctor_id, Some(first_doctor));
        assert_eq!(
            loaded.doctor_notes.as_deref(),
            Some("Needs an in-person exam first.")
        );
    }

    #[test]
    fn plan_modifications_round_trip() {
        let conn = open_memory_database().unwrap();
        let consultation = seed_consultation(&conn);
        let ticket = new_ticket(&consultation, Severity::Moderate);
        insert_ticket(&conn, &ticket).unwrap();

        let modified = CarePlan {
            daily_actions: vec!["Walk 20 minutes".into()],
            monitoring: vec!["Heart rate".into()],
            red_flags: vec![],
            goals: vec![],
            lifestyle_changes: vec![],
        };
        decide_ticket(
            &conn,
            &ticket.id,
            TicketStatus::Approved,
            &Uuid::new_v4(),
            None,
            Some(&modified),
            Utc::now(),
        )
        .unwrap();

        let loaded = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        let mods = loaded.plan_modifications.unwrap();
        assert_eq!(mods.daily_actions, vec!["Walk 20 minutes".to_string()]);
    }
}
