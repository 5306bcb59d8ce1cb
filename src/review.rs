//! Doctor review gate.
//!
//! The only way a care plan becomes active: a doctor approves or
//! rejects a pending ticket. The decision is a single-shot conditional
//! update, so a ticket is decided at most once no matter how many
//! concurrent reviewers click. Approval completes the consultation and
//! triggers calendar sync; a sync failure is reported but never undoes
//! the medical decision.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::calendar::{sync_care_plan, CalendarClient, SyncReport};
use crate::db::repository::{
    complete_consultation, decide_ticket, get_ticket, list_pending_tickets,
};
use crate::db::DatabaseError;
use crate::models::enums::{Severity, TicketStatus};
use crate::models::MedicalTicket;
use crate::pipeline::stages::CarePlan;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Ticket not found: {0}")]
    TicketNotFound(Uuid),

    #[error("Ticket {0} has already been decided")]
    TicketAlreadyDecided(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result of an approval, including the non-fatal calendar outcome.
#[derive(Debug, Serialize)]
pub struct ApproveOutcome {
    pub ticket_id: Uuid,
    pub consultation_id: Uuid,
    pub calendar: SyncReport,
}

#[derive(Debug, Serialize)]
pub struct RejectOutcome {
    pub ticket_id: Uuid,
    pub consultation_id: Uuid,
}

/// Queue digest shown to doctors, most urgent first.
#[derive(Debug, Serialize)]
pub struct TicketQueueEntry {
    pub ticket_id: Uuid,
    pub consultation_id: Uuid,
    pub patient_id: Uuid,
    pub chief_complaint: String,
    pub urgency: Severity,
    pub priority_score: i32,
    pub created_at: chrono::DateTime<Utc>,
}

/// Approve a pending ticket.
///
/// The decision and the consultation completion commit together; the
/// calendar sync runs after the commit against the doctor's effective
/// plan (modifications when given, the proposed plan otherwise).
pub fn approve(
    conn: &Connection,
    ticket_id: Uuid,
    doctor_id: Uuid,
    notes: Option<&str>,
    modifications: Option<CarePlan>,
    calendar: &dyn CalendarClient,
) -> Result<ApproveOutcome, ReviewError> {
    let ticket = load(conn, ticket_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(DatabaseError::from)?;
    let decided = decide_ticket(
        &tx,
        &ticket_id,
        TicketStatus::Approved,
        &doctor_id,
        notes,
        modifications.as_ref(),
        Utc::now(),
    )?;
    if !decided {
        return Err(ReviewError::TicketAlreadyDecided(ticket_id));
    }
    complete_consultation(&tx, &ticket.consultation_id)?;
    tx.commit().map_err(DatabaseError::from)?;

    let effective_plan = modifications.as_ref().unwrap_or(&ticket.care_plan);
    let calendar_report = sync_care_plan(calendar, ticket.patient_id, effective_plan);

    tracing::info!(
        ticket_id = %ticket_id,
        consultation_id = %ticket.consultation_id,
        doctor_id = %doctor_id,
        modified = modifications.is_some(),
        calendar = ?calendar_report.status,
        "Ticket approved"
    );

    Ok(ApproveOutcome {
        ticket_id,
        consultation_id: ticket.consultation_id,
        calendar: calendar_report,
    })
}

/// Reject a pending ticket. The consultation stays at awaiting_review
/// as an audit trail; no calendar call is made.
pub fn reject(
    conn: &Connection,
    ticket_id: Uuid,
    doctor_id: Uuid,
    notes: Option<&str>,
) -> Result<RejectOutcome, ReviewError> {
    let ticket = load(conn, ticket_id)?;

    let decided = decide_ticket(
        conn,
        &ticket_id,
        TicketStatus::Rejected,
        &doctor_id,
        notes,
        None,
        Utc::now(),
    )?;
    if !decided {
        return Err(ReviewError::TicketAlreadyDecided(ticket_id));
    }

    tracing::info!(
        ticket_id = %ticket_id,
        consultation_id = %ticket.consultation_id,
        doctor_id = %doctor_id,
        "Ticket rejected"
    );

    Ok(RejectOutcome {
        ticket_id,
        consultation_id: ticket.consultation_id,
    })
}

/// The pending-review queue, most urgent first.
pub fn list_queue(conn: &Connection) -> Result<Vec<TicketQueueEntry>, ReviewError> {
    let tickets = list_pending_tickets(conn)?;
    Ok(tickets
        .into_iter()
        .map(|t| TicketQueueEntry {
            ticket_id: t.id,
            consultation_id: t.consultation_id,
            patient_id: t.patient_id,
            chief_complaint: t.summary.chief_complaint,
            urgency: t.summary.urgency,
            priority_score: t.summary.priority_score,
            created_at: t.created_at,
        })
        .collect())
}

/// Full ticket detail for the review screen.
pub fn get_ticket_detail(
    conn: &Connection,
    ticket_id: Uuid,
) -> Result<MedicalTicket, ReviewError> {
    load(conn, ticket_id)
}

fn load(conn: &Connection, ticket_id: Uuid) -> Result<MedicalTicket, ReviewError> {
    get_ticket(conn, &ticket_id)?.ok_or(ReviewError::TicketNotFound(ticket_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{MockCalendarClient, SyncStatus};
    use crate::db::open_memory_database;
    use crate::db::repository::{get_consultation, insert_consultation, insert_ticket};
    use crate::models::enums::ConsultationStage;
    use crate::models::{CollectedData, Consultation};
    use crate::pipeline::stages::AnalysisResult;
    use crate::ticket::build_ticket;

    fn sample_analysis() -> AnalysisResult {
        AnalysisResult {
            condition: "hypertension".into(),
            severity: Severity::Moderate,
            recommendations: "Review medication adherence.".into(),
            reasoning: "Elevated readings with headaches.".into(),
        }
    }

    fn sample_plan() -> CarePlan {
        CarePlan {
            daily_actions: vec!["Measure blood pressure twice daily".into()],
            monitoring: vec!["Headache frequency".into()],
            red_flags: vec!["Blood pressure above 180/120".into()],
            goals: vec![],
            lifestyle_changes: vec!["Reduce salt intake".into()],
        }
    }

    /// Seed an awaiting-review consultation plus its pending ticket.
    fn seed(conn: &Connection) -> MedicalTicket {
        let now = Utc::now();
        let mut data = CollectedData::default();
        data.condition = Some("hypertension".into());
        data.record_answer("What brings you in today?", "My blood pressure is high");

        let consultation = Consultation {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            stage: ConsultationStage::AwaitingReview,
            collected_data: data,
            analysis_result: Some(sample_analysis()),
            care_plan: Some(sample_plan()),
            version: 4,
            created_at: now,
            updated_at: now,
        };
        insert_consultation(conn, &consultation).unwrap();

        let ticket = build_ticket(&consultation, &sample_analysis(), &sample_plan());
        insert_ticket(conn, &ticket).unwrap();
        ticket
    }

    #[test]
    fn approve_completes_consultation_and_syncs_calendar() {
        let conn = open_memory_database().unwrap();
        let ticket = seed(&conn);
        let calendar = MockCalendarClient::connected();
        let doctor = Uuid::new_v4();

        let outcome = approve(
            &conn,
            ticket.id,
            doctor,
            Some("Plan is appropriate."),
            None,
            &calendar,
        )
        .unwrap();

        assert_eq!(outcome.ticket_id, ticket.id);
        // daily action + monitoring task
        assert_eq!(outcome.calendar.status, SyncStatus::Synced { events_created: 2 });

        let consultation = get_consultation(&conn, &ticket.consultation_id)
            .unwrap()
            .unwrap();
        assert_eq!(consultation.stage, ConsultationStage::Completed);

        let stored = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Approved);
        assert_eq!(stored.doctor_id, Some(doctor));
        assert_eq!(stored.doctor_notes.as_deref(), Some("Plan is appropriate."));
        assert!(stored.reviewed_at.is_some());
    }

    #[test]
    fn approve_with_modifications_syncs_the_modified_plan() {
        let conn = open_memory_database().unwrap();
        let ticket = seed(&conn);
        let calendar = MockCalendarClient::connected();

        let modified = CarePlan {
            daily_actions: vec!["Walk 30 minutes".into()],
            monitoring: vec![],
            red_flags: vec![],
            goals: vec![],
            lifestyle_changes: vec![],
        };
        approve(
            &conn,
            ticket.id,
            Uuid::new_v4(),
            None,
            Some(modified.clone()),
            &calendar,
        )
        .unwrap();

        assert_eq!(calendar.created_titles(), vec!["Walk 30 minutes".to_string()]);

        let stored = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(stored.plan_modifications, Some(modified));
        // The proposed plan snapshot is untouched
        assert_eq!(stored.care_plan, sample_plan());
    }

    #[test]
    fn sync_failure_does_not_undo_the_approval() {
        let conn = open_memory_database().unwrap();
        let ticket = seed(&conn);
        let calendar = MockCalendarClient::failing();

        let outcome = approve(&conn, ticket.id, Uuid::new_v4(), None, None, &calendar).unwrap();

        assert!(matches!(outcome.calendar.status, SyncStatus::Failed { .. }));

        let stored = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Approved);
        let consultation = get_consultation(&conn, &ticket.consultation_id)
            .unwrap()
            .unwrap();
        assert_eq!(consultation.stage, ConsultationStage::Completed);
    }

    #[test]
    fn reject_leaves_consultation_awaiting_review_without_sync() {
        let conn = open_memory_database().unwrap();
        let ticket = seed(&conn);

        let outcome = reject(
            &conn,
            ticket.id,
            Uuid::new_v4(),
            Some("Needs an in-person exam."),
        )
        .unwrap();
        assert_eq!(outcome.consultation_id, ticket.consultation_id);

        let stored = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Rejected);

        let consultation = get_consultation(&conn, &ticket.consultation_id)
            .unwrap()
            .unwrap();
        assert_eq!(consultation.stage, ConsultationStage::AwaitingReview);
    }

    #[test]
    fn second_decision_fails_and_preserves_the_first() {
        let conn = open_memory_database().unwrap();
        let ticket = seed(&conn);
        let calendar = MockCalendarClient::connected();
        let first_doctor = Uuid::new_v4();

        reject(&conn, ticket.id, first_doctor, Some("Not yet.")).unwrap();

        let err = approve(&conn, ticket.id, Uuid::new_v4(), None, None, &calendar).unwrap_err();
        assert!(matches!(err, ReviewError::TicketAlreadyDecided(id) if id == ticket.id));
        assert_eq!(calendar.created_count(), 0);

        let stored = get_ticket(&conn, &ticket.id).unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Rejected);
        assert_eq!(stored.doctor_id, Some(first_doctor));
        assert_eq!(stored.doctor_notes.as_deref(), Some("Not yet."));
    }

    #[test]
    fn unknown_ticket_is_not_found() {
        let conn = open_memory_database().unwrap();
        let calendar = MockCalendarClient::connected();
        let missing = Uuid::new_v4();

        let err = approve(&conn, missing, Uuid::new_v4(), None, None, &calendar).unwrap_err();
        assert!(matches!(err, ReviewError::TicketNotFound(id) if id == missing));

        let err = reject(&conn, missing, Uuid::new_v4(), None).unwrap_err();
        assert!(matches!(err, ReviewError::TicketNotFound(_)));
    }

    #[test]
    fn queue_lists_pending_most_urgent_first() {
        let conn = open_memory_database().unwrap();
        let first = seed(&conn);
        let second = seed(&conn);

        let queue = list_queue(&conn).unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|e| e.urgency == Severity::Moderate));

        // Deciding one removes it from the queue
        reject(&conn, first.id, Uuid::new_v4(), None).unwrap();
        let queue = list_queue(&conn).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].ticket_id, second.id);
    }

    #[test]
    fn ticket_detail_round_trips() {
        let conn = open_memory_database().unwrap();
        let ticket = seed(&conn);

        let detail = get_ticket_detail(&conn, ticket.id).unwrap();
        assert_eq!(detail.id, ticket.id);
        assert_eq!(detail.care_plan, sample_plan());
    }
}
