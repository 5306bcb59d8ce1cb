//! Consultation state machine.
//!
//! Drives a consultation through interviewing → analyzing → planning →
//! awaiting_review; the final awaiting_review → completed transition
//! belongs to the doctor review gate. Each operation is one transition
//! attempt: it reads the record, calls at most one agent, and persists
//! artifact + stage in a single conditional write. Nothing is persisted
//! when an agent call fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    get_consultation, insert_consultation, insert_ticket, list_consultations_for_patient,
    store_analysis, store_care_plan, update_interview,
};
use crate::db::DatabaseError;
use crate::models::enums::ConsultationStage;
use crate::models::{CollectedData, Consultation};
use crate::ticket::build_ticket;

use super::invoker::AgentInvoker;
use super::prompt::INTAKE_QUESTION;
use super::stages::{AnalysisResult, CarePlan, DiagnosticTurn};
use super::AgentError;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Consultation not found: {0}")]
    NotFound(Uuid),

    #[error("{operation} is not permitted while the consultation is {stage}")]
    InvalidState {
        operation: &'static str,
        stage: ConsultationStage,
    },

    #[error("Consultation was modified concurrently; retry the request")]
    Conflict,

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Internal lock error")]
    LockPoisoned,
}

impl From<DatabaseError> for WorkflowError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::StaleWrite { .. } => Self::Conflict,
            other => Self::Database(other),
        }
    }
}

/// What the interview surfaced for the patient's latest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterviewReply {
    /// The next question to show the patient.
    Question(String),
    /// The interview is done; the consultation is ready for analysis.
    InterviewComplete,
}

#[derive(Debug)]
pub struct StartedConsultation {
    pub consultation_id: Uuid,
    pub reply: InterviewReply,
}

/// Hands out one mutex per consultation so inbound messages and
/// transition attempts for the same consultation serialize, while
/// different consultations proceed in parallel.
#[derive(Default)]
pub struct ConsultationLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConsultationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_consultation(&self, id: Uuid) -> Result<Arc<Mutex<()>>, WorkflowError> {
        let mut map = self.inner.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        Ok(Arc::clone(map.entry(id).or_default()))
    }
}

pub struct ConsultationWorkflow {
    invoker: AgentInvoker,
    locks: ConsultationLocks,
}

impl ConsultationWorkflow {
    pub fn new(invoker: AgentInvoker) -> Self {
        Self {
            invoker,
            locks: ConsultationLocks::new(),
        }
    }

    /// Open a consultation with the patient's first message.
    ///
    /// The diagnostic agent runs before anything is persisted, so a
    /// failed call leaves no half-initialized record behind; the
    /// consultation id exists only once the first turn succeeded.
    pub fn start(
        &self,
        conn: &Connection,
        patient_id: Uuid,
        first_message: &str,
    ) -> Result<StartedConsultation, WorkflowError> {
        let mut data = CollectedData::default();
        data.record_answer(INTAKE_QUESTION, first_message);

        let turn = self.invoker.diagnostic(&data)?;
        let (stage, reply) = apply_turn(&mut data, turn);

        let now = Utc::now();
        let consultation = Consultation {
            id: Uuid::new_v4(),
            patient_id,
            stage,
            collected_data: data,
            analysis_result: None,
            care_plan: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        insert_consultation(conn, &consultation)?;

        tracing::info!(
            consultation_id = %consultation.id,
            patient_id = %patient_id,
            stage = %stage,
            "Consultation started"
        );

        Ok(StartedConsultation {
            consultation_id: consultation.id,
            reply,
        })
    }

    /// Feed the next patient message into the interview.
    pub fn continue_consultation(
        &self,
        conn: &Connection,
        consultation_id: Uuid,
        message: &str,
    ) -> Result<InterviewReply, WorkflowError> {
        let lock = self.locks.for_consultation(consultation_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let consultation = self.load(conn, consultation_id)?;
        if consultation.stage != ConsultationStage::Interviewing {
            return Err(WorkflowError::InvalidState {
                operation: "continue_consultation",
                stage: consultation.stage,
            });
        }

        let mut data = consultation.collected_data;
        data.record_answer(INTAKE_QUESTION, message);

        let turn = self.invoker.diagnostic(&data)?;
        let (stage, reply) = apply_turn(&mut data, turn);

        update_interview(conn, &consultation_id, consultation.version, &data, stage)?;

        if stage == ConsultationStage::Analyzing {
            tracing::info!(
                consultation_id = %consultation_id,
                exchanges = data.exchanges.len(),
                "Interview complete, ready for analysis"
            );
        }

        Ok(reply)
    }

    /// Run the analysis stage.
    ///
    /// Idempotent: once the consultation is past analyzing, the stored
    /// assessment is returned without touching the reasoning service.
    pub fn request_analysis(
        &self,
        conn: &Connection,
        consultation_id: Uuid,
    ) -> Result<AnalysisResult, WorkflowError> {
        let lock = self.locks.for_consultation(consultation_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let consultation = self.load(conn, consultation_id)?;
        match consultation.stage {
            ConsultationStage::Interviewing => Err(WorkflowError::InvalidState {
                operation: "request_analysis",
                stage: consultation.stage,
            }),
            ConsultationStage::Analyzing => {
                let analysis = self.invoker.analysis(&consultation.collected_data)?;
                store_analysis(conn, &consultation_id, consultation.version, &analysis)?;
                tracing::info!(
                    consultation_id = %consultation_id,
                    severity = %analysis.severity,
                    "Analysis stored, consultation planning"
                );
                Ok(analysis)
            }
            _ => stored_artifact(consultation.analysis_result, consultation_id),
        }
    }

    /// Run the planner stage and build the review ticket.
    ///
    /// The care-plan write and the ticket insert commit in one
    /// transaction; the ticket exists exactly when the consultation is
    /// awaiting review. Idempotent like `request_analysis`.
    pub fn request_plan(
        &self,
        conn: &Connection,
        consultation_id: Uuid,
    ) -> Result<CarePlan, WorkflowError> {
        let lock = self.locks.for_consultation(consultation_id)?;
        let _guard = lock.lock().map_err(|_| WorkflowError::LockPoisoned)?;

        let consultation = self.load(conn, consultation_id)?;
        match consultation.stage {
            ConsultationStage::Interviewing | ConsultationStage::Analyzing => {
                Err(WorkflowError::InvalidState {
                    operation: "request_plan",
                    stage: consultation.stage,
                })
            }
            ConsultationStage::Planning => {
                let analysis = consultation
                    .analysis_result
                    .as_ref()
                    .ok_or(WorkflowError::Conflict)?;
                let plan = self
                    .invoker
                    .planner(analysis, &consultation.collected_data)?;
                let ticket = build_ticket(&consultation, analysis, &plan);

                let tx = conn
                    .unchecked_transaction()
                    .map_err(|e| WorkflowError::Database(e.into()))?;
                store_care_plan(&tx, &consultation_id, consultation.version, &plan)?;
                insert_ticket(&tx, &ticket)?;
                tx.commit().map_err(|e| WorkflowError::Database(e.into()))?;

                tracing::info!(
                    consultation_id = %consultation_id,
                    ticket_id = %ticket.id,
                    priority = ticket.summary.priority_score,
                    "Care plan stored, ticket queued for review"
                );
                Ok(plan)
            }
            _ => stored_artifact(consultation.care_plan, consultation_id),
        }
    }

    pub fn get(
        &self,
        conn: &Connection,
        consultation_id: Uuid,
    ) -> Result<Consultation, WorkflowError> {
        self.load(conn, consultation_id)
    }

    pub fn list_for_patient(
        &self,
        conn: &Connection,
        patient_id: Uuid,
    ) -> Result<Vec<Consultation>, WorkflowError> {
        Ok(list_consultations_for_patient(conn, &patient_id)?)
    }

    fn load(&self, conn: &Connection, id: Uuid) -> Result<Consultation, WorkflowError> {
        get_consultation(conn, &id)?.ok_or(WorkflowError::NotFound(id))
    }
}

/// Fold a diagnostic turn into the collected data and decide the
/// resulting stage and patient-facing reply.
fn apply_turn(
    data: &mut CollectedData,
    turn: DiagnosticTurn,
) -> (ConsultationStage, InterviewReply) {
    data.merge_facts(&turn.extracted_facts);
    if data.condition.is_none() {
        data.condition = turn.condition;
    }

    if turn.complete {
        data.pending_question = None;
        (
            ConsultationStage::Analyzing,
            InterviewReply::InterviewComplete,
        )
    } else {
        // Validated upstream: an incomplete turn carries a question.
        let question = turn.next_question.unwrap_or_default();
        data.pending_question = Some(question.clone());
        (
            ConsultationStage::Interviewing,
            InterviewReply::Question(question),
        )
    }
}

/// A stored artifact must exist once the stage is past the one that
/// writes it; a missing one means the record was tampered with outside
/// the workflow.
fn stored_artifact<T>(artifact: Option<T>, id: Uuid) -> Result<T, WorkflowError> {
    artifact.ok_or(WorkflowError::Database(DatabaseError::CorruptColumn {
        column: "stage",
        reason: format!("consultation {id} is past a stage whose artifact is missing"),
    }))
}
