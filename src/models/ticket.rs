use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Severity, TicketStatus};
use crate::pipeline::stages::{AnalysisResult, CarePlan};

/// The reviewable packaging of a completed consultation, awaiting a
/// doctor's decision. Created exactly once per consultation and kept
/// forever as an audit record; only the review gate mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalTicket {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub patient_id: Uuid,
    pub status: TicketStatus,
    pub summary: TicketSummary,
    /// Snapshot of the consultation's analysis at ticket-build time.
    /// A copy, not a reference: later consultation writes cannot alter
    /// what the doctor was shown.
    pub analysis_result: AnalysisResult,
    /// Snapshot of the proposed care plan at ticket-build time.
    pub care_plan: CarePlan,
    pub doctor_id: Option<Uuid>,
    pub doctor_notes: Option<String>,
    /// Doctor's plan override, applied on approval.
    pub plan_modifications: Option<CarePlan>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Doctor-facing digest shown in the review queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSummary {
    pub chief_complaint: String,
    pub key_symptoms: Vec<String>,
    pub urgency: Severity,
    pub priority_score: i32,
}

impl MedicalTicket {
    /// The care plan a sync should use: the doctor's override when one
    /// was recorded, otherwise the plan as proposed.
    pub fn effective_plan(&self) -> &CarePlan {
        self.plan_modifications.as_ref().unwrap_or(&self.care_plan)
    }
}
