//! Ticket builder: packages a consultation's artifacts into a
//! reviewable medical ticket for the doctor queue.
//!
//! Runs exactly once, at the planning → awaiting-review transition.
//! Artifacts are copied by value so nothing shown to a doctor can be
//! altered by later writes to the consultation.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{CollectedData, Consultation, MedicalTicket, TicketStatus, TicketSummary};
use crate::pipeline::stages::{AnalysisResult, CarePlan};

/// Symptoms surfaced in the queue digest.
const MAX_KEY_SYMPTOMS: usize = 5;

/// Build the ticket for a consultation whose analysis and plan are done.
pub fn build_ticket(
    consultation: &Consultation,
    analysis: &AnalysisResult,
    plan: &CarePlan,
) -> MedicalTicket {
    MedicalTicket {
        id: Uuid::new_v4(),
        consultation_id: consultation.id,
        patient_id: consultation.patient_id,
        status: TicketStatus::Pending,
        summary: build_summary(&consultation.collected_data, analysis),
        analysis_result: analysis.clone(),
        care_plan: plan.clone(),
        doctor_id: None,
        doctor_notes: None,
        plan_modifications: None,
        created_at: Utc::now(),
        reviewed_at: None,
    }
}

fn build_summary(data: &CollectedData, analysis: &AnalysisResult) -> TicketSummary {
    let chief_complaint = data
        .condition
        .clone()
        .or_else(|| data.answers().next().map(str::to_string))
        .unwrap_or_else(|| "General consultation".to_string());

    let key_symptoms: Vec<String> = data
        .answers()
        .take(MAX_KEY_SYMPTOMS)
        .map(str::to_string)
        .collect();

    TicketSummary {
        chief_complaint,
        key_symptoms,
        urgency: analysis.severity,
        priority_score: analysis.severity.priority_score(),
    }
}
