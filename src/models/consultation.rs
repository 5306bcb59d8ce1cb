use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ConsultationStage;
use crate::pipeline::stages::{AnalysisResult, CarePlan};

/// One patient interaction session progressing through the
/// interview → analysis → planning → review pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub stage: ConsultationStage,
    pub collected_data: CollectedData,
    pub analysis_result: Option<AnalysisResult>,
    pub care_plan: Option<CarePlan>,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the diagnostic interview has gathered so far.
/// Owned exclusively by the diagnostic stage; exchanges are append-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectedData {
    /// Ordered question/answer pairs in submission order.
    pub exchanges: Vec<QaExchange>,
    /// Condition category identified during the interview, once known.
    pub condition: Option<String>,
    /// Facts extracted from free-text answers (e.g. smoking status).
    pub facts: BTreeMap<String, String>,
    /// The question the next inbound patient message answers.
    /// `None` once the interview is complete.
    pub pending_question: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaExchange {
    pub question: String,
    pub answer: String,
}

impl CollectedData {
    /// Record an inbound patient message as the answer to the pending
    /// question (or to the given fallback when no question is pending).
    pub fn record_answer(&mut self, fallback_question: &str, answer: &str) {
        let question = self
            .pending_question
            .take()
            .unwrap_or_else(|| fallback_question.to_string());
        self.exchanges.push(QaExchange {
            question,
            answer: answer.to_string(),
        });
    }

    /// Fold in facts from a diagnostic turn without clobbering earlier ones.
    pub fn merge_facts(&mut self, facts: &BTreeMap<String, String>) {
        for (key, value) in facts {
            self.facts
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Answers in submission order, used for ticket summaries.
    pub fn answers(&self) -> impl Iterator<Item = &str> {
        self.exchanges.iter().map(|e| e.answer.as_str())
    }
}
