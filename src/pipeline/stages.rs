use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::enums::Severity;

/// The pipeline stage an agent call belongs to. Used for prompt
/// selection and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Diagnostic,
    Analysis,
    Planner,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diagnostic => f.write_str("diagnostic"),
            Self::Analysis => f.write_str("analysis"),
            Self::Planner => f.write_str("planner"),
        }
    }
}

/// One turn of the diagnostic interview agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticTurn {
    /// True once the agent has gathered enough to hand off to analysis.
    pub complete: bool,
    /// The next question to surface; required while `complete` is false.
    #[serde(default)]
    pub next_question: Option<String>,
    /// Condition category the agent has identified, once known.
    #[serde(default)]
    pub condition: Option<String>,
    /// Facts extracted from the patient's answers so far.
    #[serde(default)]
    pub extracted_facts: BTreeMap<String, String>,
}

impl DiagnosticTurn {
    pub fn validate(&self) -> Result<(), String> {
        if !self.complete {
            match &self.next_question {
                Some(q) if !q.trim().is_empty() => {}
                _ => {
                    return Err(
                        "next_question must be a non-empty string while complete is false".into(),
                    )
                }
            }
        }
        Ok(())
    }
}

/// Structured assessment produced by the analysis agent. Written once
/// per consultation; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub condition: String,
    pub severity: Severity,
    pub recommendations: String,
    pub reasoning: String,
}

impl AnalysisResult {
    pub fn validate(&self) -> Result<(), String> {
        if self.condition.trim().is_empty() {
            return Err("condition must be a non-empty string".into());
        }
        if self.recommendations.trim().is_empty() {
            return Err("recommendations must be a non-empty string".into());
        }
        Ok(())
    }
}

/// Structured care plan produced by the planner agent. Written once per
/// consultation; immutable thereafter (doctor overrides live on the
/// ticket, never here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlan {
    pub daily_actions: Vec<String>,
    #[serde(default)]
    pub monitoring: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub lifestyle_changes: Vec<String>,
}

impl CarePlan {
    pub fn validate(&self) -> Result<(), String> {
        if self.daily_actions.iter().all(|a| a.trim().is_empty()) {
            return Err("daily_actions must contain at least one non-empty action".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_turn_requires_question() {
        let turn = DiagnosticTurn {
            complete: false,
            next_question: None,
            condition: None,
            extracted_facts: BTreeMap::new(),
        };
        assert!(turn.validate().is_err());

        let turn = DiagnosticTurn {
            next_question: Some("   ".into()),
            ..turn
        };
        assert!(turn.validate().is_err());
    }

    #[test]
    fn complete_turn_needs_no_question() {
        let turn = DiagnosticTurn {
            complete: true,
            next_question: None,
            condition: Some("copd".into()),
            extracted_facts: BTreeMap::new(),
        };
        assert!(turn.validate().is_ok());
    }

    #[test]
    fn analysis_rejects_empty_fields() {
        let analysis = AnalysisResult {
            condition: "".into(),
            severity: Severity::Moderate,
            recommendations: "Rest".into(),
            reasoning: "".into(),
        };
        assert!(analysis.validate().is_err());

        let analysis = AnalysisResult {
            condition: "diabetes".into(),
            recommendations: " ".into(),
            ..analysis
        };
        assert!(analysis.validate().is_err());
    }

    #[test]
    fn plan_requires_daily_actions() {
        let plan = CarePlan {
            daily_actions: vec![],
            monitoring: vec![],
            red_flags: vec![],
            goals: vec![],
            lifestyle_changes: vec![],
        };
        assert!(plan.validate().is_err());

        let plan = CarePlan {
            daily_actions: vec!["Check fasting glucose".into()],
            ..plan
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn diagnostic_turn_tolerates_missing_optional_fields() {
        let turn: DiagnosticTurn =
            serde_json::from_str(r#"{"complete": false, "next_question": "Any fever?"}"#).unwrap();
        assert!(!turn.complete);
        assert_eq!(turn.next_question.as_deref(), Some("Any fever?"));
        assert!(turn.condition.is_none());
        assert!(turn.extracted_facts.is_empty());
    }
}
