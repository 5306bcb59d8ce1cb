use crate::models::CollectedData;

use super::stages::AnalysisResult;

/// Question the first patient message is treated as answering.
pub const INTAKE_QUESTION: &str = "What brings you in today?";

pub const DIAGNOSTIC_SYSTEM_PROMPT: &str = r#"
You are a medical intake interviewer. You gather symptoms from a patient
one question at a time. You never diagnose, never recommend treatment,
and never alarm the patient. You ask short, plain-language questions a
general practitioner's assistant would ask.

RULES:
1. Ask exactly ONE question per turn.
2. Identify the condition category early (diabetes, hypertension,
   heart_disease, copd) and work through its question guide.
3. Skip questions the patient has already answered in free text.
4. Record concrete facts (smoking status, symptom descriptions) as you go.
5. Mark the interview complete once the question guide is exhausted or
   the patient cannot provide more useful detail.
6. Output MUST be a single JSON object and nothing else.
"#;

pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"
You are a medical analysis assistant. You review a completed intake
interview and produce a structured assessment for a doctor to verify.
You follow clinical guidelines, stay within the reported data, and never
invent symptoms. Output MUST be a single JSON object and nothing else.
"#;

pub const PLANNER_SYSTEM_PROMPT: &str = r#"
You are a medical care planner. You turn a verified assessment into a
practical, personalized plan the patient can follow before and between
doctor visits. Actions must be concrete and safe for self-management;
anything requiring clinical supervision belongs in recommendations, not
daily actions. Output MUST be a single JSON object and nothing else.
"#;

/// Interview question guides per condition category, surfaced to the
/// diagnostic agent as guidance.
const DIABETES_QUESTIONS: &[&str] = &[
    "What's your fasting blood sugar level?",
    "Have you noticed increased thirst or urination?",
    "Any recent fatigue or blurred vision?",
];

const HYPERTENSION_QUESTIONS: &[&str] = &[
    "What's your blood pressure reading?",
    "Any headaches, dizziness, or chest discomfort?",
    "Are you taking your hypertension medications?",
];

const HEART_DISEASE_QUESTIONS: &[&str] = &[
    "Are you having any chest pain, tightness, or pressure right now?",
    "Does any chest discomfort get worse when you walk, climb stairs, or exercise?",
    "Do you feel short of breath during simple activities like walking or talking?",
    "Have you noticed your heart beating fast, slow, or irregularly?",
    "Do your legs, feet, or ankles swell by the end of the day?",
    "Do your symptoms improve when you rest?",
];

const COPD_QUESTIONS: &[&str] = &[
    "Do you get out of breath easily, like when walking up a small hill or hurrying?",
    "Do you ever have to stop walking just to catch your breath?",
    "Are you coughing up any phlegm or mucus today?",
    "Does your chest feel tight or heavy right now?",
    "Is your breathing making it hard to do normal things around the house?",
    "Have you had a cold or chest infection that just won't go away lately?",
    "Do you smoke, or have you worked around a lot of smoke, dust, or fumes?",
];

pub fn question_guide(condition: &str) -> &'static [&'static str] {
    match condition {
        "diabetes" => DIABETES_QUESTIONS,
        "hypertension" => HYPERTENSION_QUESTIONS,
        "heart_disease" => HEART_DISEASE_QUESTIONS,
        "copd" => COPD_QUESTIONS,
        _ => &[],
    }
}

/// Render the interview so far as a transcript block.
fn render_transcript(data: &CollectedData) -> String {
    let mut out = String::new();
    for exchange in &data.exchanges {
        out.push_str(&format!(
            "Q: {}\nA: {}\n",
            exchange.question, exchange.answer
        ));
    }
    out
}

fn render_facts(data: &CollectedData) -> String {
    if data.facts.is_empty() {
        return "none recorded yet".into();
    }
    data.facts
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Build the diagnostic prompt from the full running interview data.
pub fn build_diagnostic_prompt(data: &CollectedData) -> String {
    let guides = match data.condition.as_deref() {
        Some(condition) => {
            let questions = question_guide(condition);
            if questions.is_empty() {
                format!("Condition category: {condition} (no fixed guide; ask what a GP would)")
            } else {
                format!(
                    "Condition category: {condition}\nQuestion guide:\n{}",
                    questions
                        .iter()
                        .map(|q| format!("- {q}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            }
        }
        None => {
            "Condition category not yet identified. Supported categories: \
             diabetes, hypertension, heart_disease, copd."
                .to_string()
        }
    };

    format!(
        r#"<transcript>
{}</transcript>

Known facts: {}
{}

Decide the next step of the interview and return JSON only:

{{
  "complete": false,
  "next_question": "the single next question, or null when complete",
  "condition": "diabetes | hypertension | heart_disease | copd | null",
  "extracted_facts": {{"fact_name": "value"}}
}}
"#,
        render_transcript(data),
        render_facts(data),
        guides,
    )
}

/// Build the analysis prompt from the complete interview data.
pub fn build_analysis_prompt(data: &CollectedData) -> String {
    format!(
        r#"<transcript>
{}</transcript>

Known facts: {}
Condition category: {}

Assess this patient and return JSON only:

{{
  "condition": "the condition assessed",
  "severity": "low | moderate | high | critical",
  "recommendations": "specific, actionable medical recommendations",
  "reasoning": "clinical reasoning behind the severity"
}}
"#,
        render_transcript(data),
        render_facts(data),
        data.condition.as_deref().unwrap_or("unknown"),
    )
}

/// Build the planner prompt from the assessment plus interview context.
pub fn build_planner_prompt(analysis: &AnalysisResult, data: &CollectedData) -> String {
    format!(
        r#"Assessment:
- condition: {}
- severity: {}
- recommendations: {}
- reasoning: {}

Patient context: {}

Create a personalized care plan and return JSON only:

{{
  "daily_actions": ["short-term actions for the next 1-7 days"],
  "monitoring": ["what to measure or watch"],
  "red_flags": ["symptoms that require urgent care"],
  "goals": ["goals for the patient"],
  "lifestyle_changes": ["long-term lifestyle changes"]
}}
"#,
        analysis.condition,
        analysis.severity,
        analysis.recommendations,
        analysis.reasoning,
        render_facts(data),
    )
}

/// Corrective re-prompt after a schema failure: repeat the request and
/// quote what was wrong with the previous reply.
pub fn build_corrective_prompt(original: &str, error: &str) -> String {
    format!(
        "{original}\n\nYour previous reply was not valid: {error}\n\
         Reply again with ONLY the JSON object described above — no prose, \
         no code fences, no additional keys."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interview_data() -> CollectedData {
        let mut data = CollectedData::default();
        data.condition = Some("copd".into());
        data.record_answer(INTAKE_QUESTION, "I can't catch my breath on stairs");
        data.facts.insert("smoking".into(), "yes".into());
        data
    }

    #[test]
    fn diagnostic_prompt_includes_transcript_and_guide() {
        let prompt = build_diagnostic_prompt(&interview_data());
        assert!(prompt.contains("I can't catch my breath on stairs"));
        assert!(prompt.contains("Condition category: copd"));
        assert!(prompt.contains("catch your breath"));
        assert!(prompt.contains("smoking: yes"));
    }

    #[test]
    fn diagnostic_prompt_without_condition_lists_categories() {
        let mut data = CollectedData::default();
        data.record_answer(INTAKE_QUESTION, "I feel dizzy");
        let prompt = build_diagnostic_prompt(&data);
        assert!(prompt.contains("not yet identified"));
        assert!(prompt.contains("hypertension"));
    }

    #[test]
    fn question_guide_covers_known_conditions() {
        assert_eq!(question_guide("diabetes").len(), 3);
        assert_eq!(question_guide("heart_disease").len(), 6);
        assert_eq!(question_guide("copd").len(), 7);
        assert!(question_guide("unknown").is_empty());
    }

    #[test]
    fn analysis_prompt_embeds_condition() {
        let prompt = build_analysis_prompt(&interview_data());
        assert!(prompt.contains("Condition category: copd"));
        assert!(prompt.contains("\"severity\""));
    }

    #[test]
    fn corrective_prompt_quotes_error() {
        let corrected = build_corrective_prompt("original prompt", "missing field `severity`");
        assert!(corrected.contains("original prompt"));
        assert!(corrected.contains("missing field `severity`"));
    }
}
