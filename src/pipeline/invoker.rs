use serde::de::DeserializeOwned;

use crate::models::CollectedData;

use super::agent::{AgentClient, CompletionRequest};
use super::parser::parse_agent_json;
use super::prompt::{
    build_analysis_prompt, build_corrective_prompt, build_diagnostic_prompt, build_planner_prompt,
    ANALYSIS_SYSTEM_PROMPT, DIAGNOSTIC_SYSTEM_PROMPT, PLANNER_SYSTEM_PROMPT,
};
use super::stages::{AnalysisResult, CarePlan, DiagnosticTurn, StageKind};
use super::AgentError;

/// Invokes the reasoning service with a fixed per-stage contract:
/// prompt template in, schema-validated structured result out.
///
/// A reply that fails parsing or validation is retried exactly once with
/// a corrective re-prompt quoting the failure; a second failure is
/// `MalformedOutput`. Transport failures (`Unavailable`) are never
/// retried here; retry policy belongs to the caller, which avoids
/// double-billing the reasoning service.
pub struct AgentInvoker {
    client: Box<dyn AgentClient>,
}

impl AgentInvoker {
    pub fn new(client: Box<dyn AgentClient>) -> Self {
        Self { client }
    }

    pub fn diagnostic(&self, data: &CollectedData) -> Result<DiagnosticTurn, AgentError> {
        self.invoke_validated(
            StageKind::Diagnostic,
            DIAGNOSTIC_SYSTEM_PROMPT,
            build_diagnostic_prompt(data),
            DiagnosticTurn::validate,
        )
    }

    pub fn analysis(&self, data: &CollectedData) -> Result<AnalysisResult, AgentError> {
        self.invoke_validated(
            StageKind::Analysis,
            ANALYSIS_SYSTEM_PROMPT,
            build_analysis_prompt(data),
            AnalysisResult::validate,
        )
    }

    pub fn planner(
        &self,
        analysis: &AnalysisResult,
        data: &CollectedData,
    ) -> Result<CarePlan, AgentError> {
        self.invoke_validated(
            StageKind::Planner,
            PLANNER_SYSTEM_PROMPT,
            build_planner_prompt(analysis, data),
            CarePlan::validate,
        )
    }

    fn invoke_validated<T: DeserializeOwned>(
        &self,
        stage: StageKind,
        system: &str,
        prompt: String,
        validate: fn(&T) -> Result<(), String>,
    ) -> Result<T, AgentError> {
        let reply = self.client.complete(&CompletionRequest {
            system: system.to_string(),
            prompt: prompt.clone(),
        })?;

        let first_error = match decode(&reply, validate) {
            Ok(result) => return Ok(result),
            Err(reason) => reason,
        };

        tracing::warn!(
            stage = %stage,
            error = %first_error,
            "Agent reply failed validation, sending corrective re-prompt"
        );

        let reply = self.client.complete(&CompletionRequest {
            system: system.to_string(),
            prompt: build_corrective_prompt(&prompt, &first_error),
        })?;

        decode(&reply, validate).map_err(|reason| {
            tracing::error!(stage = %stage, error = %reason, "Agent reply malformed after retry");
            AgentError::MalformedOutput { stage, reason }
        })
    }
}

fn decode<T: DeserializeOwned>(
    reply: &str,
    validate: fn(&T) -> Result<(), String>,
) -> Result<T, String> {
    let parsed: T = parse_agent_json(reply)?;
    validate(&parsed)?;
    Ok(parsed)
}
