pub mod agent;
pub mod invoker;
pub mod parser;
pub mod prompt;
pub mod stages;
pub mod workflow;

pub use agent::*;
pub use invoker::*;
pub use stages::*;
pub use workflow::*;

use thiserror::Error;

use stages::StageKind;

/// Failures from the external reasoning service.
///
/// `Unavailable` is recoverable: the caller retries the triggering
/// request. `MalformedOutput` survives one corrective re-prompt and is a
/// hard failure requiring human attention.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Reasoning service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed {stage} agent output: {reason}")]
    MalformedOutput { stage: StageKind, reason: String },
}
