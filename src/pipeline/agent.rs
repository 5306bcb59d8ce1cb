use serde::{Deserialize, Serialize};

use super::AgentError;

/// One reasoning-service call: a system role plus the stage prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
}

/// Reasoning-service abstraction (allows mocking).
pub trait AgentClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError>;
}

impl<T: AgentClient + ?Sized> AgentClient for std::sync::Arc<T> {
    fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError> {
        (**self).complete(request)
    }
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint
/// (DeepSeek in production).
pub struct DeepSeekClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 2000;

impl DeepSeekClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from /chat/completions
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl AgentClient for DeepSeekClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    AgentError::Unavailable(format!("cannot reach {}", self.base_url))
                } else if e.is_timeout() {
                    AgentError::Unavailable(format!(
                        "request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    AgentError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AgentError::Unavailable(format!(
                "upstream returned status {status}: {body}"
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| AgentError::Unavailable(format!("invalid response envelope: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AgentError::Unavailable("response contained no choices".into()))?;

        Ok(content)
    }
}

/// Scripted client for tests: replays a fixed sequence of replies and
/// counts calls.
pub struct MockAgentClient {
    script: std::sync::Mutex<std::collections::VecDeque<Result<String, AgentError>>>,
    calls: std::sync::atomic::AtomicUsize,
    /// Reply repeated once the script is exhausted.
    fallback: Option<String>,
}

impl MockAgentClient {
    /// Replay `script` in order; panics when exhausted.
    pub fn with_script(script: Vec<Result<String, AgentError>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
            fallback: None,
        }
    }

    /// Return the same reply for every call.
    pub fn always(reply: &str) -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::atomic::AtomicUsize::new(0),
            fallback: Some(reply.to_string()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl AgentClient for MockAgentClient {
    fn complete(&self, _request: &CompletionRequest) -> Result<String, AgentError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .expect("mock script lock")
            .pop_front();
        match next {
            Some(reply) => reply,
            None => match &self.fallback {
                Some(reply) => Ok(reply.clone()),
                None => panic!("MockAgentClient script exhausted"),
            },
        }
    }
}
