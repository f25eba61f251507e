//! Wire types of the Langbase Pipes API.

use serde::{Deserialize, Serialize};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model.
    System,
    /// The prompt being answered.
    User,
}

/// One chat message sent to a pipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who speaks.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl Message {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Body of `POST /v1/pipes/run`.
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    /// Pipe to run.
    pub name: String,
    /// Conversation, system message first.
    pub messages: Vec<Message>,
    /// Always false; completions are read whole.
    pub stream: bool,
}

impl PipeRequest {
    /// A non-streaming run of `name` over `messages`.
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            stream: false,
        }
    }
}

/// Body returned by `POST /v1/pipes/run`. Unknown members are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    /// Generated text.
    pub completion: String,
    /// Provider details, when forwarded.
    #[serde(default)]
    pub raw: Option<RawResponse>,
}

/// Provider section of a [`PipeResponse`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResponse {
    /// Token accounting.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// OpenAI-style token counts.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u64,
}

impl PipeResponse {
    /// Prompt and completion token counts, zero when the provider omits them.
    pub fn token_usage(&self) -> (u64, u64) {
        let usage = self.raw.as_ref().and_then(|raw| raw.usage).unwrap_or_default();
        (usage.prompt_tokens, usage.completion_tokens)
    }
}

/// Body of `POST /v1/pipes`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePipeRequest {
    /// Pipe name.
    pub name: String,
    /// Shown in the Langbase dashboard.
    pub description: String,
    /// Provider-qualified model id.
    pub model: String,
    /// Update the pipe when it already exists.
    pub upsert: bool,
    /// Force JSON output mode. Off: the planner and judge ask for JSON in
    /// their prompts while synthesis writes prose.
    pub json: bool,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion length cap.
    pub max_tokens: u32,
}

impl CreatePipeRequest {
    /// Definition of the agent pipe. It carries no system prompt of its
    /// own: every call sends its instructions as the first message.
    pub fn agent_pipe(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "Multi-source legal research agent".to_string(),
            model: "openai:gpt-4o-mini".to_string(),
            upsert: true,
            json: false,
            temperature: 0.2,
            max_tokens: 4000,
        }
    }
}

/// Body returned by `POST /v1/pipes`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipeResponse {
    /// Pipe name.
    pub name: String,
    /// Dashboard URL.
    #[serde(default)]
    pub url: String,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
