//! Language model access.
//!
//! The agent only needs one capability from a model provider: turn a
//! system prompt and a user prompt into text, reporting token usage.
//! [`LanguageModel`] is that seam; [`LangbaseClient`] implements it on
//! top of Langbase Pipes.

mod langbase;
mod types;

pub use langbase::*;
pub use types::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmResult;

/// Text produced by a model together with its token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text.
    pub text: String,
    /// Prompt tokens billed.
    pub input_tokens: u64,
    /// Completion tokens billed.
    pub output_tokens: u64,
}

impl Completion {
    /// Completion with no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    /// Set token usage.
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }
}

/// A language model that can complete a prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `user_prompt` under the instructions in `system_prompt`.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> LlmResult<Completion>;
}
