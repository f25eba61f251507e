//! Langbase Pipes client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, Message, PipeRequest, PipeResponse};
use super::{Completion, LanguageModel};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LlmError, LlmResult};

/// HTTP client for one Langbase pipe.
#[derive(Clone)]
pub struct LangbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    pipe: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    /// Build a client for `config.pipe`.
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            pipe: config.pipe.clone(),
            request_config,
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Name of the pipe used for completions.
    pub fn pipe(&self) -> &str {
        &self.pipe
    }

    /// Run a pipe.
    ///
    /// Timeouts, transport errors, 429 and 5xx are retried with exponential
    /// backoff. Other API errors return at once so authentication failures
    /// keep their status.
    pub async fn call_pipe(&self, request: PipeRequest) -> LlmResult<PipeResponse> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured {
                message: "Langbase API key is empty".to_string(),
            });
        }

        let attempts = self.request_config.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    pipe = %request.name,
                    retry = attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying Langbase request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            match self.post_json::<_, PipeResponse>("/v1/pipes/run", &request).await {
                Ok(response) => {
                    info!(
                        pipe = %request.name,
                        latency_ms = start.elapsed().as_millis(),
                        "Pipe run completed"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() => {
                    warn!(pipe = %request.name, error = %e, attempt, "Pipe run failed");
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(pipe = %request.name, error = %e, "Pipe run rejected");
                    return Err(e);
                }
            }
        }

        Err(LlmError::Unavailable {
            message: last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string()),
            retries: attempts,
        })
    }

    /// Create or update a pipe.
    pub async fn create_pipe(&self, request: CreatePipeRequest) -> LlmResult<CreatePipeResponse> {
        info!(pipe = %request.name, "Creating Langbase pipe");
        let created: CreatePipeResponse = self.post_json("/v1/pipes", &request).await?;
        info!(pipe = %created.name, url = %created.url, "Pipe created");
        Ok(created)
    }

    /// Upsert the agent pipe. A 409 means it already exists.
    pub async fn ensure_agent_pipe(&self) -> LlmResult<()> {
        match self.create_pipe(CreatePipeRequest::agent_pipe(&self.pipe)).await {
            Ok(_) => {
                info!(pipe = %self.pipe, "Agent pipe ready");
                Ok(())
            }
            Err(LlmError::Api { status: 409, .. }) => {
                info!(pipe = %self.pipe, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.request_config
                .retry_delay_ms
                .saturating_mul(2_u64.saturating_pow(attempt - 1)),
        )
    }

    /// One authenticated POST. Non-2xx statuses become [`LlmError::Api`]
    /// carrying the response body.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> LlmResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(path, "POST to Langbase");

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LlmError::InvalidResponse {
                message: format!("Failed to parse {} response: {}", path, e),
            })
    }
}

#[async_trait]
impl LanguageModel for LangbaseClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> LlmResult<Completion> {
        let request = PipeRequest::new(
            &self.pipe,
            vec![Message::system(system_prompt), Message::user(user_prompt)],
        );
        let response = self.call_pipe(request).await?;
        let (input_tokens, output_tokens) = response.token_usage();

        Ok(Completion::text(response.completion).with_usage(input_tokens, output_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(api_key: &str) -> LangbaseConfig {
        LangbaseConfig {
            api_key: api_key.to_string(),
            base_url: "https://api.langbase.com/".to_string(),
            pipe: "legal-research-agent-v1".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = LangbaseClient::new(&test_config("test_key"), RequestConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client =
            LangbaseClient::new(&test_config("test_key"), RequestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "https://api.langbase.com");
        assert_eq!(client.pipe(), "legal-research-agent-v1");
    }

    #[tokio::test]
    async fn test_empty_api_key_is_not_configured() {
        let client = LangbaseClient::new(&test_config("  "), RequestConfig::default()).unwrap();
        let err = client.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured { .. }));
        assert!(err.is_fatal());
    }
}
