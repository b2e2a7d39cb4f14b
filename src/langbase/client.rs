use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, Message, PipeRequest, PipeResponse};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};

/// Client for the Langbase Pipes API
#[derive(Clone)]
pub struct LangbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

/// A pipe the application expects to exist, with its system prompt
#[derive(Debug, Clone)]
pub struct PipeDefinition {
    pub name: String,
    pub description: String,
    pub system_prompt: &'static str,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl PipeDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: &'static str,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt,
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

impl LangbaseClient {
    /// Create a new Langbase client
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Call a Langbase pipe, retrying with exponential backoff
    pub async fn call_pipe(&self, request: PipeRequest) -> LangbaseResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);
        let max_retries = self.request_config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                warn!(
                    pipe = %request.name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying pipe run"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(pipe = %request.name, messages = request.messages.len(), "Running pipe");
            let start = Instant::now();
            match self.post_json::<_, PipeResponse>(&url, &request).await {
                Ok(response) => {
                    info!(
                        pipe = %request.name,
                        latency_ms = start.elapsed().as_millis(),
                        total_tokens = ?response.total_tokens(),
                        "Pipe run succeeded"
                    );
                    return Ok(response);
                }
                // Client errors will not improve on retry.
                Err(e @ LangbaseError::Api { status: 400..=499, .. }) => {
                    error!(pipe = %request.name, error = %e, "Langbase rejected pipe run");
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        pipe = %request.name,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        attempt,
                        "Pipe run failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(LangbaseError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
            retries: max_retries + 1,
        })
    }

    /// Delay before retry `attempt` (1-based): the base delay, doubled per
    /// earlier retry.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.request_config.retry_delay_ms.saturating_mul(factor))
    }

    /// Run a pipe with a single user message and return the completion text
    pub async fn run_pipe(&self, pipe_name: &str, user_content: String) -> LangbaseResult<String> {
        let request = PipeRequest::new(pipe_name, vec![Message::user(user_content)]);
        let response = self.call_pipe(request).await?;
        if !response.success {
            return Err(LangbaseError::InvalidResponse {
                message: format!("Pipe {} reported failure", pipe_name),
            });
        }
        Ok(response.completion)
    }

    /// POST a JSON body with the API key and decode a JSON reply.
    async fn post_json<B, R>(&self, url: &str, body: &B) -> LangbaseResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LangbaseError::InvalidResponse {
                message: format!("Failed to decode {} reply: {}", url, e),
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> LangbaseError {
        if e.is_timeout() {
            LangbaseError::Timeout {
                timeout_ms: self.request_config.timeout_ms,
            }
        } else {
            LangbaseError::Http(e)
        }
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create (or upsert) a pipe
    pub async fn create_pipe(
        &self,
        request: CreatePipeRequest,
    ) -> LangbaseResult<CreatePipeResponse> {
        let url = format!("{}/v1/pipes", self.base_url);
        info!(pipe = %request.name, "Creating Langbase pipe");

        let created: CreatePipeResponse = self.post_json(&url, &request).await?;
        info!(pipe = %created.name, url = %created.url, "Pipe ready");
        Ok(created)
    }

    /// Ensure a pipe exists. An existing pipe (409) counts as success.
    pub async fn ensure_pipe(&self, definition: &PipeDefinition) -> LangbaseResult<()> {
        let request = CreatePipeRequest::new(&definition.name)
            .with_description(&definition.description)
            .with_model("openai:gpt-4o-mini")
            .with_upsert(true)
            .with_json_output(true)
            .with_temperature(definition.temperature)
            .with_max_tokens(definition.max_tokens)
            .with_messages(vec![Message::system(definition.system_prompt)]);

        match self.create_pipe(request).await {
            Ok(_) => Ok(()),
            Err(LangbaseError::Api { status: 409, .. }) => {
                info!(pipe = %definition.name, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = LangbaseConfig {
            api_key: "test_key".to_string(),
            base_url: "https://api.langbase.com/".to_string(),
        };

        let client = LangbaseClient::new(&config, RequestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "https://api.langbase.com");
    }

    #[test]
    fn test_pipe_definition_defaults() {
        let def = PipeDefinition::new("p", "desc", "prompt").with_temperature(0.7);
        assert_eq!(def.temperature, 0.7);
        assert_eq!(def.max_tokens, 2000);
    }
}
