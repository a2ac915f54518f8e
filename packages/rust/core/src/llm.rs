//! Text generation seam and the OpenAI-compatible HTTP client.
//!
//! The pipeline only ever sees [`TextGenerator`]: a prompt goes in, body text
//! comes out. [`OpenAiCompatClient`] implements it against any server that
//! speaks the `/chat/completions` protocol.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use fsdgen_shared::{FsdGenError, LlmConfig, Result};

/// Longest slice of an error body echoed back in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Opaque text generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`. The returned text is trimmed.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

// ---------------------------------------------------------------------------
// OpenAiCompatClient
// ---------------------------------------------------------------------------

/// Client for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatClient {
    /// Create a client posting to `<base_url>/chat/completions`.
    pub fn new(
        base_url: &Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", base_url.as_str().trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| FsdGenError::config(format!("invalid completions endpoint: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("fsdgen/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| FsdGenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }

    /// Build from the `[llm]` config section, reading the key from its env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            &config.base_url()?,
            config.api_key()?,
            &config.model,
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FsdGenError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FsdGenError::Network(format!("{}: failed to read body: {e}", self.endpoint)))?;

        if !status.is_success() {
            return Err(FsdGenError::Generation(format!(
                "HTTP {status}: {}",
                truncate(&body, MAX_ERROR_BODY)
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            FsdGenError::Generation(format!(
                "invalid completion response: {e} (got: {})",
                truncate(&body, MAX_ERROR_BODY)
            ))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| FsdGenError::Generation("completion response has no choices".into()))?;

        let text = choice.message.content.trim().to_string();
        debug!(response_len = text.len(), "completion received");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    /// Generator that echoes the section name and fails for chosen sections.
    #[derive(Default)]
    pub(crate) struct ScriptedGenerator {
        failing: HashSet<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn failing_on(sections: &[&str]) -> Self {
            Self {
                failing: sections.iter().map(|s| (*s).to_string()).collect(),
                ..Default::default()
            }
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    pub(crate) fn section_of(prompt: &str) -> String {
        prompt
            .lines()
            .find_map(|l| l.strip_prefix("SECTION: "))
            .unwrap_or_default()
            .to_string()
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let section = section_of(prompt);
            if self.failing.contains(&section) {
                return Err(FsdGenError::Generation(format!("scripted failure for {section}")));
            }
            Ok(format!("Generated body for {section}."))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
