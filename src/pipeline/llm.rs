//! Model calls: one instruction + one context in, one JSON object out.
//!
//! Every model-backed stage goes through the [`JsonGenerator`] trait, so stage
//! code never sees a provider, an HTTP client or a retry loop. Two backends
//! ship with the crate:
//!
//! * [`ProviderGenerator`] wraps any `edgequake-llm` provider (OpenAI,
//!   Anthropic, Gemini, Ollama, …).
//! * [`EndpointGenerator`] talks to an explicitly configured
//!   OpenAI-compatible `/chat/completions` endpoint over `reqwest`.
//!
//! ## Retry Strategy
//!
//! Transport failures and timeouts are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): 500 ms → 1 s → 2 s with defaults.
//! A response that arrives but is not a JSON object is *not* retried; at
//! temperature 0 the same prompt would produce the same answer.

use crate::config::{PipelineConfig, DEFAULT_MODEL};
use crate::error::{LlmError, PaperError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Generates one JSON object from a system instruction and a user context.
#[async_trait]
pub trait JsonGenerator: Send + Sync {
    async fn generate_json(
        &self,
        instruction: &str,
        context: &str,
    ) -> Result<Map<String, Value>, LlmError>;
}

// ── Response parsing ─────────────────────────────────────────────────────

static RE_FENCE_OPEN_JSON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^```json\s*").unwrap());
static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\s*").unwrap());
static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").unwrap());

/// Strip a surrounding Markdown code fence, if the response starts with one.
pub fn sanitize_json_response(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    if text.starts_with("```") {
        text = RE_FENCE_OPEN_JSON.replace(&text, "").into_owned();
        text = RE_FENCE_OPEN.replace(&text, "").into_owned();
        text = RE_FENCE_CLOSE.replace(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// Parse a raw model response into a JSON object.
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>, LlmError> {
    let cleaned = sanitize_json_response(raw);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| LlmError::MalformedResponse {
            detail: e.to_string(),
            raw: cleaned.clone(),
        })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(LlmError::NotAnObject {
            kind: json_kind(&other).to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Call parameters shared by both backends.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout: Duration,
}

/// Upper bound on a single retry delay.
const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

impl CallPolicy {
    /// Delay before retry `attempt` (1-based): doubles each time, capped at
    /// [`MAX_RETRY_BACKOFF_MS`].
    fn backoff_ms(&self, attempt: u32) -> u64 {
        2u64
            .checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.retry_backoff_ms.checked_mul(factor))
            .unwrap_or(u64::MAX)
            .min(MAX_RETRY_BACKOFF_MS)
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

/// Run `call` until it succeeds or `max_retries` retries are used up.
///
/// Each attempt is bounded by `policy.timeout`. If the final attempt timed
/// out the result is [`LlmError::Timeout`], otherwise [`LlmError::Api`]
/// carrying the last error message.
async fn call_with_retries<F, Fut>(policy: &CallPolicy, mut call: F) -> Result<String, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let mut last_err = LlmError::Api {
        retries: 0,
        detail: "no attempt made".into(),
    };

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff_ms(attempt);
            warn!(
                "Model call: retry {}/{} after {}ms",
                attempt, policy.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(policy.timeout, call()).await {
            Ok(Ok(content)) => return Ok(content),
            Ok(Err(detail)) => {
                warn!("Model call: attempt {} failed: {}", attempt + 1, detail);
                last_err = LlmError::Api {
                    retries: policy.max_retries,
                    detail,
                };
            }
            Err(_) => {
                warn!(
                    "Model call: attempt {} timed out after {:?}",
                    attempt + 1,
                    policy.timeout
                );
                last_err = LlmError::Timeout {
                    secs: policy.timeout.as_secs(),
                };
            }
        }
    }

    Err(last_err)
}

// ── edgequake-llm backend ────────────────────────────────────────────────

/// [`JsonGenerator`] over an `edgequake-llm` provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    policy: CallPolicy,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, policy: CallPolicy) -> Self {
        Self { provider, policy }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.policy.temperature),
            max_tokens: Some(self.policy.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl JsonGenerator for ProviderGenerator {
    async fn generate_json(
        &self,
        instruction: &str,
        context: &str,
    ) -> Result<Map<String, Value>, LlmError> {
        let messages = vec![ChatMessage::system(instruction), ChatMessage::user(context)];
        let options = self.options();
        let start = Instant::now();

        let (provider, messages, options) = (&self.provider, &messages, &options);
        let content = call_with_retries(&self.policy, move || async move {
            let response = provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| e.to_string())?;
            debug!(
                "Model call: {} input tokens, {} output tokens, {:?}",
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );
            Ok(response.content)
        })
        .await?;

        parse_json_object(&content)
    }
}

// ── OpenAI-compatible endpoint backend ───────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// [`JsonGenerator`] over an OpenAI-compatible chat-completions endpoint.
pub struct EndpointGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    policy: CallPolicy,
}

impl EndpointGenerator {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            policy,
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<String, String> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("API error {status}: {body}"));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response envelope: {e}"))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "Model call: {} input tokens, {} output tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "response has no message content".to_string())
    }
}

#[async_trait]
impl JsonGenerator for EndpointGenerator {
    async fn generate_json(
        &self,
        instruction: &str,
        context: &str,
    ) -> Result<Map<String, Value>, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatTurn {
                    role: "system",
                    content: instruction,
                },
                ChatTurn {
                    role: "user",
                    content: context,
                },
            ],
            temperature: self.policy.temperature,
            max_tokens: self.policy.max_tokens,
        };

        let request = &request;
        let content = call_with_retries(&self.policy, move || self.send(request)).await?;
        parse_json_object(&content)
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Build the generator described by `config`, most specific first:
///
/// 1. **Pre-built provider** (`config.provider`), used as is.
/// 2. **Explicit endpoint** (`config.endpoint`), base URL + API key.
/// 3. **Named provider** (`config.provider_name`) via
///    [`ProviderFactory::create_llm_provider`], which looks up that
///    provider's own credentials.
///
/// Nothing is auto-detected here; callers that want environment discovery
/// (the CLI does) resolve a provider first and pass it in.
pub fn resolve_generator(config: &PipelineConfig) -> Result<Arc<dyn JsonGenerator>, PaperError> {
    let policy = CallPolicy::from_config(config);

    if let Some(provider) = &config.provider {
        return Ok(Arc::new(ProviderGenerator::new(Arc::clone(provider), policy)));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(endpoint) = &config.endpoint {
        return Ok(Arc::new(EndpointGenerator::new(
            &endpoint.base_url,
            endpoint.api_key.clone(),
            model,
            policy,
        )));
    }

    if let Some(name) = &config.provider_name {
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            PaperError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Arc::new(ProviderGenerator::new(provider, policy)));
    }

    Err(PaperError::ProviderNotConfigured {
        provider: "none".into(),
        hint: "Set a provider, a provider name, or an endpoint (base URL + API key).".into(),
    })
}
