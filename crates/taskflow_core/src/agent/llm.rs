//! Language model collaborator.
//!
//! # Invariants
//! - Every call is bounded by the client timeout.
//! - Quota exhaustion is reported as `RateLimited`, distinct from other failures.

use crate::config::ModelSettings;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model quota exhausted")]
    RateLimited,
    #[error("model call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Blocking text completion.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Gemini `generateContent` client over a blocking `ureq` agent.
pub struct GeminiModel {
    agent: ureq::Agent,
    api_base: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiModel {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_settings(settings: &ModelSettings) -> Option<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())?;
        Some(Self::new(
            settings.api_base.trim(),
            api_key,
            settings.name.trim(),
            Duration::from_millis(settings.timeout_ms),
        ))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    fn map_error(&self, err: ureq::Error) -> ModelError {
        match err {
            ureq::Error::Status(429, _) => ModelError::RateLimited,
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                if body.contains("RESOURCE_EXHAUSTED") {
                    ModelError::RateLimited
                } else {
                    ModelError::Unavailable(format!("http status {code}"))
                }
            }
            ureq::Error::Transport(transport) => {
                if is_timeout(&transport) {
                    ModelError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ModelError::Unavailable(transport.kind().to_string())
                }
            }
        }
    }
}

impl LanguageModel for GeminiModel {
    fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let started = Instant::now();
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let result = self
            .agent
            .post(&self.endpoint())
            .set("x-goog-api-key", &self.api_key)
            .send_json(body)
            .map_err(|err| self.map_error(err))
            .and_then(|response| {
                response
                    .into_json::<GenerateContentResponse>()
                    .map_err(|err| ModelError::InvalidResponse(err.to_string()))
            })
            .and_then(extract_text);

        let latency_ms = started.elapsed().as_millis();
        match &result {
            Ok(text) => info!(
                "event=model_call module=agent status=ok model={} prompt_chars={} response_chars={} latency_ms={}",
                self.model,
                prompt.chars().count(),
                text.chars().count(),
                latency_ms
            ),
            Err(err) => warn!(
                "event=model_call module=agent status=error model={} kind={} latency_ms={}",
                self.model,
                err.kind(),
                latency_ms
            ),
        }
        result
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    let text = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        return Err(ModelError::InvalidResponse(
            "response carried no text".to_string(),
        ));
    }
    Ok(text)
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}
