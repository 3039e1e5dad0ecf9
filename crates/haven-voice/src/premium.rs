//! **Premium Synthesis Client** — network-backed, higher-fidelity synthesis.
//!
//! One request per utterance against an OpenAI-compatible `/audio/speech`
//! endpoint. The router races the request against its own fallback timeout,
//! so the client's HTTP timeout is only a backstop.

use crate::error::{SpeechError, SpeechResult};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

/// Wire request for one premium synthesis call.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    /// TTS model: tts-1 (fast) or tts-1-hd (higher quality).
    pub model: String,
    /// Full utterance text (already sanitized upstream is fine; the service
    /// accepts raw text either way).
    pub input: String,
    /// Voice identity (alloy, echo, fable, onyx, nova, shimmer, sage, ...).
    pub voice: String,
    /// Speaking speed multiplier.
    pub speed: f32,
    /// Identity the quota is scoped to, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Opaque playable audio blob returned by the premium service.
#[derive(Debug, Clone)]
pub struct PremiumAudio {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Backend that turns an utterance into premium audio. Implement for any
/// network TTS; the router only needs the trait.
#[async_trait]
pub trait PremiumSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<PremiumAudio>;
}

/// Production client for OpenAI-compatible speech APIs (OpenAI, OpenRouter, etc.).
#[derive(Debug, Clone)]
pub struct HttpPremiumClient {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    client: reqwest::Client,
}

impl HttpPremiumClient {
    /// Build from environment: `TTS_API_URL` (default https://api.openai.com/v1)
    /// and `TTS_API_KEY` (or `OPENAI_API_KEY`).
    pub fn from_env() -> SpeechResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                SpeechError::Config("premium TTS requires TTS_API_KEY or OPENAI_API_KEY".to_string())
            })?;
        Self::new(base_url, api_key)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> SpeechResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| SpeechError::Premium(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl PremiumSynthesizer for HttpPremiumClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<PremiumAudio> {
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        debug!(
            "Premium: requesting {} chars via voice {}",
            request.input.len(),
            request.voice
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SpeechError::Premium(format!(
                "TTS API error {}: {}",
                status, body
            )));
        }
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = res.bytes().await?;
        Ok(PremiumAudio {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
