//! Semantic analyst: provider abstraction + strict-JSON parsing + mock fallback.
//!
//! The real provider (OpenAI) is asked for strict JSON
//! `{risk_level, confidence, scam_type, reasons}`. Whatever goes wrong —
//! missing key, transport error, non-JSON chatter — the caller still gets an
//! assessment: first a brace-extraction salvage parse, then the deterministic
//! mock. Provider errors never leave this module.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalystConfig;
use crate::features::{UrlFeatures, YOUNG_DOMAIN_DAYS};
use crate::message::MessageFeatures;
use crate::verdict::{clamp01, round3, LlmAssessment, RiskLevel, ScamType};

/// Env override: force the mock analyst regardless of config.
pub const ENV_ANALYST_TEST_MODE: &str = "ANALYST_TEST_MODE";

const MAX_REASONS: usize = 6;
const MAX_REASON_LEN: usize = 200;

// ------------------------------------------------------------
// Structured signals sent to the analyst
// ------------------------------------------------------------

/// Message-channel record, the exact metadata the analyst reasons over.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSignal {
    pub message: String,
    pub suspicious_tokens: bool,
    pub tokens_detected: Vec<String>,
    pub has_urgency: bool,
    pub numbers_present: usize,
    pub uppercase_ratio: f64,
}

impl From<&MessageFeatures> for MessageSignal {
    fn from(f: &MessageFeatures) -> Self {
        Self {
            message: f.message.clone(),
            suspicious_tokens: f.suspicious_tokens,
            tokens_detected: f.tokens_detected.clone(),
            has_urgency: f.urgency_flag,
            numbers_present: f.numbers_present,
            uppercase_ratio: f.uppercase_ratio,
        }
    }
}

/// URL-channel record.
#[derive(Debug, Clone, Serialize)]
pub struct UrlSignal {
    pub url: String,
    pub host: String,
    pub domain: String,
    pub homoglyph_flag: bool,
    pub brand_best: Option<String>,
    pub brand_sim: f64,
    pub brand_lookalike: bool,
    pub whois_age_days: Option<i64>,
    pub ssl_valid: bool,
    pub suspicious_path_token: bool,
}

impl From<&UrlFeatures> for UrlSignal {
    fn from(f: &UrlFeatures) -> Self {
        Self {
            url: f.url.clone(),
            host: f.host.clone(),
            domain: f.domain.clone(),
            homoglyph_flag: f.homoglyph_flag,
            brand_best: f.brand_best.clone(),
            brand_sim: f.brand_sim,
            brand_lookalike: f.brand_lookalike,
            whois_age_days: f.whois_age_days,
            ssl_valid: f.ssl_valid,
            suspicious_path_token: f.suspicious_path_token,
        }
    }
}

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Trait object used by the channel composers. Must never fail.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn assess_message(&self, signal: &MessageSignal) -> LlmAssessment;
    async fn assess_url(&self, signal: &UrlSignal) -> LlmAssessment;
    /// Provider name for diagnostics/headers.
    fn provider_name(&self) -> &'static str;
}

pub type DynAnalyst = Arc<dyn Analyst>;

/// Factory: build an analyst according to config and environment.
///
/// * `ANALYST_TEST_MODE=mock` always returns the mock.
/// * Disabled config, unknown provider, or a missing key return the mock —
///   the pipeline's "analyst unavailable" state IS the mock.
pub fn build_analyst(config: &AnalystConfig) -> DynAnalyst {
    if std::env::var(ENV_ANALYST_TEST_MODE)
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockAnalyst);
    }
    if !config.enabled {
        return Arc::new(MockAnalyst);
    }
    match config.provider.as_str() {
        "openai" => {
            if config.api_key.is_empty() {
                debug!("analyst enabled but no API key; using mock");
                return Arc::new(MockAnalyst);
            }
            Arc::new(OpenAiAnalyst::new(
                config.api_key.clone(),
                config.model.as_deref(),
            ))
        }
        _ => Arc::new(MockAnalyst),
    }
}

// ------------------------------------------------------------
// Mock analyst (deterministic rule-based stand-in)
// ------------------------------------------------------------

/// Deterministic stand-in used whenever the real analyst is unavailable or
/// its output cannot be parsed.
pub struct MockAnalyst;

impl MockAnalyst {
    pub fn assess_message_signal(signal: &MessageSignal) -> LlmAssessment {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if signal.suspicious_tokens {
            score += 0.45;
            reasons.push("Suspicious scam-related words detected.".to_string());
        }
        if signal.has_urgency {
            score += 0.30;
            reasons.push("Urgency language present.".to_string());
        }
        if signal.numbers_present > 2 {
            score += 0.15;
            reasons.push("High number usage (OTP/ref IDs).".to_string());
        }

        let scam_type = if signal.suspicious_tokens {
            ScamType::CredentialHarvesting
        } else {
            ScamType::Unknown
        };

        finish_mock(score, scam_type, reasons)
    }

    pub fn assess_url_signal(signal: &UrlSignal) -> LlmAssessment {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if signal.homoglyph_flag {
            score += 0.40;
            reasons.push("Hostname uses look-alike characters from another script.".to_string());
        }
        if signal.brand_lookalike {
            score += 0.30;
            reasons.push("Domain closely imitates a known brand.".to_string());
        }
        if matches!(signal.whois_age_days, Some(age) if age <= YOUNG_DOMAIN_DAYS) {
            score += 0.15;
            reasons.push("Domain was registered very recently.".to_string());
        }
        if signal.suspicious_path_token {
            score += 0.15;
            reasons.push("Credential-related words in the URL path or query.".to_string());
        }

        let scam_type = if signal.brand_lookalike || signal.suspicious_path_token {
            ScamType::CredentialHarvesting
        } else {
            ScamType::Unknown
        };

        finish_mock(score, scam_type, reasons)
    }
}

fn finish_mock(score: f64, scam_type: ScamType, mut reasons: Vec<String>) -> LlmAssessment {
    if reasons.is_empty() {
        reasons.push("No strong indicators.".to_string());
    }
    let confidence = round3(score.min(1.0));
    LlmAssessment {
        risk_level: RiskLevel::from_analyst_score(score),
        confidence,
        scam_type,
        reasons,
    }
}

#[async_trait]
impl Analyst for MockAnalyst {
    async fn assess_message(&self, signal: &MessageSignal) -> LlmAssessment {
        Self::assess_message_signal(signal)
    }

    async fn assess_url(&self, signal: &UrlSignal) -> LlmAssessment {
        Self::assess_url_signal(signal)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// OpenAI provider
// ------------------------------------------------------------

const MESSAGE_PROMPT: &str = "You are an AI cybersecurity analyst specializing in scam message detection. \
You will be given structured metadata from an SMS/WhatsApp message. \
Assess risk level (Low, Suspicious, High), predict scam type \
(credential_harvesting, fake_kyc, otp_scam, payment_scam, refund_scam, unknown), \
and give a short list of reasons. Output STRICT JSON only: \
{\"risk_level\": \"...\", \"confidence\": float, \"scam_type\": \"...\", \"reasons\": [\"...\"]}";

const URL_PROMPT: &str = "You are an AI cybersecurity analyst specializing in phishing URL detection. \
You will be given structured metadata extracted from a URL. \
Assess risk level (Low, Suspicious, High), predict scam type \
(credential_harvesting, fake_kyc, otp_scam, payment_scam, refund_scam, unknown), \
and give a short list of reasons. Output STRICT JSON only: \
{\"risk_level\": \"...\", \"confidence\": float, \"scam_type\": \"...\", \"reasons\": [\"...\"]}";

/// OpenAI Chat Completions provider. Requires an API key; falls back to the
/// mock per request on any failure.
pub struct OpenAiAnalyst {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiAnalyst {
    /// `model_override`: pass Some("gpt-4o-mini") to override; defaults to gpt-4o-mini.
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("phish-risk-analyzer/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }

    async fn fetch(&self, system: &str, user_payload: &str) -> Option<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user_payload,
                },
            ],
            temperature: 0.0,
            max_tokens: 300,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        body.choices.into_iter().next().map(|c| c.message.content)
    }
}

#[async_trait]
impl Analyst for OpenAiAnalyst {
    async fn assess_message(&self, signal: &MessageSignal) -> LlmAssessment {
        let payload = serde_json::to_string(signal).unwrap_or_default();
        match self.fetch(MESSAGE_PROMPT, &payload).await {
            Some(raw) => parse_assessment(&raw)
                .unwrap_or_else(|| MockAnalyst::assess_message_signal(signal)),
            None => {
                debug!("analyst call failed; using mock for message signal");
                MockAnalyst::assess_message_signal(signal)
            }
        }
    }

    async fn assess_url(&self, signal: &UrlSignal) -> LlmAssessment {
        let payload = serde_json::to_string(signal).unwrap_or_default();
        match self.fetch(URL_PROMPT, &payload).await {
            Some(raw) => {
                parse_assessment(&raw).unwrap_or_else(|| MockAnalyst::assess_url_signal(signal))
            }
            None => {
                debug!("analyst call failed; using mock for url signal");
                MockAnalyst::assess_url_signal(signal)
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Parsing & sanitization
// ------------------------------------------------------------

/// Strict-JSON parse of the provider output. On failure, retry against the
/// first brace-delimited substring (models love to wrap JSON in prose).
/// `None` means both attempts failed and the mock takes over.
pub fn parse_assessment(raw: &str) -> Option<LlmAssessment> {
    if let Ok(a) = serde_json::from_str::<LlmAssessment>(raw) {
        return Some(sanitize_assessment(a));
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<LlmAssessment>(&raw[start..=end])
        .ok()
        .map(sanitize_assessment)
}

/// Keep provider output inside the contract: confidence clamped to [0,1],
/// reasons capped and single-line.
fn sanitize_assessment(mut a: LlmAssessment) -> LlmAssessment {
    a.confidence = clamp01(a.confidence);
    a.reasons.truncate(MAX_REASONS);
    for r in &mut a.reasons {
        if r.len() > MAX_REASON_LEN {
            r.truncate(MAX_REASON_LEN);
        }
        *r = r.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    if a.reasons.is_empty() {
        a.reasons.push("No strong indicators.".to_string());
    }
    a
}
