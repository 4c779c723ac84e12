//! verdict.rs — typed records for risk levels, channel reports and the fused verdict.
//!
//! Everything here is built once per request, immutable after construction, and
//! serialized as-is on the API boundary. The shapes mirror what the fusion
//! engine consumes, so handlers and tests share one vocabulary.

use serde::{Deserialize, Serialize};

/// Risk classification for a single analysis channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "suspicious")]
    Suspicious,
    #[serde(alias = "high")]
    High,
}

impl RiskLevel {
    /// Single-channel thresholds, inclusive at the lower bound.
    pub fn from_single_score(score: f64) -> Self {
        if score >= 0.75 {
            RiskLevel::High
        } else if score >= 0.45 {
            RiskLevel::Suspicious
        } else {
            RiskLevel::Low
        }
    }

    /// Thresholds used by the analyst mocks (0.7 / 0.4).
    pub fn from_analyst_score(score: f64) -> Self {
        if score >= 0.7 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Suspicious
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Suspicious => "Suspicious",
            RiskLevel::High => "High",
        }
    }
}

/// Risk classification of the fused verdict. `Unknown` covers the cases where
/// no channel produced a result (no input, failed QR decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalRisk {
    Low,
    Suspicious,
    High,
    Unknown,
}

impl FinalRisk {
    /// Two-channel fusion thresholds. The Suspicious boundary is 0.50 here,
    /// intentionally distinct from the single-channel 0.45.
    pub fn from_fused_score(score: f64) -> Self {
        if score >= 0.75 {
            FinalRisk::High
        } else if score >= 0.50 {
            FinalRisk::Suspicious
        } else {
            FinalRisk::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalRisk::Low => "Low",
            FinalRisk::Suspicious => "Suspicious",
            FinalRisk::High => "High",
            FinalRisk::Unknown => "Unknown",
        }
    }
}

impl From<RiskLevel> for FinalRisk {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => FinalRisk::Low,
            RiskLevel::Suspicious => FinalRisk::Suspicious,
            RiskLevel::High => FinalRisk::High,
        }
    }
}

/// The two independent analysis tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Message,
    Url,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Message => "message",
            Channel::Url => "url",
        }
    }
}

/// Which channel(s) the fused verdict was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FusionSource {
    #[serde(rename = "message_only")]
    MessageOnly,
    #[serde(rename = "url_only")]
    UrlOnly,
    #[serde(rename = "message+url")]
    MessageAndUrl,
    #[serde(rename = "none")]
    None,
}

impl FusionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FusionSource::MessageOnly => "message_only",
            FusionSource::UrlOnly => "url_only",
            FusionSource::MessageAndUrl => "message+url",
            FusionSource::None => "none",
        }
    }
}

/// Scam-type label. The analyst may emit anything; unrecognized labels
/// deserialize to `Unknown` rather than failing the whole assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ScamType {
    CredentialHarvesting,
    FakeKyc,
    OtpScam,
    PaymentScam,
    RefundScam,
    NoQr,
    Unknown,
}

impl From<String> for ScamType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "credential_harvesting" => ScamType::CredentialHarvesting,
            "fake_kyc" => ScamType::FakeKyc,
            "otp_scam" => ScamType::OtpScam,
            "payment_scam" => ScamType::PaymentScam,
            "refund_scam" => ScamType::RefundScam,
            "no_qr" => ScamType::NoQr,
            _ => ScamType::Unknown,
        }
    }
}

impl ScamType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ScamType::Unknown)
    }
}

/// Structured output of the semantic analyst (real or mock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAssessment {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub scam_type: ScamType,
    pub reasons: Vec<String>,
}

/// Per-channel result: one of these per analyzed channel per request,
/// consumed immediately by the fusion engine, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel: Channel,
    pub risk_level: RiskLevel,
    pub final_score: f64,
    pub model_probability: f64,
    pub llm: LlmAssessment,
    pub scam_type: ScamType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<String>,
    /// URL channel only; stays empty for the message channel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structural_reasons: Vec<String>,
}

/// Final fused verdict returned on the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionVerdict {
    pub final_risk: FinalRisk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    pub source: FusionSource,
    pub scam_type: ScamType,
    pub explanation: Vec<String>,
    pub message_analysis: Option<ChannelReport>,
    pub url_analysis: Option<ChannelReport>,
}

/// Round to 3 decimals, the precision every exported score uses.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

pub fn clamp01(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_channel_thresholds_are_inclusive() {
        assert_eq!(RiskLevel::from_single_score(0.75), RiskLevel::High);
        assert_eq!(RiskLevel::from_single_score(0.749), RiskLevel::Suspicious);
        assert_eq!(RiskLevel::from_single_score(0.45), RiskLevel::Suspicious);
        assert_eq!(RiskLevel::from_single_score(0.449), RiskLevel::Low);
    }

    #[test]
    fn fused_thresholds_use_the_050_boundary() {
        assert_eq!(FinalRisk::from_fused_score(0.75), FinalRisk::High);
        assert_eq!(FinalRisk::from_fused_score(0.50), FinalRisk::Suspicious);
        assert_eq!(FinalRisk::from_fused_score(0.499), FinalRisk::Low);
    }

    #[test]
    fn scam_type_serializes_snake_case_and_tolerates_unknown_labels() {
        let v = serde_json::to_value(ScamType::CredentialHarvesting).unwrap();
        assert_eq!(v, serde_json::json!("credential_harvesting"));

        let parsed: ScamType = serde_json::from_str("\"some_new_label\"").unwrap();
        assert_eq!(parsed, ScamType::Unknown);
    }

    #[test]
    fn fusion_source_renames() {
        assert_eq!(
            serde_json::to_value(FusionSource::MessageAndUrl).unwrap(),
            serde_json::json!("message+url")
        );
    }

    #[test]
    fn round3_half_cases() {
        assert_eq!(round3(0.6125), 0.613);
        assert_eq!(round3(1.0), 1.0);
    }
}
