//! Channel risk composition: blend classifier probability, analyst
//! confidence and the deterministic heuristic score into one per-channel
//! report.
//!
//! Both channels share the shape; the weights differ:
//! - message: 0.45 ml + 0.45 llm + 0.10 heuristic
//! - url:     0.45 ml + 0.35 llm + 0.20 structural
//!
//! Risk thresholds are inclusive at the lower bound: >=0.75 High,
//! >=0.45 Suspicious. Classification happens on the clamped raw score; the
//! reported score is rounded to 3 decimals afterwards.

use tracing::debug;

use crate::analyst::{Analyst, MessageSignal, UrlSignal};
use crate::brands::BrandMatcher;
use crate::classifier::Classifier;
use crate::enrich::ReputationProbe;
use crate::error::InputError;
use crate::features::{extract_url_features, structural_findings};
use crate::message::extract_message_features;
use crate::metrics::anon_hash;
use crate::verdict::{clamp01, round3, Channel, ChannelReport, RiskLevel};

const MESSAGE_ML_WEIGHT: f64 = 0.45;
const MESSAGE_LLM_WEIGHT: f64 = 0.45;
const MESSAGE_HEURISTIC_WEIGHT: f64 = 0.10;

const URL_ML_WEIGHT: f64 = 0.45;
const URL_LLM_WEIGHT: f64 = 0.35;
const URL_STRUCTURAL_WEIGHT: f64 = 0.20;

/// Run the message channel end to end.
pub async fn compose_message_channel(
    msg: &str,
    classifier: &Classifier,
    analyst: &dyn Analyst,
) -> ChannelReport {
    let feats = extract_message_features(msg);
    let ml_score = classifier.predict_message(&feats);

    let signal = MessageSignal::from(&feats);
    let llm = analyst.assess_message(&signal).await;

    let mut heuristic = 0.0;
    if feats.suspicious_tokens {
        heuristic += 0.25;
    }
    if feats.urgency_flag {
        heuristic += 0.25;
    }
    if feats.numbers_present >= 3 {
        heuristic += 0.15;
    }

    let raw = clamp01(
        MESSAGE_ML_WEIGHT * ml_score
            + MESSAGE_LLM_WEIGHT * llm.confidence
            + MESSAGE_HEURISTIC_WEIGHT * heuristic,
    );
    let risk_level = RiskLevel::from_single_score(raw);
    let final_score = round3(raw);

    debug!(
        id = %anon_hash(msg),
        ml = ml_score,
        llm = llm.confidence,
        heuristic,
        score = final_score,
        risk = risk_level.as_str(),
        "message channel composed"
    );

    ChannelReport {
        channel: Channel::Message,
        risk_level,
        final_score,
        model_probability: ml_score,
        scam_type: llm.scam_type,
        indicators: feats.tokens_detected,
        structural_reasons: Vec::new(),
        llm,
    }
}

/// Run the URL channel end to end. Fails only on empty/unparsable input.
pub async fn compose_url_channel(
    raw_url: &str,
    classifier: &Classifier,
    analyst: &dyn Analyst,
    brands: &BrandMatcher,
    probe: &dyn ReputationProbe,
    fetch_page: bool,
) -> Result<ChannelReport, InputError> {
    let feats = extract_url_features(raw_url, brands, probe, fetch_page).await?;
    let ml_score = classifier.predict_url(&feats);

    let signal = UrlSignal::from(&feats);
    let llm = analyst.assess_url(&signal).await;

    let findings = structural_findings(&feats);
    let structural = clamp01(findings.iter().map(|f| f.weight).sum());
    let indicators: Vec<String> = findings.iter().map(|f| f.tag.to_string()).collect();
    let structural_reasons: Vec<String> = findings.into_iter().map(|f| f.reason).collect();

    let raw = clamp01(
        URL_ML_WEIGHT * ml_score
            + URL_LLM_WEIGHT * llm.confidence
            + URL_STRUCTURAL_WEIGHT * structural,
    );
    let risk_level = RiskLevel::from_single_score(raw);
    let final_score = round3(raw);

    debug!(
        host = %feats.host,
        ml = ml_score,
        llm = llm.confidence,
        structural,
        score = final_score,
        risk = risk_level.as_str(),
        "url channel composed"
    );

    Ok(ChannelReport {
        channel: Channel::Url,
        risk_level,
        final_score,
        model_probability: ml_score,
        scam_type: llm.scam_type,
        indicators,
        structural_reasons,
        llm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::MockAnalyst;
    use crate::brands::{BrandList, BrandMatcher};
    use crate::enrich::NullProbe;
    use crate::verdict::ScamType;

    fn unloaded() -> Classifier {
        Classifier::default()
    }

    #[tokio::test]
    async fn urgent_bank_otp_message_scores_0613_suspicious() {
        // No classifier (ml = 0.5), mock analyst:
        // suspicious + urgency fire, one digit run =>
        //   llm confidence 0.75, heuristic 0.50,
        //   0.45*0.5 + 0.45*0.75 + 0.10*0.50 = 0.6125 -> 0.613
        let r = compose_message_channel(
            "URGENT! Verify your bank OTP 123456 now!!!",
            &unloaded(),
            &MockAnalyst,
        )
        .await;
        assert_eq!(r.model_probability, 0.5);
        assert_eq!(r.llm.confidence, 0.75);
        assert_eq!(r.llm.risk_level, RiskLevel::High);
        assert_eq!(r.final_score, 0.613);
        assert_eq!(r.risk_level, RiskLevel::Suspicious);
        assert_eq!(r.scam_type, ScamType::CredentialHarvesting);
        assert_eq!(r.channel, Channel::Message);
        assert!(r.structural_reasons.is_empty());
        assert_eq!(r.indicators, vec!["verify", "urgent", "otp", "bank"]);
    }

    #[tokio::test]
    async fn component_extremes_cap_the_score_at_one() {
        struct MaxedAnalyst;
        #[async_trait::async_trait]
        impl Analyst for MaxedAnalyst {
            async fn assess_message(&self, _s: &MessageSignal) -> crate::verdict::LlmAssessment {
                crate::verdict::LlmAssessment {
                    risk_level: RiskLevel::High,
                    confidence: 1.0,
                    scam_type: ScamType::OtpScam,
                    reasons: vec!["maxed".to_string()],
                }
            }
            async fn assess_url(&self, _s: &UrlSignal) -> crate::verdict::LlmAssessment {
                unreachable!()
            }
            fn provider_name(&self) -> &'static str {
                "maxed"
            }
        }

        // Force ml ~ 1.0 with an extreme bias.
        let c: Classifier = serde_json::from_str(
            r#"{"message": {"bias": 1000.0, "w_length": 0.0, "w_numbers": 0.0,
                "w_upper_ratio": 0.0, "w_exclamations": 0.0,
                "w_suspicious": 0.0, "w_urgency": 0.0}}"#,
        )
        .unwrap();

        // heuristic = 0.25 + 0.25 + 0.15 = 0.65; capped blend still <= 1.
        let r = compose_message_channel(
            "URGENT verify otp 1 2 3 now",
            &c,
            &MaxedAnalyst,
        )
        .await;
        assert!(r.final_score <= 1.0);
        assert_eq!(r.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn quiet_message_is_low() {
        let r = compose_message_channel("see you at lunch", &unloaded(), &MockAnalyst).await;
        // 0.45*0.5 + 0 + 0 = 0.225
        assert_eq!(r.final_score, 0.225);
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert_eq!(r.scam_type, ScamType::Unknown);
        assert_eq!(r.llm.reasons, vec!["No strong indicators.".to_string()]);
    }

    #[tokio::test]
    async fn url_channel_carries_structural_reasons() {
        let brands = BrandMatcher::token_overlap(BrandList::default_seed());
        let r = compose_url_channel(
            "http://xn--pypal-4ve.com/verify",
            &unloaded(),
            &MockAnalyst,
            &brands,
            &NullProbe,
            false,
        )
        .await
        .unwrap();
        assert_eq!(r.channel, Channel::Url);
        assert!(!r.structural_reasons.is_empty());
        assert!(r.indicators.iter().any(|t| t == "homoglyph_host"));
        assert!((0.0..=1.0).contains(&r.final_score));
    }

    #[tokio::test]
    async fn url_channel_rejects_empty_input() {
        let brands = BrandMatcher::token_overlap(BrandList::default_seed());
        let err = compose_url_channel("", &unloaded(), &MockAnalyst, &brands, &NullProbe, false)
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::Empty));
    }
}
