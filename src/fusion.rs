//! Fusion engine: merge the optional message-channel and URL-channel reports
//! into the final verdict, plus the raw-text front door that splits a free
//! text into its embedded URL and the remaining message.
//!
//! Case weights and thresholds:
//! - both channels: 0.55 url + 0.45 message, >=0.75 High, >=0.50 Suspicious
//!   (the 0.50 boundary is specific to fusion; single channels classify at 0.45)
//! - one channel: that channel's own risk and score pass through unchanged
//! - no channels: an explicit Unknown verdict, never an unhandled state

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyst::DynAnalyst;
use crate::brands::BrandMatcher;
use crate::channel::{compose_message_channel, compose_url_channel};
use crate::classifier::Classifier;
use crate::enrich::ReputationProbe;
use crate::error::InputError;
use crate::metrics::record_verdict;
use crate::verdict::{
    round3, ChannelReport, FinalRisk, FusionSource, FusionVerdict, ScamType,
};

const FUSION_URL_WEIGHT: f64 = 0.55;
const FUSION_MESSAGE_WEIGHT: f64 = 0.45;

static URL_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://\S+").expect("url-in-text regex"));

/// First embedded URL in a free text, if any.
pub fn extract_url_from_text(text: &str) -> Option<String> {
    URL_IN_TEXT.find(text).map(|m| m.as_str().to_string())
}

/// The text with its first embedded URL removed.
pub fn clean_message(text: &str) -> String {
    match extract_url_from_text(text) {
        Some(url) => text.replace(&url, "").trim().to_string(),
        None => text.to_string(),
    }
}

/// Merge zero, one or two channel reports into the final verdict.
pub fn fuse(
    message_result: Option<ChannelReport>,
    url_result: Option<ChannelReport>,
) -> FusionVerdict {
    let verdict = match (message_result, url_result) {
        (Some(message), None) => FusionVerdict {
            final_risk: message.risk_level.into(),
            final_score: Some(message.final_score),
            source: FusionSource::MessageOnly,
            scam_type: message.scam_type,
            explanation: message.llm.reasons.clone(),
            message_analysis: Some(message),
            url_analysis: None,
        },

        (None, Some(url)) => {
            let mut explanation = url.llm.reasons.clone();
            explanation.extend(url.structural_reasons.iter().cloned());
            FusionVerdict {
                final_risk: url.risk_level.into(),
                final_score: Some(url.final_score),
                source: FusionSource::UrlOnly,
                scam_type: url.llm.scam_type,
                explanation,
                message_analysis: None,
                url_analysis: Some(url),
            }
        }

        (Some(message), Some(url)) => {
            let final_score = round3(
                FUSION_URL_WEIGHT * url.final_score + FUSION_MESSAGE_WEIGHT * message.final_score,
            );
            let final_risk = FinalRisk::from_fused_score(final_score);

            // URL verdict names the scam when it can; message fills the gap.
            let scam_type = if !url.llm.scam_type.is_unknown() {
                url.llm.scam_type
            } else {
                message.scam_type
            };

            let mut explanation = message.llm.reasons.clone();
            explanation.extend(url.llm.reasons.iter().cloned());
            explanation.extend(url.structural_reasons.iter().cloned());

            FusionVerdict {
                final_risk,
                final_score: Some(final_score),
                source: FusionSource::MessageAndUrl,
                scam_type,
                explanation,
                message_analysis: Some(message),
                url_analysis: Some(url),
            }
        }

        (None, None) => FusionVerdict {
            final_risk: FinalRisk::Unknown,
            final_score: None,
            source: FusionSource::None,
            scam_type: ScamType::Unknown,
            explanation: vec!["No message or URL was provided.".to_string()],
            message_analysis: None,
            url_analysis: None,
        },
    };

    record_verdict(verdict.source, verdict.final_risk);
    verdict
}

/// The whole analysis pipeline behind one handle: read-only singletons in,
/// verdicts out. Built once at startup, shared across requests.
pub struct AnalysisPipeline {
    classifier: Arc<Classifier>,
    analyst: DynAnalyst,
    brands: Arc<BrandMatcher>,
    probe: Arc<dyn ReputationProbe>,
    fetch_page: bool,
}

impl AnalysisPipeline {
    pub fn new(
        classifier: Arc<Classifier>,
        analyst: DynAnalyst,
        brands: Arc<BrandMatcher>,
        probe: Arc<dyn ReputationProbe>,
        fetch_page: bool,
    ) -> Self {
        Self {
            classifier,
            analyst,
            brands,
            probe,
            fetch_page,
        }
    }

    pub fn analyst_name(&self) -> &'static str {
        self.analyst.provider_name()
    }

    /// Message channel alone (QR routing, message-only analysis).
    pub async fn message_channel(&self, msg: &str) -> ChannelReport {
        compose_message_channel(msg, &self.classifier, self.analyst.as_ref()).await
    }

    /// URL channel alone (QR routing, URL-only analysis).
    pub async fn url_channel(&self, url: &str) -> Result<ChannelReport, InputError> {
        compose_url_channel(
            url,
            &self.classifier,
            self.analyst.as_ref(),
            &self.brands,
            self.probe.as_ref(),
            self.fetch_page,
        )
        .await
    }

    /// Analyze whichever inputs are present and fuse them. Empty strings
    /// count as absent.
    pub async fn analyze_combined(
        &self,
        message: Option<&str>,
        url: Option<&str>,
    ) -> Result<FusionVerdict, InputError> {
        let message = message.map(str::trim).filter(|m| !m.is_empty());
        let url = url.map(str::trim).filter(|u| !u.is_empty());

        let message_result = match message {
            Some(m) => Some(self.message_channel(m).await),
            None => None,
        };
        let url_result = match url {
            Some(u) => Some(self.url_channel(u).await?),
            None => None,
        };

        Ok(fuse(message_result, url_result))
    }

    /// Front door for raw text: split off the first embedded URL, analyze
    /// the rest as the message, fuse.
    pub async fn analyze_raw_input(&self, raw_text: &str) -> Result<FusionVerdict, InputError> {
        if raw_text.trim().is_empty() {
            return Err(InputError::Empty);
        }
        let url = extract_url_from_text(raw_text);
        let msg = clean_message(raw_text);
        self.analyze_combined(Some(&msg), url.as_deref()).await
    }
}
