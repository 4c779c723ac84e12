//! QR content routing: decode an uploaded image (local decoder first, remote
//! API fallback), then send the decoded text down exactly one channel.
//!
//! Decoding itself is a collaborator behind [`QrDecoder`]; this module owns
//! the outcome shape, the fallback order and the prefix routing. A failed
//! decode produces the minimal `no_qr` verdict, not a full fusion verdict.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::InputError;
use crate::fusion::AnalysisPipeline;
use crate::metrics::record_qr_decode;
use crate::verdict::{ChannelReport, FinalRisk, ScamType};

const QR_API_FALLBACK: &str = "https://api.qrserver.com/v1/read-qr-code/";

/// Outcome of a decode attempt. `source` names the decoder that succeeded.
#[derive(Debug, Clone, Serialize)]
pub enum QrDecode {
    Decoded { data: String, source: &'static str },
    Failed { error: String },
}

#[async_trait]
pub trait QrDecoder: Send + Sync {
    /// Never fails; exhaustion of every strategy is the `Failed` variant.
    async fn decode(&self, image: &[u8]) -> QrDecode;
}

/// Local decode (when compiled in) followed by the remote multipart API.
pub struct TwoStageDecoder {
    http: reqwest::Client,
}

impl TwoStageDecoder {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("phish-risk-analyzer/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self { http }
    }

    #[cfg(feature = "qr-local")]
    fn decode_local(image: &[u8]) -> Option<String> {
        let img = image::load_from_memory(image).ok()?.to_luma8();
        let mut prepared = rqrr::PreparedImage::prepare(img);
        let grids = prepared.detect_grids();
        let (_, content) = grids.first()?.decode().ok()?;
        if content.is_empty() {
            None
        } else {
            Some(content)
        }
    }

    #[cfg(not(feature = "qr-local"))]
    fn decode_local(_image: &[u8]) -> Option<String> {
        None
    }

    async fn decode_remote(&self, image: &[u8]) -> Option<String> {
        #[derive(serde::Deserialize)]
        struct ApiEntry {
            symbol: Vec<ApiSymbol>,
        }
        #[derive(serde::Deserialize)]
        struct ApiSymbol {
            data: Option<String>,
        }

        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("qr.png")
            .mime_str("image/png")
            .ok()?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(QR_API_FALLBACK)
            .multipart(form)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let entries: Vec<ApiEntry> = resp.json().await.ok()?;
        entries
            .into_iter()
            .flat_map(|e| e.symbol)
            .find_map(|s| s.data.filter(|d| !d.is_empty()))
    }
}

impl Default for TwoStageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QrDecoder for TwoStageDecoder {
    async fn decode(&self, image: &[u8]) -> QrDecode {
        if let Some(data) = Self::decode_local(image) {
            record_qr_decode("local");
            return QrDecode::Decoded {
                data,
                source: "local",
            };
        }
        if let Some(data) = self.decode_remote(image).await {
            record_qr_decode("qrserver");
            return QrDecode::Decoded {
                data,
                source: "qrserver",
            };
        }
        record_qr_decode("failed");
        QrDecode::Failed {
            error: "No QR code found / decoding failed".to_string(),
        }
    }
}

/// Decoder that never decodes; for offline deployments and tests.
pub struct DisabledQrDecoder;

#[async_trait]
impl QrDecoder for DisabledQrDecoder {
    async fn decode(&self, _image: &[u8]) -> QrDecode {
        QrDecode::Failed {
            error: "QR decoding disabled".to_string(),
        }
    }
}

/// Channel report plus the decoded payload that produced it.
#[derive(Debug, Serialize)]
pub struct QrVerdict {
    #[serde(flatten)]
    pub analysis: ChannelReport,
    pub decoded_data: String,
    /// Which decoder produced the payload ("local" | "qrserver").
    pub source: String,
}

/// Minimal verdict for an undecodable image. Deliberately not a
/// `FusionVerdict`: there was nothing to analyze.
#[derive(Debug, Serialize)]
pub struct QrFailure {
    pub final_risk: FinalRisk,
    pub scam_type: ScamType,
    pub explanation: Vec<String>,
    pub decoded_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QrAnalysis {
    Report(Box<QrVerdict>),
    Failure(QrFailure),
}

/// `http(s)://`-prefixed payloads go to the URL channel, everything else is
/// treated as a message. Case-insensitive.
fn routes_to_url(data: &str) -> bool {
    let lower = data.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decode and analyze one uploaded image end to end.
pub async fn analyze_qr_bytes(
    image: &[u8],
    decoder: &dyn QrDecoder,
    pipeline: &AnalysisPipeline,
) -> Result<QrAnalysis, InputError> {
    match decoder.decode(image).await {
        QrDecode::Failed { error } => Ok(QrAnalysis::Failure(QrFailure {
            final_risk: FinalRisk::Unknown,
            scam_type: ScamType::NoQr,
            explanation: vec![error],
            decoded_data: None,
        })),
        QrDecode::Decoded { data, source } => {
            debug!(source, url = routes_to_url(&data), "qr payload decoded");
            let analysis = if routes_to_url(&data) {
                pipeline.url_channel(&data).await?
            } else {
                pipeline.message_channel(&data).await
            };
            Ok(QrAnalysis::Report(Box::new(QrVerdict {
                analysis,
                decoded_data: data,
                source: source.to_string(),
            })))
        }
    }
}
