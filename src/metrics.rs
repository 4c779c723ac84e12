//! Prometheus metrics plus the anonymized-id helper used by dev logging.
//!
//! Raw message text never reaches a log line; only the short sha256 digest
//! from `anon_hash` does.

use axum::{routing::get, Router};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::verdict::{FinalRisk, FusionSource};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. Call once, from the binary.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Count one fused verdict. A no-op when no recorder is installed (tests).
pub fn record_verdict(source: FusionSource, risk: FinalRisk) {
    counter!(
        "fusion_verdicts_total",
        "source" => source.as_str(),
        "risk" => risk.as_str()
    )
    .increment(1);
}

/// Count one QR decode attempt by outcome ("local", "qrserver", "failed").
pub fn record_qr_decode(outcome: &'static str) {
    counter!("qr_decodes_total", "outcome" => outcome).increment(1);
}

/// Short anonymized id for a piece of user text (first 6 bytes of sha256).
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
