//! ML probability oracle: logistic models over the numeric feature rows.
//!
//! Coefficients load from `config/model.json`:
//!
//! {
//!   "message": { "bias": -1.9, "w_length": 0.002, "w_numbers": 0.16, ... },
//!   "url":     { "bias": -1.6, "w_length": 0.004, "w_hyphens": 0.35, ... }
//! }
//!
//! Either section may be absent; an unloaded channel predicts the neutral
//! 0.5. Prediction never fails and always lands in [0,1].

use std::{fs, io, path::Path};

use serde::Deserialize;
use tracing::info;

use crate::features::{UrlFeatures, YOUNG_DOMAIN_DAYS};
use crate::message::MessageFeatures;

pub const DEFAULT_MODEL_CONFIG_PATH: &str = "config/model.json";

/// Probability reported when no model is loaded.
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MessageModel {
    pub bias: f64,
    pub w_length: f64,
    pub w_numbers: f64,
    pub w_upper_ratio: f64,
    pub w_exclamations: f64,
    pub w_suspicious: f64,
    pub w_urgency: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UrlModel {
    pub bias: f64,
    pub w_length: f64,
    pub w_hyphens: f64,
    pub w_digit_flag: f64,
    pub w_homoglyph_ratio: f64,
    pub w_homoglyph_flag: f64,
    pub w_brand_sim: f64,
    pub w_young_domain: f64,
    pub w_missing_ssl: f64,
    pub w_suspicious_token: f64,
}

/// Loaded classifier state. `Default` is the fully-unloaded oracle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Classifier {
    #[serde(default)]
    message: Option<MessageModel>,
    #[serde(default)]
    url: Option<UrlModel>,
}

impl Classifier {
    /// Load from disk; any read/parse failure yields the unloaded oracle so
    /// the pipeline keeps running on neutral probabilities.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match load_model_file(path.as_ref()) {
            Ok(c) => {
                info!(
                    message_model = c.message.is_some(),
                    url_model = c.url.is_some(),
                    "classifier loaded"
                );
                c
            }
            Err(_) => {
                info!("no classifier model; predicting neutral probabilities");
                Self::default()
            }
        }
    }

    pub fn has_message_model(&self) -> bool {
        self.message.is_some()
    }

    pub fn has_url_model(&self) -> bool {
        self.url.is_some()
    }

    pub fn predict_message(&self, f: &MessageFeatures) -> f64 {
        let Some(m) = self.message else {
            return NEUTRAL_PROBABILITY;
        };
        let z = m.bias
            + m.w_length * f.message.chars().count() as f64
            + m.w_numbers * f.numbers_present as f64
            + m.w_upper_ratio * f.uppercase_ratio
            + m.w_exclamations * f.exclamations as f64
            + m.w_suspicious * bool_f(f.suspicious_tokens)
            + m.w_urgency * bool_f(f.urgency_flag);
        sigmoid(z)
    }

    pub fn predict_url(&self, f: &UrlFeatures) -> f64 {
        let Some(m) = self.url else {
            return NEUTRAL_PROBABILITY;
        };
        let young = matches!(f.whois_age_days, Some(age) if age <= YOUNG_DOMAIN_DAYS);
        let z = m.bias
            + m.w_length * f.length as f64
            + m.w_hyphens * f.hyphen_count as f64
            + m.w_digit_flag * bool_f(f.digit_flag)
            + m.w_homoglyph_ratio * f.homoglyph_ratio
            + m.w_homoglyph_flag * bool_f(f.homoglyph_flag)
            + m.w_brand_sim * f.brand_sim.max(0.0)
            + m.w_young_domain * bool_f(young)
            + m.w_missing_ssl * bool_f(!f.ssl_valid)
            + m.w_suspicious_token * bool_f(f.suspicious_path_token);
        sigmoid(z)
    }
}

fn load_model_file(path: &Path) -> io::Result<Classifier> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn bool_f(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
