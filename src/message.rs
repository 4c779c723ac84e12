//! Lexical feature extraction for the message channel.
//!
//! All checks are case-insensitive substring tests against fixed word lists;
//! the output record feeds the classifier and the semantic analyst.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::verdict::round3;

/// Scam-adjacent vocabulary. Order is preserved in `tokens_detected`.
pub const SUSPICIOUS_KEYWORDS: [&str; 21] = [
    "kyc",
    "verify",
    "update",
    "blocked",
    "expire",
    "deactivate",
    "urgent",
    "immediately",
    "otp",
    "password",
    "bank",
    "upi",
    "refund",
    "account",
    "secure",
    "amazon",
    "sbi",
    "hdfc",
    "icici",
    "loan",
    "offer",
];

const URGENCY_WORDS: [&str; 4] = ["urgent", "immediately", "expire", "now"];

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit run regex"));

/// Fixed-schema lexical features of one message. Rebuilt per request.
#[derive(Debug, Clone, Serialize)]
pub struct MessageFeatures {
    pub message: String,
    pub tokens_detected: Vec<String>,
    pub suspicious_tokens: bool,
    pub urgency_flag: bool,
    /// Count of maximal digit runs ("OTP 123456 ref 99" -> 2).
    pub numbers_present: usize,
    /// Uppercase chars / message length, rounded to 3 decimals.
    pub uppercase_ratio: f64,
    pub exclamations: usize,
}

pub fn extract_message_features(msg: &str) -> MessageFeatures {
    let lower = msg.to_lowercase();

    let tokens_detected: Vec<String> = SUSPICIOUS_KEYWORDS
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| k.to_string())
        .collect();
    let urgency_flag = URGENCY_WORDS.iter().any(|w| lower.contains(w));
    let numbers_present = DIGIT_RUNS.find_iter(&lower).count();
    let exclamations = lower.matches('!').count();

    let len = msg.chars().count();
    let upper = msg.chars().filter(|c| c.is_uppercase()).count();
    let uppercase_ratio = round3(upper as f64 / len.max(1) as f64);

    MessageFeatures {
        message: msg.to_string(),
        suspicious_tokens: !tokens_detected.is_empty(),
        tokens_detected,
        urgency_flag,
        numbers_present,
        uppercase_ratio,
        exclamations,
    }
}
