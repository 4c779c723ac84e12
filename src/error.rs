//! Error taxonomy. `InputError` is the only condition allowed to propagate,
//! and only up to the service boundary. Every degraded-but-handleable state
//! (enrichment down, classifier absent, analyst unreachable, QR undecodable)
//! is a typed fallback value at its call site, not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("empty input")]
    Empty,
    #[error("unparsable url: {0}")]
    Unparsable(String),
}
