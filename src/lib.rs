// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod analyst;
pub mod api;
pub mod brands;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod enrich;
pub mod error;
pub mod features;
pub mod fusion;
pub mod homoglyph;
pub mod hostname;
pub mod message;
pub mod metrics;
pub mod qr;
pub mod verdict;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::fusion::{fuse, AnalysisPipeline};
pub use crate::verdict::{ChannelReport, FinalRisk, FusionVerdict, RiskLevel, ScamType};
