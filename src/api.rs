//! HTTP service boundary: request shapes, handlers, router and the shared
//! read-only state. The pipeline does the work; this layer only frames it.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::analyst::build_analyst;
use crate::brands::{BrandList, BrandMatcher, RemoteEmbeddings, DEFAULT_BRANDS_CONFIG_PATH};
use crate::classifier::{Classifier, DEFAULT_MODEL_CONFIG_PATH};
use crate::config::ai::DEFAULT_AI_CONFIG_PATH;
use crate::config::AnalystConfig;
use crate::enrich::{NetProbe, NullProbe, ReputationProbe};
use crate::error::InputError;
use crate::fusion::AnalysisPipeline;
use crate::qr::{analyze_qr_bytes, DisabledQrDecoder, QrAnalysis, QrDecoder, TwoStageDecoder};
use crate::verdict::FusionVerdict;

pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";
pub const ENV_BRANDS_CONFIG_PATH: &str = "BRANDS_CONFIG_PATH";
pub const ENV_MODEL_CONFIG_PATH: &str = "MODEL_CONFIG_PATH";
/// Set to "1" to disable every outbound network call (probes, QR fallback).
pub const ENV_ANALYZE_OFFLINE: &str = "ANALYZE_OFFLINE";
/// Set to "1" to resolve redirect chains during URL analysis.
pub const ENV_ANALYZE_FETCH_PAGE: &str = "ANALYZE_FETCH_PAGE";

/// Read-only singletons shared by all requests.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<AnalysisPipeline>,
    qr: Arc<dyn QrDecoder>,
}

impl AppState {
    pub fn new(pipeline: Arc<AnalysisPipeline>, qr: Arc<dyn QrDecoder>) -> Self {
        Self { pipeline, qr }
    }

    /// Fully offline state: mock analyst, unloaded classifier, token-overlap
    /// brand matching, no probes, no QR decoding. Deterministic; used by
    /// tests and air-gapped deployments.
    pub fn offline() -> Self {
        let pipeline = AnalysisPipeline::new(
            Arc::new(Classifier::default()),
            Arc::new(crate::analyst::MockAnalyst),
            Arc::new(BrandMatcher::token_overlap(BrandList::default_seed())),
            Arc::new(NullProbe),
            false,
        );
        Self {
            pipeline: Arc::new(pipeline),
            qr: Arc::new(DisabledQrDecoder),
        }
    }

    /// Build state from config files and environment. Capability checks
    /// happen here, once; every degraded capability selects its fallback
    /// strategy up front.
    pub async fn from_env() -> Self {
        let offline = env_flag(ENV_ANALYZE_OFFLINE);
        let fetch_page = env_flag(ENV_ANALYZE_FETCH_PAGE);

        let ai_path = std::env::var(ENV_AI_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_AI_CONFIG_PATH.to_string());
        let cfg = AnalystConfig::load_or_default(&ai_path);
        // Safe diagnostics: provider + enabled + key length only.
        info!(
            provider = %cfg.provider,
            enabled = cfg.enabled,
            key_len = cfg.api_key.len(),
            "analyst config loaded"
        );
        let analyst = build_analyst(&cfg);

        let model_path = std::env::var(ENV_MODEL_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_MODEL_CONFIG_PATH.to_string());
        let classifier = Arc::new(Classifier::load_from_file(&model_path));

        let brands_path = std::env::var(ENV_BRANDS_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_BRANDS_CONFIG_PATH.to_string());
        let brand_list = BrandList::load_from_file(&brands_path);
        let brands = if !offline && cfg.enabled && !cfg.api_key.is_empty() {
            let oracle = Arc::new(RemoteEmbeddings::new(cfg.api_key.clone()));
            Arc::new(BrandMatcher::with_embeddings(brand_list, oracle).await)
        } else {
            Arc::new(BrandMatcher::token_overlap(brand_list))
        };

        let probe: Arc<dyn ReputationProbe> = if offline {
            Arc::new(NullProbe)
        } else {
            Arc::new(NetProbe::new())
        };
        let qr: Arc<dyn QrDecoder> = if offline {
            Arc::new(DisabledQrDecoder)
        } else {
            Arc::new(TwoStageDecoder::new())
        };

        let pipeline = AnalysisPipeline::new(classifier, analyst, brands, probe, fetch_page);
        info!(
            analyst = pipeline.analyst_name(),
            offline, fetch_page, "analysis pipeline ready"
        );
        Self {
            pipeline: Arc::new(pipeline),
            qr,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().as_deref() == Some("1")
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/analyze-qr", post(analyze_qr))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HomeResp {
    status: &'static str,
}

async fn home() -> Json<HomeResp> {
    Json(HomeResp {
        status: "Backend running successfully",
    })
}

#[derive(serde::Deserialize)]
struct AnalyzeReq {
    text: String,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<FusionVerdict>, ApiError> {
    let verdict = state.pipeline.analyze_raw_input(&body.text).await?;
    Ok(Json(verdict))
}

#[derive(serde::Deserialize)]
struct QrReq {
    image_base64: String,
}

async fn analyze_qr(
    State(state): State<AppState>,
    Json(body): Json<QrReq>,
) -> Result<Json<QrAnalysis>, ApiError> {
    let image = BASE64
        .decode(body.image_base64.trim())
        .map_err(|_| ApiError::BadInput("invalid base64 image".to_string()))?;
    if image.is_empty() {
        return Err(ApiError::BadInput("empty image".to_string()));
    }
    let out = analyze_qr_bytes(&image, state.qr.as_ref(), &state.pipeline).await?;
    Ok(Json(out))
}

/// Boundary error: malformed input gets a 400 with a short message, anything
/// unexpected a generic 500 with no internal detail.
pub enum ApiError {
    BadInput(String),
    Internal,
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        ApiError::BadInput(e.to_string())
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadInput(msg) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { error: msg })).into_response()
            }
            ApiError::Internal => {
                error!("internal error on analysis request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}
