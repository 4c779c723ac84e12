//! Brand similarity matching against a curated reference list.
//!
//! Two strategies, picked once at startup and injected read-only:
//! an embedding oracle (remote encoder + cached brand vectors, cosine
//! similarity) when the capability is available, and a deterministic
//! token-Jaccard fallback that needs nothing but the list itself.
//!
//! `similarity()` never fails. An empty reference list yields the
//! `sim = -1.0` sentinel; a host or brand with no extractable tokens scores
//! `0.0` on the fallback path.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use std::{fs, path::Path};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_BRANDS_CONFIG_PATH: &str = "config/brands.json";

/// Best-matching brand for a host. `sim` is -1.0 only when there was no brand
/// to compare against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandMatch {
    pub best_brand: Option<String>,
    pub sim: f64,
}

impl BrandMatch {
    fn none_listed() -> Self {
        Self {
            best_brand: None,
            sim: -1.0,
        }
    }
}

/// Ordered reference list of known brand domains. Order matters: similarity
/// ties resolve to the first-listed brand.
#[derive(Debug, Clone, Deserialize)]
pub struct BrandList(pub Vec<String>);

impl BrandList {
    /// Load from a JSON array file; any read/parse failure falls back to the
    /// built-in seed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str::<Vec<String>>(&s)
                .map(BrandList)
                .unwrap_or_else(|_| Self::default_seed()),
            Err(_) => Self::default_seed(),
        }
    }

    /// Curated seed list used when no config file is present.
    pub fn default_seed() -> Self {
        BrandList(
            [
                "google.com",
                "amazon.in",
                "amazon.com",
                "paytm.com",
                "sbi.co.in",
                "icici.com",
                "axisbank.com",
                "flipkart.com",
                "airtel.in",
                "gmail.com",
                "facebook.com",
                "instagram.com",
                "phonepe.com",
                "hdfcbank.com",
                "paytm.in",
                "uidai.gov.in",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

/// Remote text encoder. The only capability the embedding strategy needs.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Encode one string; `None` on any provider failure.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
    fn name(&self) -> &'static str;
}

/// OpenAI embeddings endpoint. Requires `OPENAI_API_KEY`.
pub struct RemoteEmbeddings {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl RemoteEmbeddings {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: "text-embedding-3-small".to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingOracle for RemoteEmbeddings {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<Row>,
        }
        #[derive(Deserialize)]
        struct Row {
            embedding: Vec<f32>,
        }

        if self.api_key.is_empty() {
            return None;
        }
        let resp = self
            .http
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&Req {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        body.data.into_iter().next().map(|r| r.embedding)
    }

    fn name(&self) -> &'static str {
        "openai-embeddings"
    }
}

enum Strategy {
    Embedding {
        oracle: Arc<dyn EmbeddingOracle>,
        /// Brand vectors in list order, encoded once at startup.
        cache: Vec<(String, Vec<f32>)>,
    },
    TokenOverlap,
}

/// Similarity matcher over the reference list. Read-only after construction.
pub struct BrandMatcher {
    brands: Vec<String>,
    strategy: Strategy,
}

impl BrandMatcher {
    /// Deterministic token-overlap matcher. Always available.
    pub fn token_overlap(list: BrandList) -> Self {
        Self {
            brands: list.0,
            strategy: Strategy::TokenOverlap,
        }
    }

    /// Embedding-backed matcher. Encodes the whole brand list up front; if
    /// any brand fails to encode, the matcher degrades to token overlap so
    /// per-request behavior stays deterministic.
    pub async fn with_embeddings(list: BrandList, oracle: Arc<dyn EmbeddingOracle>) -> Self {
        let mut cache = Vec::with_capacity(list.0.len());
        for brand in &list.0 {
            match oracle.embed(brand).await {
                Some(vec) => cache.push((brand.clone(), vec)),
                None => {
                    warn!(
                        provider = oracle.name(),
                        brand = %brand,
                        "brand embedding failed; falling back to token overlap"
                    );
                    cache.clear();
                    break;
                }
            }
        }
        if cache.len() != list.0.len() {
            return Self::token_overlap(list);
        }
        info!(
            provider = oracle.name(),
            brands = cache.len(),
            "brand embedding cache ready"
        );
        Self {
            brands: list.0,
            strategy: Strategy::Embedding { oracle, cache },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    /// Score `host` against the reference list. Never fails.
    pub async fn similarity(&self, host: &str) -> BrandMatch {
        if self.brands.is_empty() {
            return BrandMatch::none_listed();
        }
        if host.is_empty() {
            return BrandMatch {
                best_brand: None,
                sim: 0.0,
            };
        }

        if let Strategy::Embedding { oracle, cache } = &self.strategy {
            if let Some(host_vec) = oracle.embed(host).await {
                let mut best: Option<&str> = None;
                let mut best_score = -1.0f64;
                for (brand, vec) in cache {
                    let sim = cosine(&host_vec, vec);
                    if sim > best_score {
                        best = Some(brand);
                        best_score = sim;
                    }
                }
                return BrandMatch {
                    best_brand: best.map(String::from),
                    sim: best_score,
                };
            }
            // Oracle down mid-flight: same request still gets an answer.
        }

        let mut best: Option<&str> = None;
        let mut best_score = -1.0f64;
        for brand in &self.brands {
            let sim = token_jaccard(host, brand);
            if sim > best_score {
                best = Some(brand);
                best_score = sim;
            }
        }
        BrandMatch {
            best_brand: best.map(String::from),
            sim: best_score,
        }
    }
}

static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W_]+").expect("token split regex"));

fn tokens(s: &str) -> BTreeSet<String> {
    TOKEN_SPLIT
        .split(&s.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Token-set Jaccard similarity; 0.0 when either side has no tokens.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let at = tokens(a);
    let bt = tokens(b);
    if at.is_empty() || bt.is_empty() {
        return 0.0;
    }
    let inter = at.intersection(&bt).count() as f64;
    let union = at.union(&bt).count() as f64;
    inter / union
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        na += (*x as f64) * (*x as f64);
        nb += (*y as f64) * (*y as f64);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
