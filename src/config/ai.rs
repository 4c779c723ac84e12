// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use tracing::warn;

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive); anything else resolves to the mock.
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    pub api_key: String,
    /// Optional model override, e.g. "gpt-4o-mini".
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            api_key: String::new(),
            model: None,
        }
    }
}

impl AnalystConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AnalystConfig = serde_json::from_str(&data)?;

        // Normalize provider
        cfg.provider = cfg.provider.to_lowercase();

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                other => {
                    anyhow::bail!("Unsupported provider in config: {other}");
                }
            };
        }

        Ok(cfg)
    }

    /// Load with a disabled-analyst fallback; startup never fails on a bad
    /// or missing config file.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "analyst config unavailable; analyst disabled");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tmp_file(content: &str) -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("analyst_cfg_{nanos}.json"));
        let mut f = fs::File::create(&dir).unwrap();
        write!(f, "{content}").unwrap();
        dir
    }

    #[test]
    fn loads_and_normalizes_provider() {
        let p = tmp_file(r#"{"enabled": true, "provider": "OpenAI", "api_key": "sk-test"}"#);
        let cfg = AnalystConfig::load_from_file(&p).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.api_key, "sk-test");
        let _ = fs::remove_file(p);
    }

    #[test]
    fn missing_file_falls_back_to_disabled() {
        let cfg = AnalystConfig::load_or_default("/nope/ai.json");
        assert!(!cfg.enabled);
    }

    #[test]
    fn unsupported_provider_with_env_key_is_an_error() {
        let p = tmp_file(r#"{"enabled": true, "provider": "acme", "api_key": "ENV"}"#);
        assert!(AnalystConfig::load_from_file(&p).is_err());
        let _ = fs::remove_file(p);
    }
}
