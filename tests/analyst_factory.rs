// tests/analyst_factory.rs
// Run single-threaded because we mutate process env:
//   cargo test -- --test-threads=1
// (serial_test keeps these from interleaving either way.)

use std::env;

use serial_test::serial;

use phish_risk_analyzer::analyst::{build_analyst, ENV_ANALYST_TEST_MODE};
use phish_risk_analyzer::config::AnalystConfig;

/// Small RAII helper to snapshot & restore env vars in each test.
struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
}
impl EnvSnapshot {
    /// Provide a list of (KEY, Some(VALUE)) to set, or (KEY, None) to remove.
    fn set(pairs: &[(&str, Option<&str>)]) -> Self {
        let mut saved = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let key = k.to_string();
            let prev = env::var(k).ok();
            saved.push((key.clone(), prev));
            match v {
                Some(val) => env::set_var(&key, val),
                None => env::remove_var(&key),
            }
        }
        Self { saved }
    }
}
impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (k, maybe_v) in self.saved.drain(..) {
            match maybe_v {
                Some(v) => env::set_var(&k, v),
                None => env::remove_var(&k),
            }
        }
    }
}

fn cfg(enabled: bool, provider: &str, api_key: &str) -> AnalystConfig {
    AnalystConfig {
        enabled,
        provider: provider.to_string(),
        api_key: api_key.to_string(),
        model: None,
    }
}

#[test]
#[serial]
fn test_mode_forces_the_mock_even_when_enabled() {
    let _env = EnvSnapshot::set(&[(ENV_ANALYST_TEST_MODE, Some("mock"))]);
    let analyst = build_analyst(&cfg(true, "openai", "sk-real"));
    assert_eq!(analyst.provider_name(), "mock");
}

#[test]
#[serial]
fn disabled_config_resolves_to_the_mock() {
    let _env = EnvSnapshot::set(&[(ENV_ANALYST_TEST_MODE, None)]);
    let analyst = build_analyst(&cfg(false, "openai", "sk-real"));
    assert_eq!(analyst.provider_name(), "mock");
}

#[test]
#[serial]
fn enabled_openai_with_key_is_the_real_provider() {
    let _env = EnvSnapshot::set(&[(ENV_ANALYST_TEST_MODE, None)]);
    let analyst = build_analyst(&cfg(true, "openai", "sk-real"));
    assert_eq!(analyst.provider_name(), "openai");
}

#[test]
#[serial]
fn enabled_without_key_degrades_to_the_mock() {
    let _env = EnvSnapshot::set(&[(ENV_ANALYST_TEST_MODE, None)]);
    let analyst = build_analyst(&cfg(true, "openai", ""));
    assert_eq!(analyst.provider_name(), "mock");
}

#[test]
#[serial]
fn unknown_provider_degrades_to_the_mock() {
    let _env = EnvSnapshot::set(&[(ENV_ANALYST_TEST_MODE, None)]);
    let analyst = build_analyst(&cfg(true, "acme-llm", "sk-real"));
    assert_eq!(analyst.provider_name(), "mock");
}

/// The mock must answer without any network or credentials at all.
#[test]
#[serial]
fn mock_assesses_offline() {
    let _env = EnvSnapshot::set(&[(ENV_ANALYST_TEST_MODE, Some("mock"))]);
    let analyst = build_analyst(&cfg(true, "openai", "sk-real"));
    let signal = phish_risk_analyzer::analyst::MessageSignal {
        message: "verify otp now".to_string(),
        suspicious_tokens: true,
        tokens_detected: vec!["verify".to_string(), "otp".to_string()],
        has_urgency: true,
        numbers_present: 0,
        uppercase_ratio: 0.0,
    };
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let a = rt.block_on(analyst.assess_message(&signal));
    assert_eq!(a.confidence, 0.75);
}
