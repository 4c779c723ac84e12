//! URL feature extraction: composes host normalization, homoglyph detection,
//! brand matching and reputation enrichment into one feature record plus the
//! structural risk findings the URL channel reports.

use serde::Serialize;

use crate::brands::BrandMatcher;
use crate::enrich::{RedirectOutcome, ReputationProbe};
use crate::error::InputError;
use crate::homoglyph::detect_homoglyphs;
use crate::hostname::normalize_url;

/// Words in a path or query that phishing pages lean on.
const PATH_TOKENS: [&str; 9] = [
    "verify", "login", "secure", "update", "account", "confirm", "bank", "payment", "otp",
];

/// Age (days) at or below which a domain counts as freshly registered.
pub const YOUNG_DOMAIN_DAYS: i64 = 30;

/// Jaro-Winkler floor for calling a second-level label a brand typosquat.
const TYPOSQUAT_SIM: f64 = 0.92;

/// Fixed-schema feature record of one URL. Rebuilt per request.
#[derive(Debug, Clone, Serialize)]
pub struct UrlFeatures {
    pub url: String,
    pub host: String,
    pub domain: String,
    pub subdomain: String,
    pub path: String,
    pub query: String,
    pub length: usize,
    pub hyphen_count: usize,
    pub digit_flag: bool,
    pub homoglyph_ratio: f64,
    pub homoglyph_flag: bool,
    pub brand_best: Option<String>,
    pub brand_sim: f64,
    pub brand_lookalike: bool,
    pub whois_age_days: Option<i64>,
    pub ssl_valid: bool,
    pub suspicious_path_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectOutcome>,
}

/// One structural risk signal: a stable tag, its rule weight and the
/// human-readable reason string.
#[derive(Debug, Clone)]
pub struct StructuralFinding {
    pub tag: &'static str,
    pub weight: f64,
    pub reason: String,
}

pub(crate) fn has_suspicious_tokens(path_or_query: &str) -> bool {
    let text = path_or_query.to_lowercase();
    PATH_TOKENS.iter().any(|t| text.contains(t))
}

/// Extract the URL feature record. `fetch_page` additionally resolves the
/// redirect chain and probes SSL against the final host instead of the
/// original one; enrichment failures degrade to their typed fallbacks and
/// never abort extraction.
pub async fn extract_url_features(
    raw_url: &str,
    brands: &BrandMatcher,
    probe: &dyn ReputationProbe,
    fetch_page: bool,
) -> Result<UrlFeatures, InputError> {
    let parsed = normalize_url(raw_url)?;
    let homog = detect_homoglyphs(&parsed.host);
    let brand = brands.similarity(&parsed.host).await;

    let mut age = probe.age_days(&parsed.domain).await;
    if age.is_none() {
        age = probe.age_heuristic(&parsed.domain);
    }

    let (ssl_valid, redirect) = if fetch_page {
        let outcome = probe.redirect_chain(&parsed.candidate).await;
        let probe_host = outcome.final_host().unwrap_or_else(|| parsed.host.clone());
        (probe.ssl_ok(&probe_host).await, Some(outcome))
    } else {
        (probe.ssl_ok(&parsed.host).await, None)
    };

    let brand_lookalike = is_brand_lookalike(&parsed.domain, brand.best_brand.as_deref(), brand.sim);

    Ok(UrlFeatures {
        length: parsed.original.chars().count(),
        hyphen_count: parsed.host.matches('-').count(),
        digit_flag: parsed.host.chars().any(|c| c.is_ascii_digit()),
        homoglyph_ratio: homog.non_ascii_ratio,
        homoglyph_flag: homog.block_flag,
        brand_best: brand.best_brand,
        brand_sim: brand.sim,
        brand_lookalike,
        whois_age_days: age,
        ssl_valid,
        suspicious_path_token: has_suspicious_tokens(&format!(
            "{} {}",
            parsed.path, parsed.query
        )),
        redirect,
        url: parsed.original,
        host: parsed.host,
        domain: parsed.domain,
        subdomain: parsed.subdomain,
        path: parsed.path,
        query: parsed.query,
    })
}

/// A domain imitates a brand when it scores high against the reference list
/// without being that brand: token similarity from the matcher, or a
/// near-identical second-level label (typosquat).
fn is_brand_lookalike(domain: &str, best_brand: Option<&str>, sim: f64) -> bool {
    let Some(best) = best_brand else {
        return false;
    };
    if domain.eq_ignore_ascii_case(best) {
        return false;
    }
    if sim >= 0.75 {
        return true;
    }
    strsim::jaro_winkler(sld(domain), sld(best)) >= TYPOSQUAT_SIM
}

fn sld(domain: &str) -> &str {
    domain.split('.').next().unwrap_or("")
}

/// Derive the structural findings from a feature record. Deterministic; the
/// URL channel sums the weights (clamped to 1) into its rule score and keeps
/// the reasons verbatim.
pub fn structural_findings(f: &UrlFeatures) -> Vec<StructuralFinding> {
    let mut findings = Vec::new();

    if f.homoglyph_flag {
        findings.push(StructuralFinding {
            tag: "homoglyph_host",
            weight: 0.30,
            reason: "Hostname mixes look-alike characters from a suspicious Unicode script."
                .to_string(),
        });
    }
    if f.brand_lookalike {
        let brand = f.brand_best.as_deref().unwrap_or("a known brand");
        findings.push(StructuralFinding {
            tag: "brand_lookalike",
            weight: 0.25,
            reason: format!("Domain closely imitates {brand} without being it."),
        });
    }
    if matches!(f.whois_age_days, Some(age) if age <= YOUNG_DOMAIN_DAYS) {
        let age = f.whois_age_days.unwrap_or_default();
        findings.push(StructuralFinding {
            tag: "young_domain",
            weight: 0.20,
            reason: format!("Domain appears recently registered ({age} days old)."),
        });
    }
    if !f.ssl_valid {
        findings.push(StructuralFinding {
            tag: "no_ssl",
            weight: 0.10,
            reason: "HTTPS probe failed; site unreachable over TLS.".to_string(),
        });
    }
    if f.suspicious_path_token {
        findings.push(StructuralFinding {
            tag: "suspicious_path",
            weight: 0.10,
            reason: "Credential-related words in the URL path or query.".to_string(),
        });
    }
    if f.hyphen_count >= 2 || f.digit_flag {
        findings.push(StructuralFinding {
            tag: "noisy_host",
            weight: 0.05,
            reason: "Hostname padded with hyphens or digits.".to_string(),
        });
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brands::{BrandList, BrandMatcher};
    use crate::enrich::NullProbe;

    fn matcher() -> BrandMatcher {
        BrandMatcher::token_overlap(BrandList::default_seed())
    }

    async fn extract(url: &str) -> UrlFeatures {
        extract_url_features(url, &matcher(), &NullProbe, false)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn benign_url_has_quiet_features() {
        let f = extract("https://example.com/about").await;
        assert!(!f.homoglyph_flag);
        assert!(!f.brand_lookalike);
        assert!(!f.suspicious_path_token);
        assert!(!f.digit_flag);
        // Offline probe: no SSL, no WHOIS.
        assert!(!f.ssl_valid);
        assert_eq!(f.whois_age_days, None);
    }

    #[tokio::test]
    async fn punycode_brand_spoof_is_flagged() {
        let f = extract("http://xn--pypal-4ve.com/verify").await;
        assert!(f.homoglyph_flag);
        assert!(f.homoglyph_ratio > 0.0);
        assert!(f.suspicious_path_token);
    }

    #[tokio::test]
    async fn age_heuristic_kicks_in_for_suspicious_tld() {
        let f = extract("http://free-gift.xyz").await;
        assert_eq!(f.whois_age_days, Some(7));
    }

    #[tokio::test]
    async fn exact_brand_domain_is_not_a_lookalike() {
        let f = extract("https://paytm.com/offers").await;
        assert_eq!(f.brand_best.as_deref(), Some("paytm.com"));
        assert!(!f.brand_lookalike);
    }

    #[tokio::test]
    async fn typosquat_sld_is_a_lookalike() {
        let f = extract("https://gooogle.com/login").await;
        assert!(f.brand_lookalike, "brand_sim={} best={:?}", f.brand_sim, f.brand_best);
    }

    #[test]
    fn suspicious_token_check_is_case_insensitive() {
        assert!(has_suspicious_tokens("/VERIFY/session"));
        assert!(has_suspicious_tokens("next=LOGIN"));
        assert!(!has_suspicious_tokens("/blog/post-1"));
    }

    #[tokio::test]
    async fn structural_findings_weights_and_order() {
        let f = extract("http://xn--pypal-4ve.com/verify").await;
        let findings = structural_findings(&f);
        let tags: Vec<&str> = findings.iter().map(|s| s.tag).collect();
        assert!(tags.contains(&"homoglyph_host"));
        assert!(tags.contains(&"no_ssl"));
        assert!(tags.contains(&"suspicious_path"));
        for s in &findings {
            assert!(s.weight > 0.0 && s.weight <= 0.30);
        }
    }
}
