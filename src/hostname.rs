//! Host normalization: scheme defaulting, URL parsing, punycode decoding and
//! the registrable-domain split.
//!
//! The decoded hostname is what every downstream component (homoglyph
//! detection, brand matching, enrichment) operates on.

use serde::Serialize;
use url::Url;

use crate::error::InputError;

/// Parsed and normalized view of one input URL.
///
/// `host` is lower-cased and punycode-decoded; `domain` is the registrable
/// domain (eTLD+1 under public-suffix rules).
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedUrl {
    pub original: String,
    pub candidate: String,
    pub scheme: String,
    pub host: String,
    pub domain: String,
    pub subdomain: String,
    pub path: String,
    pub query: String,
}

/// Normalize a raw URL-like string.
///
/// A missing `http(s)://` prefix gets `http://` prepended. Fails only on an
/// empty or unparsable input; punycode decoding never fails (the encoded host
/// is kept when decoding is not possible).
pub fn normalize_url(raw: &str) -> Result<NormalizedUrl, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|e| InputError::Unparsable(e.to_string()))?;
    let raw_host = parsed
        .host_str()
        .ok_or_else(|| InputError::Unparsable("url has no host".to_string()))?
        .to_ascii_lowercase();

    let host = safe_punycode_decode(&raw_host);
    let (domain, subdomain) = split_registrable(&host);

    Ok(NormalizedUrl {
        original: raw.to_string(),
        candidate,
        scheme: parsed.scheme().to_string(),
        host,
        domain,
        subdomain,
        path: parsed.path().to_string(),
        query: parsed.query().unwrap_or("").to_string(),
    })
}

/// Decode an IDNA/punycode hostname, keeping the input untouched when the
/// decoder reports errors.
fn safe_punycode_decode(host: &str) -> String {
    let (decoded, result) = idna::domain_to_unicode(host);
    if result.is_ok() && !decoded.is_empty() {
        decoded
    } else {
        host.to_string()
    }
}

/// Split a host into (registrable domain, subdomain) under public-suffix
/// rules. Hosts without a known suffix (raw IPs, `localhost`) map to
/// `(host, "")`.
fn split_registrable(host: &str) -> (String, String) {
    match psl::domain_str(host) {
        Some(domain) => {
            let sub = host
                .strip_suffix(domain)
                .map(|s| s.trim_end_matches('.'))
                .unwrap_or("");
            (domain.to_string(), sub.to_string())
        }
        None => (host.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(normalize_url(""), Err(InputError::Empty)));
        assert!(matches!(normalize_url("   "), Err(InputError::Empty)));
    }

    #[test]
    fn missing_scheme_defaults_to_http() {
        let n = normalize_url("example.com/login").unwrap();
        assert_eq!(n.candidate, "http://example.com/login");
        assert_eq!(n.scheme, "http");
        assert_eq!(n.host, "example.com");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let n = normalize_url("https://sub.example.co.uk/a?b=1").unwrap();
        assert_eq!(n.scheme, "https");
        assert_eq!(n.host, "sub.example.co.uk");
        assert_eq!(n.domain, "example.co.uk");
        assert_eq!(n.subdomain, "sub");
        assert_eq!(n.path, "/a");
        assert_eq!(n.query, "b=1");
    }

    #[test]
    fn punycode_host_is_decoded() {
        let n = normalize_url("http://xn--pypal-4ve.com/signin").unwrap();
        assert!(
            n.host.chars().any(|c| (c as u32) > 127),
            "expected a decoded non-ASCII host, got {}",
            n.host
        );
        assert!(n.host.ends_with(".com"));
    }

    #[test]
    fn host_without_known_suffix_keeps_whole_host_as_domain() {
        let n = normalize_url("http://localhost:8080/x").unwrap();
        assert_eq!(n.domain, "localhost");
        assert_eq!(n.subdomain, "");
    }

    #[test]
    fn garbage_is_unparsable() {
        assert!(matches!(
            normalize_url("http://"),
            Err(InputError::Unparsable(_))
        ));
    }

    #[test]
    fn original_is_preserved_verbatim() {
        let n = normalize_url("EXAMPLE.com").unwrap();
        assert_eq!(n.original, "EXAMPLE.com");
        assert_eq!(n.host, "example.com");
    }
}
