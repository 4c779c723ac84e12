//! Domain reputation enrichment: WHOIS age, SSL reachability and redirect
//! chains.
//!
//! Every method is fault-isolated: a network failure, timeout or unparsable
//! answer becomes a typed fallback value (`None` / `false` /
//! [`RedirectOutcome::Unavailable`]) at the call site. One attempt per
//! request, no retries; timeouts are seconds-scale.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// TLDs whose registrations skew heavily toward throwaway domains.
const SUSPICIOUS_TLDS: [&str; 10] = [
    ".xyz", ".top", ".loan", ".info", ".pw", ".site", ".online", ".rest", ".space", ".ru",
];

const MAX_REDIRECT_HOPS: usize = 10;

/// Result of following a URL's redirect chain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectOutcome {
    Resolved {
        chain: Vec<String>,
        hosts: Vec<String>,
        final_url: String,
        status_code: u16,
    },
    Unavailable {
        error: String,
    },
}

impl RedirectOutcome {
    pub fn final_host(&self) -> Option<String> {
        match self {
            RedirectOutcome::Resolved { final_url, .. } => Url::parse(final_url)
                .ok()
                .and_then(|u| u.host_str().map(String::from)),
            RedirectOutcome::Unavailable { .. } => None,
        }
    }
}

/// Network-dependent reputation lookups. Implementations must absorb their
/// own failures; callers never see an error from these methods.
#[async_trait]
pub trait ReputationProbe: Send + Sync {
    /// WHOIS-backed domain age in days; `None` on any failure.
    async fn age_days(&self, domain: &str) -> Option<i64>;

    /// Deterministic stand-in when WHOIS yields nothing: suspicious TLD -> 7,
    /// any digit in the domain -> 14, else `None`.
    fn age_heuristic(&self, domain: &str) -> Option<i64> {
        if domain.is_empty() {
            return None;
        }
        if SUSPICIOUS_TLDS.iter().any(|t| domain.ends_with(t)) {
            return Some(7);
        }
        if domain.chars().any(|c| c.is_ascii_digit()) {
            return Some(14);
        }
        None
    }

    /// `true` iff an HTTPS GET against the host answers below status 400.
    async fn ssl_ok(&self, host: &str) -> bool;

    /// Follow the redirect chain of `url`, collecting every hop.
    async fn redirect_chain(&self, url: &str) -> RedirectOutcome;
}

/// Real network probe.
pub struct NetProbe {
    /// Follows redirects; used by the SSL reachability check.
    http: reqwest::Client,
    /// Never follows; used to walk the chain hop by hop.
    bare: reqwest::Client,
    whois_timeout: Duration,
}

impl NetProbe {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent("phish-risk-analyzer/0.1")
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(3))
            .build()
            .expect("reqwest client");
        let bare = reqwest::Client::builder()
            .user_agent("phish-risk-analyzer/0.1")
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self {
            http,
            bare,
            whois_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for NetProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReputationProbe for NetProbe {
    async fn age_days(&self, domain: &str) -> Option<i64> {
        if domain.is_empty() {
            return None;
        }
        let tld = domain.rsplit('.').next()?;

        // IANA tells us which registry serves the TLD.
        let referral = whois_query("whois.iana.org", tld, self.whois_timeout).await?;
        let server = extract_field(&referral, &WHOIS_REFER)?;

        let record = whois_query(&server, domain, self.whois_timeout).await?;
        let raw_date = extract_field(&record, &WHOIS_CREATED)?;
        let created = parse_whois_date(&raw_date)?;

        let days = (Utc::now().date_naive() - created).num_days();
        if days < 0 {
            debug!(domain, %created, "whois creation date in the future; ignoring");
            return None;
        }
        Some(days)
    }

    async fn ssl_ok(&self, host: &str) -> bool {
        if host.is_empty() {
            return false;
        }
        match self.http.get(format!("https://{host}")).send().await {
            Ok(resp) => resp.status().as_u16() < 400,
            Err(_) => false,
        }
    }

    async fn redirect_chain(&self, url: &str) -> RedirectOutcome {
        let mut current = url.to_string();
        let mut chain: Vec<String> = Vec::new();

        for _ in 0..MAX_REDIRECT_HOPS {
            let resp = match self.bare.get(&current).send().await {
                Ok(r) => r,
                Err(e) => {
                    return RedirectOutcome::Unavailable {
                        error: e.to_string(),
                    }
                }
            };
            chain.push(current.clone());
            let status = resp.status();

            if status.is_redirection() {
                let location = resp
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                match location {
                    Some(loc) => {
                        // Relative redirects resolve against the current hop.
                        current = match Url::parse(&current).and_then(|b| b.join(&loc)) {
                            Ok(u) => u.to_string(),
                            Err(_) => loc,
                        };
                        continue;
                    }
                    None => return finish_chain(chain, current, status.as_u16()),
                }
            }
            return finish_chain(chain, current, status.as_u16());
        }
        RedirectOutcome::Unavailable {
            error: "too many redirects".to_string(),
        }
    }
}

fn finish_chain(chain: Vec<String>, final_url: String, status_code: u16) -> RedirectOutcome {
    let hosts = chain
        .iter()
        .filter_map(|u| Url::parse(u).ok().and_then(|p| p.host_str().map(String::from)))
        .collect();
    RedirectOutcome::Resolved {
        chain,
        hosts,
        final_url,
        status_code,
    }
}

/// Offline probe: every lookup degrades immediately. Backs tests and
/// deployments where outbound probing is disabled.
pub struct NullProbe;

#[async_trait]
impl ReputationProbe for NullProbe {
    async fn age_days(&self, _domain: &str) -> Option<i64> {
        None
    }

    async fn ssl_ok(&self, _host: &str) -> bool {
        false
    }

    async fn redirect_chain(&self, _url: &str) -> RedirectOutcome {
        RedirectOutcome::Unavailable {
            error: "network probing disabled".to_string(),
        }
    }
}

// --- WHOIS plumbing ---

static WHOIS_REFER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:refer|whois):\s*(\S+)").expect("whois refer regex"));
static WHOIS_CREATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:creation date|created(?: on)?|registered(?: on)?|registration time)\s*[:.]*\s*(\S+)")
        .expect("whois created regex")
});

async fn whois_query(server: &str, query: &str, timeout: Duration) -> Option<String> {
    let io = async {
        let mut stream = TcpStream::connect((server, 43)).await.ok()?;
        stream
            .write_all(format!("{query}\r\n").as_bytes())
            .await
            .ok()?;
        let mut buf = Vec::with_capacity(4096);
        stream.read_to_end(&mut buf).await.ok()?;
        Some(String::from_utf8_lossy(&buf).into_owned())
    };
    tokio::time::timeout(timeout, io).await.ok().flatten()
}

fn extract_field(record: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(record)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// WHOIS registries disagree on date formats; try the common ones.
fn parse_whois_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d", "%d-%b-%Y", "%Y.%m.%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    // "2015-01-02T03:04:05Z"-like strings with trailing garbage.
    raw.get(0..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_prefers_tld_over_digits() {
        let p = NullProbe;
        assert_eq!(p.age_heuristic("fresh-deal.xyz"), Some(7));
        assert_eq!(p.age_heuristic("pay2win.com"), Some(14));
        assert_eq!(p.age_heuristic("example.com"), None);
        assert_eq!(p.age_heuristic(""), None);
    }

    #[test]
    fn whois_date_formats_parse() {
        assert_eq!(
            parse_whois_date("1997-09-15T04:00:00Z"),
            NaiveDate::from_ymd_opt(1997, 9, 15)
        );
        assert_eq!(
            parse_whois_date("2021-03-01"),
            NaiveDate::from_ymd_opt(2021, 3, 1)
        );
        assert_eq!(
            parse_whois_date("15-Sep-1997"),
            NaiveDate::from_ymd_opt(1997, 9, 15)
        );
        assert_eq!(parse_whois_date("not-a-date"), None);
    }

    #[test]
    fn whois_field_extraction() {
        let record = "domain: EXAMPLE.COM\nrefer: whois.verisign-grs.com\n";
        assert_eq!(
            extract_field(record, &WHOIS_REFER).as_deref(),
            Some("whois.verisign-grs.com")
        );
        let record = "   Creation Date: 1997-09-15T04:00:00Z\n";
        assert_eq!(
            extract_field(record, &WHOIS_CREATED).as_deref(),
            Some("1997-09-15T04:00:00Z")
        );
    }

    #[tokio::test]
    async fn null_probe_degrades_everything() {
        let p = NullProbe;
        assert_eq!(p.age_days("example.com").await, None);
        assert!(!p.ssl_ok("example.com").await);
        assert!(matches!(
            p.redirect_chain("http://example.com").await,
            RedirectOutcome::Unavailable { .. }
        ));
    }

    #[test]
    fn resolved_outcome_exposes_final_host() {
        let r = finish_chain(
            vec!["http://a.example/".into(), "http://b.example/x".into()],
            "http://b.example/x".into(),
            200,
        );
        assert_eq!(r.final_host().as_deref(), Some("b.example"));
        match r {
            RedirectOutcome::Resolved { hosts, .. } => {
                assert_eq!(hosts, vec!["a.example", "b.example"]);
            }
            _ => panic!("expected resolved outcome"),
        }
    }
}
