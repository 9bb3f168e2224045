//! Target URL normalisation and domain comparison helpers.

use crate::error::{Result, ScanError};
use url::Url;

/// A normalised scan target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    input: String,
    url: Url,
}

impl ScanTarget {
    /// Normalise a raw website URL: lowercase, `https://` unless already present.
    ///
    /// # Errors
    /// Returns [`ScanError::InvalidUrl`] when the result does not parse or has no host.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScanError::InvalidUrl("empty URL".to_string()));
        }
        let lowered = trimmed.to_lowercase();
        let normalized = if lowered.starts_with("https://") {
            lowered
        } else {
            format!("https://{lowered}")
        };

        let url = Url::parse(&normalized)
            .map_err(|e| ScanError::InvalidUrl(format!("{trimmed}: {e}")))?;
        Self::from_url(trimmed, url)
    }

    /// Wrap an already-parsed URL without normalising its scheme.
    pub fn from_url(input: &str, url: Url) -> Result<Self> {
        match url.host_str() {
            Some(host) if !host.is_empty() => Ok(Self {
                input: input.to_string(),
                url,
            }),
            _ => Err(ScanError::InvalidUrl(format!("{input}: no host"))),
        }
    }

    /// The URL as it was submitted.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Normalised URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Normalised URL as a string.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Hostname of the target.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Registrable part of the host (last two labels).
    pub fn base_domain(&self) -> String {
        base_domain(self.host())
    }

    /// The target with its path replaced by `path`.
    pub fn with_path(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// The `www.` variant when the target is an apex host, or the apex when it
    /// already starts with `www.`.
    pub fn www_counterpart(&self) -> Option<Url> {
        let host = self.host();
        let other = match host.strip_prefix("www.") {
            Some(apex) => apex.to_string(),
            None => format!("www.{host}"),
        };
        let mut url = self.with_path("/");
        url.set_host(Some(&other)).ok()?;
        Some(url)
    }
}

/// Last two labels of a hostname (`18f.gsa.gov` → `gsa.gov`).
#[must_use]
pub fn base_domain(host: &str) -> String {
    let host = host.trim_end_matches('.');
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host.to_string();
    }
    labels[labels.len() - 2..].join(".")
}

/// Base domain of the host in `url`, if it parses.
#[must_use]
pub fn url_base_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(base_domain))
}

/// True when two URLs name the same website, ignoring scheme, a leading
/// `www.` and a trailing slash.
#[must_use]
pub fn same_website(a: &str, b: &str) -> bool {
    comparable(a) == comparable(b)
}

fn comparable(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);
    without_www.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adds_https_and_lowercases() {
        let target = ScanTarget::parse("18F.gov").expect("parse");
        assert_eq!(target.as_str(), "https://18f.gov/");
        assert_eq!(target.host(), "18f.gov");
        assert_eq!(target.input(), "18F.gov");
    }

    #[test]
    fn test_parse_keeps_https() {
        let target = ScanTarget::parse("HTTPS://www.GSA.gov/about").expect("parse");
        assert_eq!(target.as_str(), "https://www.gsa.gov/about");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ScanTarget::parse("   "),
            Err(ScanError::InvalidUrl(_))
        ));
        assert!(matches!(
            ScanTarget::parse("not a url"),
            Err(ScanError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_base_domain() {
        assert_eq!(base_domain("18f.gsa.gov"), "gsa.gov");
        assert_eq!(base_domain("18f.gov"), "18f.gov");
        assert_eq!(base_domain("www.a.b.example.gov."), "example.gov");
        assert_eq!(
            url_base_domain("https://18f.gsa.gov/"),
            Some("gsa.gov".to_string())
        );
    }

    #[test]
    fn test_same_website() {
        assert!(same_website("https://18f.gov", "http://www.18f.gov/"));
        assert!(!same_website("https://18f.gov", "https://18f.gsa.gov/"));
    }

    #[test]
    fn test_with_path_and_www() {
        let target = ScanTarget::parse("18f.gov/about?x=1").expect("parse");
        assert_eq!(
            target.with_path("/robots.txt").as_str(),
            "https://18f.gov/robots.txt"
        );
        assert_eq!(
            target.www_counterpart().expect("www").as_str(),
            "https://www.18f.gov/"
        );

        let www = ScanTarget::parse("www.18f.gov").expect("parse");
        assert_eq!(
            www.www_counterpart().expect("apex").as_str(),
            "https://18f.gov/"
        );
    }
}
