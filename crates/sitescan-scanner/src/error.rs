//! Scanner errors and the shared error classifier.

use sitescan_browser::{BrowserError, PoolError};
use sitescan_core::ScanStatus;
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while running analyzers.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The analyzer exceeded its timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Browser automation failed
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// No browser instance could be acquired
    #[error("browser pool error: {0}")]
    Pool(#[from] PoolError),

    /// Plain HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Hostname resolution failed
    #[error("DNS lookup failed: {0}")]
    Dns(#[source] std::io::Error),

    /// The target URL cannot be scanned
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The security data source failed
    #[error("security data error: {0}")]
    SecurityData(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `ScanError`.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Map any analyzer error to its [`ScanStatus`].
///
/// Unrecognised shapes become [`ScanStatus::UnknownError`].
#[must_use]
pub fn classify(error: &ScanError) -> ScanStatus {
    match error {
        ScanError::Timeout(_) | ScanError::Browser(BrowserError::Timeout(_)) => ScanStatus::Timeout,
        ScanError::InvalidUrl(_) => ScanStatus::InvalidUrl,
        ScanError::Dns(_) => ScanStatus::DnsFailure,
        ScanError::Browser(e) => classify_message(&e.to_string()),
        ScanError::Http(e) => classify_http(e),
        ScanError::Pool(_) | ScanError::SecurityData(_) | ScanError::Other(_) => {
            ScanStatus::UnknownError
        }
    }
}

/// Classify a browser network error message (`net::ERR_*`).
#[must_use]
pub fn classify_message(message: &str) -> ScanStatus {
    const RULES: &[(&str, ScanStatus)] = &[
        ("ERR_NAME_NOT_RESOLVED", ScanStatus::DnsFailure),
        ("ERR_NAME_RESOLUTION_FAILED", ScanStatus::DnsFailure),
        ("ERR_CONNECTION_REFUSED", ScanStatus::ConnectionRefused),
        ("ERR_CONNECTION_RESET", ScanStatus::ConnectionReset),
        ("ERR_CONNECTION_CLOSED", ScanStatus::ConnectionReset),
        ("ERR_CERT_", ScanStatus::InvalidSslCert),
        ("ERR_SSL_", ScanStatus::InvalidSslCert),
        ("ERR_BAD_SSL_CLIENT_AUTH_CERT", ScanStatus::InvalidSslCert),
        ("ERR_TIMED_OUT", ScanStatus::Timeout),
        ("ERR_CONNECTION_TIMED_OUT", ScanStatus::Timeout),
        ("Navigation timeout", ScanStatus::Timeout),
        ("ERR_INVALID_URL", ScanStatus::InvalidUrl),
        ("ERR_ADDRESS_UNREACHABLE", ScanStatus::InvalidUrl),
        ("ERR_ADDRESS_INVALID", ScanStatus::InvalidUrl),
        ("ERR_UNSAFE_PORT", ScanStatus::InvalidUrl),
    ];

    RULES
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map_or(ScanStatus::UnknownError, |(_, status)| *status)
}

fn classify_http(error: &reqwest::Error) -> ScanStatus {
    if error.is_timeout() {
        return ScanStatus::Timeout;
    }
    if error.is_builder() {
        return ScanStatus::InvalidUrl;
    }

    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    classify_io_text(&chain.to_lowercase())
}

fn classify_io_text(text: &str) -> ScanStatus {
    if text.contains("dns error")
        || text.contains("failed to lookup address")
        || text.contains("name or service not known")
        || text.contains("no such host")
    {
        ScanStatus::DnsFailure
    } else if text.contains("connection refused") {
        ScanStatus::ConnectionRefused
    } else if text.contains("connection reset") {
        ScanStatus::ConnectionReset
    } else if text.contains("certificate") || text.contains("tls handshake") {
        ScanStatus::InvalidSslCert
    } else if text.contains("timed out") {
        ScanStatus::Timeout
    } else {
        ScanStatus::UnknownError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_messages() {
        let cases = [
            ("net::ERR_NAME_NOT_RESOLVED at https://nope.gov", ScanStatus::DnsFailure),
            ("net::ERR_CONNECTION_REFUSED", ScanStatus::ConnectionRefused),
            ("net::ERR_CONNECTION_RESET", ScanStatus::ConnectionReset),
            ("net::ERR_CERT_DATE_INVALID", ScanStatus::InvalidSslCert),
            ("net::ERR_CERT_COMMON_NAME_INVALID", ScanStatus::InvalidSslCert),
            ("net::ERR_SSL_PROTOCOL_ERROR", ScanStatus::InvalidSslCert),
            ("net::ERR_ADDRESS_UNREACHABLE", ScanStatus::InvalidUrl),
            ("net::ERR_INVALID_URL", ScanStatus::InvalidUrl),
            ("net::ERR_TIMED_OUT", ScanStatus::Timeout),
            ("something odd happened", ScanStatus::UnknownError),
        ];
        for (message, expected) in cases {
            let err = ScanError::Browser(BrowserError::NavigationError(message.to_string()));
            assert_eq!(classify(&err), expected, "{message}");
        }
    }

    #[test]
    fn test_direct_variants() {
        assert_eq!(
            classify(&ScanError::Timeout(Duration::from_secs(1))),
            ScanStatus::Timeout
        );
        assert_eq!(
            classify(&ScanError::Browser(BrowserError::Timeout("load".into()))),
            ScanStatus::Timeout
        );
        assert_eq!(
            classify(&ScanError::InvalidUrl("ht tp://".into())),
            ScanStatus::InvalidUrl
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "no record");
        assert_eq!(classify(&ScanError::Dns(io)), ScanStatus::DnsFailure);
        assert_eq!(
            classify(&ScanError::Pool(PoolError::Closed)),
            ScanStatus::UnknownError
        );
    }

    #[test]
    fn test_classification_is_never_a_success() {
        let errors = [
            ScanError::Other("weird".into()),
            ScanError::SecurityData("bad json".into()),
            ScanError::Browser(BrowserError::PageClosed),
        ];
        for err in &errors {
            assert!(classify(err).is_failure());
        }
    }

    #[test]
    fn test_io_text() {
        assert_eq!(
            classify_io_text("error sending request: dns error: failed to lookup address"),
            ScanStatus::DnsFailure
        );
        assert_eq!(
            classify_io_text("tcp connect error: connection refused (os error 111)"),
            ScanStatus::ConnectionRefused
        );
        assert_eq!(
            classify_io_text("invalid peer certificate: expired"),
            ScanStatus::InvalidSslCert
        );
    }
}
