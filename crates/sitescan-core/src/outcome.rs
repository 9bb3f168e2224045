//! Uniform per-analyzer outcome.
//!
//! Every analyzer, whatever its result type, is reported as an
//! [`AnalyzerOutcome`]: a [`ScanStatus`] plus either a result or an error.
//! The orchestrator aggregates heterogeneous analyzers through this type
//! without special-casing failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed status taxonomy shared by every analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// The analyzer ran and produced a result
    Completed,
    /// The aspect does not apply to this site
    NotApplicable,
    /// The analyzer did not finish within its timeout
    Timeout,
    /// The hostname could not be resolved
    DnsFailure,
    /// The target URL is malformed or unreachable as addressed
    InvalidUrl,
    /// The remote host refused the connection
    ConnectionRefused,
    /// The remote host reset the connection
    ConnectionReset,
    /// The TLS certificate was rejected
    InvalidSslCert,
    /// Unclassified failure
    UnknownError,
}

impl ScanStatus {
    /// True for every failure kind.
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Completed | Self::NotApplicable)
    }

    /// Stable snake_case name, as persisted.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NotApplicable => "not_applicable",
            Self::Timeout => "timeout",
            Self::DnsFailure => "dns_failure",
            Self::InvalidUrl => "invalid_url",
            Self::ConnectionRefused => "connection_refused",
            Self::ConnectionReset => "connection_reset",
            Self::InvalidSslCert => "invalid_ssl_cert",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of a failed analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Human-readable error message
    pub message: String,
}

impl ErrorInfo {
    /// Create error info from anything displayable.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of one analyzer.
///
/// Fields are private: the constructors keep `result` and `error` consistent
/// with `status`. `error` is present exactly when the status is a failure,
/// and `result` is only ever present for `Completed` or `NotApplicable`.
/// Deserialization checks the same rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawOutcome<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct AnalyzerOutcome<T> {
    status: ScanStatus,
    result: Option<T>,
    error: Option<ErrorInfo>,
}

#[derive(Deserialize)]
struct RawOutcome<T> {
    status: ScanStatus,
    result: Option<T>,
    error: Option<ErrorInfo>,
}

impl<T> TryFrom<RawOutcome<T>> for AnalyzerOutcome<T> {
    type Error = String;

    fn try_from(raw: RawOutcome<T>) -> Result<Self, Self::Error> {
        let RawOutcome {
            status,
            result,
            error,
        } = raw;
        match (status, result, error) {
            (ScanStatus::Completed, Some(result), None) => Ok(Self::completed(result)),
            (ScanStatus::NotApplicable, None, None) => Ok(Self::not_applicable()),
            (ScanStatus::NotApplicable, Some(result), None) => {
                Ok(Self::not_applicable_with(result))
            }
            (status, None, Some(error)) if status.is_failure() => Ok(Self::failed(status, error)),
            (status, result, error) => Err(format!(
                "inconsistent {status} outcome (result present: {}, error present: {})",
                result.is_some(),
                error.is_some()
            )),
        }
    }
}

impl<T> AnalyzerOutcome<T> {
    /// Successful outcome.
    pub fn completed(result: T) -> Self {
        Self {
            status: ScanStatus::Completed,
            result: Some(result),
            error: None,
        }
    }

    /// The aspect does not apply; no result.
    pub fn not_applicable() -> Self {
        Self {
            status: ScanStatus::NotApplicable,
            result: None,
            error: None,
        }
    }

    /// The aspect does not apply, with a defined-empty result.
    pub fn not_applicable_with(result: T) -> Self {
        Self {
            status: ScanStatus::NotApplicable,
            result: Some(result),
            error: None,
        }
    }

    /// Failed outcome. Non-failure statuses are coerced to `UnknownError`.
    pub fn failed(status: ScanStatus, error: ErrorInfo) -> Self {
        let status = if status.is_failure() {
            status
        } else {
            ScanStatus::UnknownError
        };
        Self {
            status,
            result: None,
            error: Some(error),
        }
    }

    /// Status of the analyzer.
    pub fn status(&self) -> ScanStatus {
        self.status
    }

    /// Result, if the analyzer produced one.
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Error, if the analyzer failed.
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Consume the outcome, returning the result if any.
    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// Map the result type, preserving status and error.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AnalyzerOutcome<U> {
        AnalyzerOutcome {
            status: self.status,
            result: self.result.map(f),
            error: self.error,
        }
    }
}

impl<T> AnalyzerOutcome<Option<T>> {
    /// Treat a completed run that found nothing as `NotApplicable`.
    pub fn or_not_applicable(self) -> AnalyzerOutcome<T> {
        match (self.status, self.result, self.error) {
            (ScanStatus::Completed, Some(Some(result)), _) => AnalyzerOutcome::completed(result),
            (ScanStatus::NotApplicable, Some(Some(result)), _) => {
                AnalyzerOutcome::not_applicable_with(result)
            }
            (status, _, Some(error)) => AnalyzerOutcome::failed(status, error),
            _ => AnalyzerOutcome::not_applicable(),
        }
    }
}
