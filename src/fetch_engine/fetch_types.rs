//! Core types for fetch operations.
//!
//! This module contains the fundamental types used throughout the fetch
//! engine: targets, the error taxonomy and terminal outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::page_extractor::ExtractedRecord;
use crate::utils::is_valid_url;

/// Which key identifies a target (and the record it produces) for de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKey {
    /// The detail page URL
    #[default]
    Url,
    /// The business id supplied by the listing API (`tenderId`)
    BusinessId,
}

/// One fetch unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchTarget {
    id: String,
    url: String,
}

impl FetchTarget {
    /// Create a target, rejecting URLs that can never be navigated.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Result<Self, FetchError> {
        let id = id.into();
        let url = url.into().trim().to_string();
        if !is_valid_url(&url) {
            return Err(FetchError::MalformedTarget {
                url,
                reason: "not an absolute http(s) URL".to_string(),
            });
        }
        Ok(Self { id, url })
    }

    /// Create a target without validation. Used to report outcomes for input
    /// that failed [`FetchTarget::new`].
    pub(crate) fn unchecked(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Identity under `key`. Empty when the business id was never supplied.
    #[must_use]
    pub fn identity(&self, key: IdentityKey) -> &str {
        match key {
            IdentityKey::Url => &self.url,
            IdentityKey::BusinessId => self.id.trim(),
        }
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{} ({})", self.url, self.id)
        }
    }
}

/// Classification of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Navigation, load or request timeout; connection-level failure
    NetworkTimeout,
    /// HTTP 5xx from the target
    ServerError,
    /// The shared rendering process is gone
    RenderingProcessDead,
    /// Browser launch or context creation exceeded the startup ceiling
    StartupTimeout,
    /// HTTP 4xx from the target
    ClientError,
    /// Target URL can never be fetched
    MalformedTarget,
    /// Extraction produced no usable identity
    MissingIdentity,
    /// Anything else, including a panicked task
    Internal,
}

impl ErrorKind {
    /// Whether the default policy retries this kind
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout
            | Self::ServerError
            | Self::RenderingProcessDead
            | Self::StartupTimeout => true,
            Self::ClientError | Self::MalformedTarget | Self::MissingIdentity | Self::Internal => {
                false
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetworkTimeout => "NetworkTimeout",
            Self::ServerError => "ServerError-5xx",
            Self::RenderingProcessDead => "RenderingProcessDead",
            Self::StartupTimeout => "StartupTimeout",
            Self::ClientError => "ClientError-4xx",
            Self::MalformedTarget => "MalformedTarget",
            Self::MissingIdentity => "MissingIdentity",
            Self::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Error raised inside a single fetch attempt.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    #[error("Server error (status {status}) for {url}")]
    ServerError { status: u16, url: String },

    #[error("Rendering process is gone: {0}")]
    RenderingProcessDead(String),

    #[error("Browser startup exceeded {0:?}")]
    StartupTimeout(Duration),

    #[error("Client error (status {status}) for {url}")]
    ClientError { status: u16, url: String },

    #[error("Malformed target {url}: {reason}")]
    MalformedTarget { url: String, reason: String },

    #[error("Extracted record has no usable identity for {0}")]
    MissingIdentity(String),

    #[error("{0}")]
    Internal(String),
}

impl FetchError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkTimeout(_) => ErrorKind::NetworkTimeout,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::RenderingProcessDead(_) => ErrorKind::RenderingProcessDead,
            Self::StartupTimeout(_) => ErrorKind::StartupTimeout,
            Self::ClientError { .. } => ErrorKind::ClientError,
            Self::MalformedTarget { .. } => ErrorKind::MalformedTarget,
            Self::MissingIdentity(_) => ErrorKind::MissingIdentity,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Map an HTTP status to an error, `None` for success and redirects.
    #[must_use]
    pub fn from_status(status: u16, url: &str) -> Option<Self> {
        match status {
            500..=599 => Some(Self::ServerError {
                status,
                url: url.to_string(),
            }),
            400..=499 => Some(Self::ClientError {
                status,
                url: url.to_string(),
            }),
            _ => None,
        }
    }

    /// Classify an error coming out of the browser / CDP layer by its message.
    ///
    /// chromiumoxide reports a dead process as channel or websocket failures,
    /// and slow pages as request timeouts.
    #[must_use]
    pub fn classify_browser(error: &dyn fmt::Display) -> Self {
        let message = error.to_string();
        let msg = message.to_lowercase();

        if msg.contains("channel")
            || msg.contains("receiver is gone")
            || msg.contains("websocket")
            || msg.contains("ws error")
            || msg.contains("connection closed")
            || msg.contains("broken pipe")
            || msg.contains("browser closed")
            || msg.contains("target closed")
            || msg.contains("no such process")
        {
            return Self::RenderingProcessDead(message);
        }

        if msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("net::err")
            || msg.contains("connection refused")
            || msg.contains("connection reset")
            || msg.contains("dns")
            || msg.contains("unreachable")
        {
            return Self::NetworkTimeout(message);
        }

        Self::Internal(message)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            if let Some(mapped) = Self::from_status(status.as_u16(), &url) {
                return mapped;
            }
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            return Self::NetworkTimeout(err.to_string());
        }
        Self::Internal(err.to_string())
    }
}

/// Terminal result for one target. Exactly one per scheduled target.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success {
        target: FetchTarget,
        record: ExtractedRecord,
        attempts: u32,
    },
    Failed {
        target: FetchTarget,
        kind: ErrorKind,
        last_error: String,
        attempts: u32,
    },
}

impl FetchOutcome {
    #[must_use]
    pub fn target(&self) -> &FetchTarget {
        match self {
            Self::Success { target, .. } | Self::Failed { target, .. } => target,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn record(&self) -> Option<&ExtractedRecord> {
        match self {
            Self::Success { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn into_record(self) -> Option<ExtractedRecord> {
        match self {
            Self::Success { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub(crate) fn failed(target: FetchTarget, error: &FetchError, attempts: u32) -> Self {
        Self::Failed {
            target,
            kind: error.kind(),
            last_error: error.to_string(),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_targets_are_rejected_up_front() {
        let err = FetchTarget::new("1", "www.tender.gov.mn/mn").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTarget);
        let padded = " https://www.tender.gov.mn/mn/invitation/detail/1 ";
        assert!(FetchTarget::new("1", padded).is_ok());
    }

    #[test]
    fn business_identity_may_be_empty() {
        let target = FetchTarget::new("", "https://www.tender.gov.mn/a").unwrap();
        assert_eq!(target.identity(IdentityKey::Url), "https://www.tender.gov.mn/a");
        assert_eq!(target.identity(IdentityKey::BusinessId), "");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            FetchError::from_status(503, "u").map(|e| e.kind()),
            Some(ErrorKind::ServerError)
        );
        assert_eq!(
            FetchError::from_status(404, "u").map(|e| e.kind()),
            Some(ErrorKind::ClientError)
        );
        assert!(FetchError::from_status(200, "u").is_none());
        assert!(FetchError::from_status(304, "u").is_none());
    }

    #[test]
    fn browser_errors_are_classified() {
        let dead = FetchError::classify_browser(&"send failed because receiver is gone");
        assert_eq!(dead.kind(), ErrorKind::RenderingProcessDead);

        let slow = FetchError::classify_browser(&"Request timed out.");
        assert_eq!(slow.kind(), ErrorKind::NetworkTimeout);

        let other = FetchError::classify_browser(&"Could not find node with given id");
        assert_eq!(other.kind(), ErrorKind::Internal);
    }

    #[test]
    fn retryable_taxonomy() {
        assert!(ErrorKind::NetworkTimeout.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());
        assert!(ErrorKind::RenderingProcessDead.is_retryable());
        assert!(!ErrorKind::ClientError.is_retryable());
        assert!(!ErrorKind::MalformedTarget.is_retryable());
        assert!(!ErrorKind::MissingIdentity.is_retryable());
    }
}
