use thiserror::Error;

use crate::request::CorrelationId;

/// Top-level error type for the `kodilink-api` crate.
///
/// Every failure raised by a request carries the correlation id of the
/// exchange it belongs to, so a caller can pair the failure with what it
/// asked for. `kodilink-core` maps these into session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error ({correlation}): {source}")]
    Transport {
        correlation: CorrelationId,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response status.
    #[error("HTTP {status} ({correlation})")]
    Http {
        status: u16,
        correlation: CorrelationId,
    },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── JSON-RPC ────────────────────────────────────────────────────
    /// Kodi answered with a JSON-RPC `error` member.
    #[error("JSON-RPC error {code} ({correlation}): {message}")]
    Rpc {
        code: i64,
        message: String,
        correlation: CorrelationId,
    },

    /// Kodi echoed an id other than the one sent.
    #[error("Correlation mismatch: sent {expected}, got {got}")]
    CorrelationMismatch {
        expected: CorrelationId,
        got: String,
    },

    // ── Event server ────────────────────────────────────────────────
    /// Event-server TCP connection failed or dropped.
    #[error("Event socket error: {0}")]
    EventSocket(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error ({correlation}): {message}")]
    Deserialization {
        message: String,
        body: String,
        correlation: CorrelationId,
    },
}

impl Error {
    /// Correlation id of the failed exchange, when the failure belongs to one.
    pub fn correlation(&self) -> Option<CorrelationId> {
        match self {
            Self::Transport { correlation, .. }
            | Self::Http { correlation, .. }
            | Self::Rpc { correlation, .. }
            | Self::Deserialization { correlation, .. } => Some(*correlation),
            Self::CorrelationMismatch { expected, .. } => Some(*expected),
            Self::InvalidUrl(_)
            | Self::Timeout { .. }
            | Self::ClientBuild(_)
            | Self::EventSocket(_) => None,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            Self::Timeout { .. } | Self::EventSocket(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the peer answered but the answer was unusable.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Rpc { .. } | Self::Deserialization { .. } | Self::CorrelationMismatch { .. }
        )
    }

    /// Returns `true` if the peer rejected our credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }
}
