// ── Core error types ──
//
// User-facing errors from kodilink-core. Consumers never see HTTP status
// codes or JSON parse failures directly. The `From<kodilink_api::Error>`
// impl sorts transport-layer errors into transport vs protocol failures.

use std::path::PathBuf;

use kodilink_api::CorrelationId;
use thiserror::Error;

use crate::session::Backend;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// Neither Kodi nor TVHeadend has an endpoint.
    #[error("No backend configured: set a Kodi and/or TVHeadend endpoint")]
    NotConfigured,

    #[error("{backend} unreachable after {attempts} attempt(s): {reason}")]
    ConnectionFailed {
        backend: Backend,
        attempts: u32,
        reason: String,
    },

    #[error("Not connected")]
    Disconnected,

    /// Network failure or timeout of a single request.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        correlation: Option<CorrelationId>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    /// The peer answered with something unusable.
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        correlation: Option<CorrelationId>,
    },

    #[error("Channel not found: {identifier}")]
    ChannelNotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not available: {operation} ({reason})")]
    Unsupported { operation: String, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error (HTTP {status}): {message}")]
    Api { message: String, status: u16 },

    // ── Storage / configuration errors ───────────────────────────────
    #[error("Mapping store error at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Transient failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<kodilink_api::Error> for CoreError {
    fn from(err: kodilink_api::Error) -> Self {
        let correlation = err.correlation();
        match err {
            kodilink_api::Error::Transport { .. }
            | kodilink_api::Error::Timeout { .. }
            | kodilink_api::Error::EventSocket(_) => CoreError::Transport {
                message: err.to_string(),
                correlation,
            },
            kodilink_api::Error::Http { status, .. } => CoreError::Api {
                message: err.to_string(),
                status,
            },
            kodilink_api::Error::Rpc { .. }
            | kodilink_api::Error::Deserialization { .. }
            | kodilink_api::Error::CorrelationMismatch { .. } => CoreError::Protocol {
                message: err.to_string(),
                correlation,
            },
            kodilink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            kodilink_api::Error::ClientBuild(message) => CoreError::Config { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_become_protocol_errors() {
        let api = kodilink_api::Error::Rpc {
            code: -32602,
            message: "Invalid params.".into(),
            correlation: CorrelationId(3),
        };
        let core = CoreError::from(api);
        assert!(matches!(
            core,
            CoreError::Protocol {
                correlation: Some(CorrelationId(3)),
                ..
            }
        ));
        assert!(!core.is_transient());
    }

    #[test]
    fn event_socket_errors_are_transient() {
        let core = CoreError::from(kodilink_api::Error::EventSocket("refused".into()));
        assert!(core.is_transient());
    }

    #[test]
    fn connection_failed_names_backend() {
        let err = CoreError::ConnectionFailed {
            backend: Backend::Tvheadend,
            attempts: 4,
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "TVHeadend unreachable after 4 attempt(s): connection refused"
        );
    }
}
