//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use kodilink_config::ConfigError;
use kodilink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach {backend}")]
    #[diagnostic(
        code(kodilink::connection_failed),
        help(
            "Check that {backend} is running and its web interface is enabled.\n\
             Kodi: Settings > Services > Control > Allow remote control via HTTP.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { backend: String, reason: String },

    #[error("Not connected")]
    #[diagnostic(
        code(kodilink::disconnected),
        help("The session ended while the command was running. Run it again.")
    )]
    Disconnected,

    #[error("Authentication failed (HTTP {status})")]
    #[diagnostic(
        code(kodilink::auth_failed),
        help(
            "Verify kodiclient_user / tvheadendclient_user and the matching password.\n\
             Run: kodilink config show"
        )
    )]
    AuthFailed { status: u16 },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Channel '{identifier}' not found")]
    #[diagnostic(
        code(kodilink::not_found),
        help("Run: kodilink channels to see available channel ids")
    )]
    ChannelNotFound { identifier: String },

    // ── Protocol / API ───────────────────────────────────────────────

    #[error("Unexpected response: {message}")]
    #[diagnostic(code(kodilink::protocol))]
    Protocol { message: String },

    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(kodilink::api_error))]
    Api { status: u16, message: String },

    #[error("Operation '{operation}' is not available: {reason}")]
    #[diagnostic(code(kodilink::unsupported))]
    Unsupported { operation: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(kodilink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No backend configured")]
    #[diagnostic(
        code(kodilink::no_config),
        help(
            "Create a profile with: kodilink config init --kodi-host <HOST>\n\
             Or pass --kodi / --tvheadend.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(kodilink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: kodilink config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(
        code(kodilink::profile_exists),
        help("Use --force to replace it.")
    )]
    ProfileExists { name: String },

    #[error("{message}")]
    #[diagnostic(code(kodilink::config))]
    Config { message: String },

    #[error("Mapping cache error: {message}")]
    #[diagnostic(
        code(kodilink::mapping_store),
        help("Run: kodilink mapping rebuild")
    )]
    MappingStore { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(kodilink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ChannelNotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Validation { .. }
            | Self::NoConfig { .. }
            | Self::ProfileNotFound { .. }
            | Self::ProfileExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotConfigured => CliError::NoConfig {
                path: kodilink_config::config_path().display().to_string(),
            },

            CoreError::ConnectionFailed {
                backend, reason, ..
            } => CliError::ConnectionFailed {
                backend: backend.to_string(),
                reason,
            },

            CoreError::Disconnected => CliError::Disconnected,

            CoreError::Transport { message, .. } => CliError::ConnectionFailed {
                backend: "backend".into(),
                reason: message,
            },

            CoreError::Protocol { message, .. } => CliError::Protocol { message },

            CoreError::ChannelNotFound { identifier } => CliError::ChannelNotFound { identifier },

            CoreError::Unsupported { operation, reason } => {
                CliError::Unsupported { operation, reason }
            }

            CoreError::Api { status, .. } if status == 401 || status == 403 => {
                CliError::AuthFailed { status }
            }

            CoreError::Api { message, status } => CliError::Api { status, message },

            CoreError::Persistence { path, message } => CliError::MappingStore {
                message: format!("{}: {message}", path.display()),
            },

            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            ConfigError::NoBackend { .. } => CliError::NoConfig {
                path: kodilink_config::config_path().display().to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
