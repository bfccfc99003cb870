// ── Request identity ──
//
// Every outgoing exchange carries a numeric correlation id (echoed by Kodi
// as the JSON-RPC `id`) and a typed kind describing what was asked.
// Handlers dispatch on the kind, never on the method string.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque token pairing a request with its eventual response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic correlation id generator, shared by clients of one session.
#[derive(Debug, Default)]
pub struct CorrelationSource {
    next: AtomicU64,
}

impl CorrelationSource {
    /// Start numbering at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Hand out the next unused id.
    pub fn next_id(&self) -> CorrelationId {
        CorrelationId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a request asks for, independent of which handler reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    // ── Kodi JSON-RPC ───────────────────────────────────────────────
    Ping,
    ActivePlayers,
    PlayerItem,
    PrepareDownload,
    PlayerProperties,
    PvrChannels,
    ApplicationProperties,
    PlayerControl,
    Input,
    SetVolume,

    // ── TVHeadend REST ──────────────────────────────────────────────
    ServerInfo,
    ChannelDirectory,
    EpgGrid,
}

impl RequestKind {
    /// JSON-RPC method name, for Kodi kinds that map to a single method.
    pub fn method(self) -> Option<&'static str> {
        match self {
            Self::Ping => Some("JSONRPC.Ping"),
            Self::ActivePlayers => Some("Player.GetActivePlayers"),
            Self::PlayerItem => Some("Player.GetItem"),
            Self::PrepareDownload => Some("Files.PrepareDownload"),
            Self::PlayerProperties => Some("Player.GetProperties"),
            Self::PvrChannels => Some("PVR.GetChannels"),
            Self::ApplicationProperties => Some("Application.GetProperties"),
            Self::SetVolume => Some("Application.SetVolume"),
            Self::PlayerControl
            | Self::Input
            | Self::ServerInfo
            | Self::ChannelDirectory
            | Self::EpgGrid => None,
        }
    }

    /// Whether the request targets TVHeadend rather than Kodi.
    pub fn is_tvheadend(self) -> bool {
        matches!(self, Self::ServerInfo | Self::ChannelDirectory | Self::EpgGrid)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method() {
            Some(method) => f.write_str(method),
            None => write!(f, "{self:?}"),
        }
    }
}
