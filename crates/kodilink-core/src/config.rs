// ── Runtime integration configuration ──
//
// These types describe *where* Kodi and TVHeadend live and how hard to
// poll them. They carry credential data and timing, but never touch disk.
// The CLI builds an `IntegrationConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use kodilink_api::Credentials;
use url::Url;

/// Default Kodi event-server (JSON-RPC notification) port.
pub const DEFAULT_EVENT_SERVER_PORT: u16 = 9090;

/// Default entity the integration publishes to.
pub const DEFAULT_ENTITY_ID: &str = "media_player.kodi";

/// A network endpoint of one backend. Immutable after construction;
/// an absent endpoint means the backend is not configured.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// `{scheme}://{host}:{port}{path}`
    pub url: Url,
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }
}

/// Configuration of one Kodi (+ optional TVHeadend) integration.
///
/// Built by the CLI, passed to `Controller` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    /// Entity receiving attribute and browse updates.
    pub entity_id: String,
    /// Kodi JSON-RPC web server.
    pub kodi: Option<Endpoint>,
    /// Kodi event server (TCP). Defaults to the Kodi host on port 9090.
    pub kodi_events: Option<Endpoint>,
    /// TVHeadend web API.
    pub tvheadend: Option<Endpoint>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Player poll interval.
    pub poll_interval: Duration,
    /// EPG loader interval (one channel per tick).
    pub epg_interval: Duration,
    /// Playback position ticker interval.
    pub progress_tick: Duration,
    /// How long a complete EPG pass stays fresh.
    pub epg_ttl: Duration,
    /// `limit` of each EPG grid request.
    pub epg_page_limit: u32,
    /// Probe attempts before a backend is declared unreachable.
    pub max_probe_attempts: u32,
    /// Delay before the first probe retry; doubles per attempt.
    pub retry_delay: Duration,
    /// Volume and liveness check every N poll ticks. 0 disables it.
    pub liveness_every: u32,
    /// Kodi channel numbers shown in the EPG. Empty means every mapped channel.
    pub epg_channels: Vec<u32>,
    /// Directory for the persisted channel mapping. `None` disables persistence.
    pub data_dir: Option<PathBuf>,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            entity_id: DEFAULT_ENTITY_ID.into(),
            kodi: None,
            kodi_events: None,
            tvheadend: None,
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            epg_interval: Duration::from_secs(10),
            progress_tick: Duration::from_secs(1),
            epg_ttl: Duration::from_secs(2 * 3600),
            epg_page_limit: 1000,
            max_probe_attempts: 4,
            retry_delay: Duration::from_secs(1),
            liveness_every: 10,
            epg_channels: Vec::new(),
            data_dir: None,
        }
    }
}

impl IntegrationConfig {
    /// At least one backend has an endpoint.
    pub fn is_configured(&self) -> bool {
        self.kodi.is_some() || self.tvheadend.is_some()
    }

    /// Host and port of the Kodi event server, falling back to the Kodi
    /// web server host on the default port.
    pub fn event_server_addr(&self) -> Option<(String, u16)> {
        if let Some(ep) = &self.kodi_events {
            let host = ep.host()?;
            return Some((host.to_owned(), ep.port().unwrap_or(DEFAULT_EVENT_SERVER_PORT)));
        }
        let host = self.kodi.as_ref()?.host()?;
        Some((host.to_owned(), DEFAULT_EVENT_SERVER_PORT))
    }
}
