// TVHeadend REST client
//
// Plain authenticated GETs returning JSON. Every call carries a caller
// supplied correlation id so failures can be paired with their request.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::request::CorrelationId;
use crate::transport::{Credentials, TransportConfig};
use crate::tvheadend::models::{ChannelDirectory, DirectoryEntry, EpgEvent, EpgGrid, ServerInfo};

/// Raw HTTP client for the TVHeadend web API.
#[derive(Debug, Clone)]
pub struct TvheadendClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl TvheadendClient {
    /// Create a client for the TVHeadend server at `base_url`
    /// (e.g. `http://192.168.1.30:9981`).
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        mut base_url: Url,
        credentials: Option<Credentials>,
    ) -> Self {
        // Relative joins below must keep a reverse-proxy path prefix.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// The TVHeadend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Host name of the server, used to rewrite loopback image URLs.
    pub fn host(&self) -> Option<&str> {
        self.base_url.host_str()
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// `GET {base}/{path}?{query}` with basic auth when configured.
    ///
    /// `path` is relative to the base URL.
    pub async fn get_with_auth<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        correlation: CorrelationId,
    ) -> Result<T, Error> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        debug!(%correlation, "GET {}", url);

        let mut builder = self.http.get(url);
        if let Some(creds) = &self.credentials {
            builder = creds.apply(builder);
        }

        let resp = builder.send().await.map_err(|source| Error::Transport {
            correlation,
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                correlation,
            });
        }

        let body = resp.text().await.map_err(|source| Error::Transport {
            correlation,
            source,
        })?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
            correlation,
        })
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Lightweight liveness probe.
    ///
    /// `GET /api/serverinfo`
    pub async fn server_info(&self, correlation: CorrelationId) -> Result<ServerInfo, Error> {
        self.get_with_auth("api/serverinfo", &[], correlation).await
    }

    /// Channel directory: UUID keys with channel names as values.
    ///
    /// `GET /api/channel/list`
    pub async fn channel_list(
        &self,
        correlation: CorrelationId,
    ) -> Result<Vec<DirectoryEntry>, Error> {
        let dir: ChannelDirectory = self
            .get_with_auth("api/channel/list", &[], correlation)
            .await?;
        Ok(dir.entries)
    }

    /// One page of EPG events for a single channel.
    ///
    /// `GET /api/epg/events/grid?limit={limit}&channel={uuid}`
    pub async fn epg_grid(
        &self,
        channel_uuid: &str,
        limit: u32,
        correlation: CorrelationId,
    ) -> Result<Vec<EpgEvent>, Error> {
        debug!(channel_uuid, limit, "fetching EPG grid");
        let grid: EpgGrid = self
            .get_with_auth(
                "api/epg/events/grid",
                &[
                    ("limit", limit.to_string()),
                    ("channel", channel_uuid.to_owned()),
                ],
                correlation,
            )
            .await?;
        Ok(grid.entries)
    }
}
