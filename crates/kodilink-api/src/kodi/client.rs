// Kodi JSON-RPC HTTP client
//
// Wraps `reqwest::Client` with the JSON-RPC 2.0 envelope: every call is a
// POST to `/jsonrpc` whose `id` is the caller's correlation id. The reply
// id is checked against it and a JSON-RPC `error` member becomes
// `Error::Rpc`. Namespace methods are implemented in sibling files.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::kodi::models::{RpcRequest, RpcResponse};
use crate::request::{CorrelationId, CorrelationSource};
use crate::transport::{Credentials, TransportConfig};

/// Successful JSON-RPC exchange.
#[derive(Debug, Clone)]
pub struct Reply {
    pub correlation: CorrelationId,
    pub status: u16,
    /// The `result` member (`Value::Null` when Kodi omitted it).
    pub result: Value,
}

/// Raw HTTP client for Kodi's JSON-RPC API.
#[derive(Debug, Clone)]
pub struct KodiClient {
    http: reqwest::Client,
    base_url: Url,
    rpc_url: Url,
    credentials: Option<Credentials>,
    correlations: Arc<CorrelationSource>,
}

impl KodiClient {
    /// Create a client for the Kodi web server at `base_url`
    /// (e.g. `http://192.168.1.20:8080`).
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url, credentials)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Option<Credentials>,
    ) -> Result<Self, Error> {
        let rpc_url = base_url.join("/jsonrpc")?;
        Ok(Self {
            http,
            base_url,
            rpc_url,
            credentials,
            correlations: Arc::new(CorrelationSource::starting_at(1)),
        })
    }

    /// Share a correlation source with other clients of the same session.
    pub fn with_correlations(mut self, correlations: Arc<CorrelationSource>) -> Self {
        self.correlations = correlations;
        self
    }

    /// The Kodi web server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Allocate a fresh correlation id.
    pub fn next_correlation(&self) -> CorrelationId {
        self.correlations.next_id()
    }

    /// Absolute URL for a path served by the Kodi web server,
    /// e.g. the redirect path returned by `Files.PrepareDownload`.
    pub fn image_url(&self, path: &str) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port_or_known_default() {
            Some(port) => format!(
                "{}://{}:{}/{}",
                self.base_url.scheme(),
                host,
                port,
                path.trim_start_matches('/')
            ),
            None => format!(
                "{}://{}/{}",
                self.base_url.scheme(),
                host,
                path.trim_start_matches('/')
            ),
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one JSON-RPC call.
    ///
    /// Non-2xx statuses, transport failures, malformed replies, a mismatched
    /// reply id and JSON-RPC `error` members are all returned as errors
    /// carrying `correlation`.
    pub async fn request(
        &self,
        method: &str,
        params: Value,
        correlation: CorrelationId,
    ) -> Result<Reply, Error> {
        debug!(%correlation, method, "POST {}", self.rpc_url);

        let body = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: correlation.0,
        };

        let mut builder = self.http.post(self.rpc_url.clone()).json(&body);
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

        let text = resp.text().await.map_err(|source| Error::Transport {
            correlation,
            source,
        })?;

        let envelope: RpcResponse =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.clone(),
                correlation,
            })?;

        if !id_matches(&envelope.id, correlation) {
            return Err(Error::CorrelationMismatch {
                expected: correlation,
                got: envelope.id.to_string(),
            });
        }

        if let Some(err) = envelope.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
                correlation,
            });
        }

        Ok(Reply {
            correlation,
            status: status.as_u16(),
            result: envelope.result.unwrap_or(Value::Null),
        })
    }

    /// Issue one JSON-RPC call and deserialize its `result`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        correlation: CorrelationId,
    ) -> Result<T, Error> {
        let reply = self.request(method, params, correlation).await?;
        decode(reply)
    }

    /// `JSONRPC.Ping`. Returns `true` when Kodi answers `"pong"`.
    pub async fn ping(&self, correlation: CorrelationId) -> Result<bool, Error> {
        let reply = self
            .request("JSONRPC.Ping", Value::Null, correlation)
            .await?;
        Ok(reply.result.as_str() == Some("pong"))
    }
}

/// Deserialize the `result` member of a reply.
pub(crate) fn decode<T: DeserializeOwned>(reply: Reply) -> Result<T, Error> {
    let correlation = reply.correlation;
    serde_json::from_value(reply.result.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: reply.result.to_string(),
        correlation,
    })
}

/// Kodi echoes the id either as sent (number) or, on older builds, as a string.
fn id_matches(id: &Value, correlation: CorrelationId) -> bool {
    match id {
        Value::Number(n) => n.as_u64() == Some(correlation.0),
        Value::String(s) => s.parse::<u64>().ok() == Some(correlation.0),
        _ => false,
    }
}
