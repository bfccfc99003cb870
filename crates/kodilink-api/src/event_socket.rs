//! Kodi event-server notification stream.
//!
//! Opens a raw TCP connection to Kodi's JSON-RPC notification port
//! (9090 by default) and streams parsed notifications through a
//! [`tokio::sync::broadcast`] channel. Kodi writes notifications either
//! newline-delimited or back to back without any delimiter, so the reader
//! decodes a byte buffer as a sequence of JSON values and keeps partial
//! objects until the rest arrives.
//!
//! There is no reconnect loop: when the socket closes, the handle reports
//! it through [`EventSocketHandle::closed`] and the session decides what to
//! do next.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use kodilink_api::EventSocketHandle;
//! use tokio_util::sync::CancellationToken;
//!
//! let handle = EventSocketHandle::connect(
//!     "192.168.1.20",
//!     9090,
//!     Duration::from_secs(10),
//!     CancellationToken::new(),
//! )
//! .await?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(note) = rx.recv().await {
//!     println!("{}", note.method);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

const READ_CHUNK: usize = 4096;

/// Upper bound for an undecodable buffer before it is dropped.
const MAX_PENDING_BYTES: usize = 1 << 20;

// ── KodiNotification ─────────────────────────────────────────────────

/// Notifications the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// `System.OnQuit`: Kodi is shutting down.
    OnQuit,
    /// `Player.OnResume`: playback resumed.
    OnResume,
    /// `Player.OnPlay`: playback started.
    OnPlay,
    Other,
}

impl NotificationKind {
    pub fn from_method(method: &str) -> Self {
        match method {
            "System.OnQuit" => Self::OnQuit,
            "Player.OnResume" => Self::OnResume,
            "Player.OnPlay" => Self::OnPlay,
            _ => Self::Other,
        }
    }
}

/// A JSON-RPC notification pushed by Kodi.
#[derive(Debug, Clone, PartialEq)]
pub struct KodiNotification {
    pub method: String,
    pub params: Value,
    pub kind: NotificationKind,
}

#[derive(Deserialize)]
struct RawNotification {
    method: String,
    #[serde(default)]
    params: Value,
}

impl KodiNotification {
    /// Interpret a decoded JSON value. Values without a `method` (e.g.
    /// replies to requests) are not notifications.
    pub fn from_value(value: Value) -> Option<Self> {
        let raw: RawNotification = serde_json::from_value(value).ok()?;
        Some(Self {
            kind: NotificationKind::from_method(&raw.method),
            method: raw.method,
            params: raw.params,
        })
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Incremental decoder for a stream of concatenated JSON values.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes waiting for the rest of a value.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append raw bytes and return every complete value now available.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Value> {
        self.buf.extend_from_slice(bytes);
        let mut values = Vec::new();

        loop {
            let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) => {
                    let consumed = stream.byte_offset();
                    self.buf.advance(consumed);
                    values.push(value);
                }
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    // Garbage: resync after the next newline, or drop everything.
                    tracing::debug!(error = %e, "Undecodable event-server data, resyncing");
                    match self.buf.iter().position(|b| *b == b'\n') {
                        Some(pos) => self.buf.advance(pos + 1),
                        None => self.buf.clear(),
                    }
                }
                None => {
                    // Only whitespace left.
                    self.buf.clear();
                    break;
                }
            }
        }

        if self.buf.len() > MAX_PENDING_BYTES {
            tracing::warn!(pending = self.buf.len(), "Event-server buffer overflow, dropping");
            self.buf.clear();
        }

        values
    }
}

// ── EventSocketHandle ────────────────────────────────────────────────

/// Handle to a running event-server reader.
pub struct EventSocketHandle {
    notification_rx: broadcast::Receiver<Arc<KodiNotification>>,
    cancel: CancellationToken,
    closed: CancellationToken,
}

impl EventSocketHandle {
    /// Connect to the event server and spawn the reader task.
    ///
    /// Fails if the TCP connection cannot be established within `timeout`
    /// or `cancel` fires first.
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        tracing::info!(host, port, "Connecting to Kodi event server");

        let attempt = tokio::time::timeout(timeout, TcpStream::connect((host, port)));
        let stream = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::EventSocket(format!("{host}:{port}: cancelled")));
            }
            res = attempt => match res {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(Error::EventSocket(format!("{host}:{port}: {e}"))),
                Err(_) => {
                    return Err(Error::EventSocket(format!(
                        "{host}:{port}: no answer within {}s",
                        timeout.as_secs()
                    )));
                }
            },
        };

        tracing::info!("Kodi event server connected");

        let (notification_tx, notification_rx) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let closed = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task_closed = closed.clone();
        tokio::spawn(async move {
            if let Err(e) = read_loop(stream, &notification_tx, &task_cancel).await {
                tracing::warn!(error = %e, "Kodi event server connection lost");
            }
            task_closed.cancel();
        });

        Ok(Self {
            notification_rx,
            cancel,
            closed,
        })
    }

    /// Get a new broadcast receiver for the notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<KodiNotification>> {
        self.notification_rx.resubscribe()
    }

    /// Resolves once the reader task has stopped, for whatever reason.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Signal the reader task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Reader ───────────────────────────────────────────────────────────

async fn read_loop(
    mut stream: TcpStream,
    notification_tx: &broadcast::Sender<Arc<KodiNotification>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0_u8; READ_CHUNK];

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            read = stream.read(&mut chunk) => {
                let n = read.map_err(|e| Error::EventSocket(e.to_string()))?;
                if n == 0 {
                    tracing::info!("Kodi event server closed the connection");
                    return Ok(());
                }
                let Some(bytes) = chunk.get(..n) else {
                    continue;
                };
                for value in decoder.push(bytes) {
                    broadcast_value(value, notification_tx);
                }
            }
        }
    }
}

fn broadcast_value(value: Value, notification_tx: &broadcast::Sender<Arc<KodiNotification>>) {
    let Some(note) = KodiNotification::from_value(value) else {
        tracing::trace!("Ignoring non-notification message");
        return;
    };
    tracing::debug!(method = %note.method, "Kodi notification");
    // No subscribers right now is fine.
    let _ = notification_tx.send(Arc::new(note));
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn decodes_newline_delimited_values() {
        let mut dec = FrameDecoder::new();
        let out = dec.push(
            b"{\"jsonrpc\":\"2.0\",\"method\":\"Player.OnPlay\",\"params\":{}}\n{\"jsonrpc\":\"2.0\",\"method\":\"System.OnQuit\"}\n",
        );
        assert_eq!(out.len(), 2);
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn decodes_concatenated_values() {
        let mut dec = FrameDecoder::new();
        let out = dec.push(br#"{"method":"Player.OnResume"}{"method":"Player.OnPlay"}"#);
        let kinds: Vec<_> = out
            .into_iter()
            .filter_map(KodiNotification::from_value)
            .map(|n| n.kind)
            .collect();
        assert_eq!(kinds, vec![NotificationKind::OnResume, NotificationKind::OnPlay]);
    }

    #[test]
    fn keeps_partial_object_until_complete() {
        let mut dec = FrameDecoder::new();
        assert!(dec.push(br#"{"method":"System.On"#).is_empty());
        assert!(dec.pending() > 0);
        let out = dec.push(br#"Quit","params":{"data":null}}"#);
        assert_eq!(out.len(), 1);
        let note = KodiNotification::from_value(out.into_iter().next().unwrap()).unwrap();
        assert_eq!(note.kind, NotificationKind::OnQuit);
    }

    #[test]
    fn skips_garbage_line() {
        let mut dec = FrameDecoder::new();
        let out = dec.push(b"not json\n{\"method\":\"Player.OnPlay\"}");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn replies_are_not_notifications() {
        let value = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": "pong"});
        assert!(KodiNotification::from_value(value).is_none());
    }

    #[tokio::test]
    async fn broadcasts_notifications_and_reports_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            go_rx.await.unwrap();
            sock.write_all(br#"{"jsonrpc":"2.0","method":"Player.OnResume","params":{}}"#)
                .await
                .unwrap();
            sock.shutdown().await.unwrap();
        });

        let handle = EventSocketHandle::connect("127.0.0.1", port, TIMEOUT, CancellationToken::new())
            .await
            .unwrap();
        let mut rx = handle.subscribe();
        go_tx.send(()).unwrap();

        let note = rx.recv().await.unwrap();
        assert_eq!(note.kind, NotificationKind::OnResume);

        handle.closed().await;
        assert!(handle.is_closed());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_failure_is_an_event_socket_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = EventSocketHandle::connect("127.0.0.1", port, TIMEOUT, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::EventSocket(_)));
    }

    #[tokio::test]
    async fn connect_gives_up_on_a_silent_host() {
        // Non-routable: either times out or fails outright.
        let started = std::time::Instant::now();
        let err = EventSocketHandle::connect(
            "10.255.255.1",
            9090,
            Duration::from_millis(200),
            CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, Error::EventSocket(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn connect_honours_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = EventSocketHandle::connect("127.0.0.1", port, TIMEOUT, cancel)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::EventSocket(ref m) if m.ends_with("cancelled")));
    }
}
