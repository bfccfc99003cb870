// ── Controller ──
//
// Connection lifecycle for one Kodi (+ optional TVHeadend) integration:
// probes both backends with bounded retry, loads or builds the channel
// mapping, spawns the poll, progress, EPG, event and command tasks, and
// tears all of it down again on disconnect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kodilink_api::{
    CorrelationSource, EventSocketHandle, KodiClient, TransportConfig, TvheadendClient,
};
use tokio::sync::{Mutex, MutexGuard, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::IntegrationConfig;
use crate::entity::{AttributeUpdate, EntitySink};
use crate::epg::EpgAggregator;
use crate::error::CoreError;
use crate::model::{ChannelGroup, ChannelRecord, PlayerSnapshot};
use crate::persist::MappingStore;
use crate::poller::{PollEvent, PollState, Poller};
use crate::reconcile::{ChannelMapping, reconcile};
use crate::retry::{RetryError, RetryPolicy};
use crate::session::{Backend, BackendStatuses, ConnectionStatus, SessionState};
use crate::tasks;

const COMMAND_CHANNEL_SIZE: usize = 64;
const POLL_EVENT_CHANNEL_SIZE: usize = 16;
const EPG_BUSY_WAIT: Duration = Duration::from_millis(50);

// ── Links ────────────────────────────────────────────────────────

/// Everything the background tasks of one connection share.
pub(crate) struct Links {
    /// Session generation this connection belongs to.
    pub generation: u64,
    pub kodi: Option<KodiClient>,
    pub tvheadend: Option<TvheadendClient>,
    pub poll_tx: mpsc::Sender<PollEvent>,
    /// `true` runs the progress ticker; every send restarts it.
    pub ticker_tx: watch::Sender<bool>,
}

struct Connection {
    cancel: CancellationToken,
    links: Arc<Links>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    task_handles: Vec<JoinHandle<()>>,
}

// ── Controller ───────────────────────────────────────────────────

/// Entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. `connect()` brings the
/// backends online and starts the background tasks; `disconnect()` stops
/// them and clears the player entity.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

pub(crate) struct ControllerInner {
    pub config: IntegrationConfig,
    pub sink: Arc<dyn EntitySink>,
    pub session: Mutex<SessionState>,
    status_tx: watch::Sender<BackendStatuses>,
    store: Option<MappingStore>,
    correlations: Arc<CorrelationSource>,
    /// Serializes connect attempts.
    connect_lock: Mutex<()>,
    /// Cancels the connect attempt in progress, if any.
    pending: Mutex<Option<CancellationToken>>,
    connection: Mutex<Option<Connection>>,
}

impl Controller {
    /// Create a controller. Does NOT connect.
    pub fn new(config: IntegrationConfig, sink: Arc<dyn EntitySink>) -> Self {
        let correlations = Arc::new(CorrelationSource::starting_at(1));
        let poller = Poller::new(Arc::clone(&correlations));
        let epg = EpgAggregator::new(
            config.epg_ttl,
            config.epg_page_limit,
            Arc::clone(&correlations),
        );
        let store = config.data_dir.as_deref().map(MappingStore::new);
        let (status_tx, _) = watch::channel(BackendStatuses::default());

        Self {
            inner: Arc::new(ControllerInner {
                config,
                sink,
                session: Mutex::new(SessionState::new(poller, epg)),
                status_tx,
                store,
                correlations,
                connect_lock: Mutex::new(()),
                pending: Mutex::new(None),
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.inner.config
    }

    pub(crate) fn inner(&self) -> &ControllerInner {
        &self.inner
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Probe the configured backends and start the background tasks.
    ///
    /// Fails fast with [`CoreError::NotConfigured`] when no backend is
    /// configured. Each backend is probed independently with bounded
    /// retry; the call succeeds when at least one comes online. A
    /// `disconnect()` issued meanwhile aborts the attempt with
    /// [`CoreError::Disconnected`].
    pub async fn connect(&self) -> Result<(), CoreError> {
        if !self.inner.config.is_configured() {
            warn!("connect requested without any configured backend");
            return Err(CoreError::NotConfigured);
        }

        let _attempt = self.inner.connect_lock.lock().await;
        if self.inner.connection.lock().await.is_some() {
            debug!("already connected");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        *self.inner.pending.lock().await = Some(cancel.clone());
        let result = self.establish(&cancel).await;
        self.inner.pending.lock().await.take();
        if result.is_err() {
            cancel.cancel();
        }
        result
    }

    async fn establish(&self, cancel: &CancellationToken) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let kodi = config
            .kodi
            .as_ref()
            .map(|ep| {
                KodiClient::new(ep.url.clone(), ep.credentials.clone(), &transport)
                    .map(|c| c.with_correlations(Arc::clone(&self.inner.correlations)))
            })
            .transpose()?;
        let tvheadend = config
            .tvheadend
            .as_ref()
            .map(|ep| TvheadendClient::new(ep.url.clone(), ep.credentials.clone(), &transport))
            .transpose()?;

        let generation = {
            let mut session = self.inner.session.lock().await;
            if cancel.is_cancelled() {
                return Err(CoreError::Disconnected);
            }
            if kodi.is_some() {
                self.set_status(&mut session, Backend::Kodi, ConnectionStatus::Connecting);
            }
            if tvheadend.is_some() {
                self.set_status(&mut session, Backend::Tvheadend, ConnectionStatus::Connecting);
            }
            session.liveness_failures = 0;
            session.generation
        };

        let policy = RetryPolicy::new(config.retry_delay, config.max_probe_attempts);
        let (kodi_probe, tvh_probe) = tokio::join!(
            self.probe_kodi(kodi.as_ref(), &policy, cancel),
            self.probe_tvheadend(tvheadend.as_ref(), &policy, cancel),
        );

        let kodi_online = matches!(kodi_probe, Some(Ok(())));
        let tvh_online = matches!(tvh_probe, Some(Ok(())));
        let mut first_failure = None;
        {
            let mut session = self.inner.session.lock().await;
            if cancel.is_cancelled() {
                debug!("connect aborted while probing");
                return Err(CoreError::Disconnected);
            }
            for (backend, probe) in [(Backend::Kodi, kodi_probe), (Backend::Tvheadend, tvh_probe)] {
                match probe {
                    None => {}
                    Some(Ok(())) => {
                        info!(%backend, "backend online");
                        self.set_status(&mut session, backend, ConnectionStatus::Online);
                    }
                    Some(Err(e)) => {
                        error!(%backend, error = %e, "backend unreachable");
                        self.set_status(&mut session, backend, ConnectionStatus::Offline);
                        self.inner
                            .sink
                            .reconnect_prompt(&config.entity_id, &e.to_string());
                        if first_failure.is_none() {
                            first_failure = Some(e);
                        }
                    }
                }
            }
        }

        if !kodi_online && !tvh_online {
            return Err(first_failure.unwrap_or(CoreError::Disconnected));
        }

        let kodi = kodi.filter(|_| kodi_online);
        let tvheadend = tvheadend.filter(|_| tvh_online);

        let event_socket = match (&kodi, config.event_server_addr()) {
            (Some(_), Some((host, port))) => self.open_event_socket(&host, port, cancel).await,
            _ => None,
        };

        let (poll_tx, poll_rx) = mpsc::channel(POLL_EVENT_CHANNEL_SIZE);
        let (ticker_tx, ticker_rx) = watch::channel(false);
        let links = Arc::new(Links {
            generation,
            kodi,
            tvheadend,
            poll_tx,
            ticker_tx,
        });

        self.load_channels(&links, cancel).await;

        let mut conn_guard = self.inner.connection.lock().await;
        if cancel.is_cancelled() {
            debug!("connect aborted before the session started");
            return Err(CoreError::Disconnected);
        }

        // Spawn background tasks
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let mut task_handles = vec![tokio::spawn(tasks::command_processor_task(
            self.clone(),
            Arc::clone(&links),
            cancel.clone(),
            command_rx,
        ))];

        if links.kodi.is_some() {
            task_handles.push(tokio::spawn(tasks::poll_task(
                self.clone(),
                Arc::clone(&links),
                cancel.clone(),
                poll_rx,
            )));
            task_handles.push(tokio::spawn(tasks::progress_task(
                self.clone(),
                Arc::clone(&links),
                cancel.clone(),
                ticker_rx,
            )));
        }
        if let Some(socket) = event_socket {
            task_handles.push(tokio::spawn(tasks::event_task(
                self.clone(),
                Arc::clone(&links),
                cancel.clone(),
                socket,
            )));
        }
        if links.tvheadend.is_some() {
            task_handles.push(tokio::spawn(tasks::epg_task(
                self.clone(),
                Arc::clone(&links),
                cancel.clone(),
            )));
        }

        *conn_guard = Some(Connection {
            cancel: cancel.clone(),
            links,
            command_tx,
            task_handles,
        });
        info!(kodi = kodi_online, tvheadend = tvh_online, "connected");
        Ok(())
    }

    /// Stop every timer and task, drop in-flight requests and clear the
    /// player entity. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let mut conn_guard = self.inner.connection.lock().await;
        self.teardown(&mut conn_guard).await;
    }

    /// Disconnect only if the connection of `generation` is still current.
    pub(crate) async fn disconnect_generation(&self, generation: u64, reason: Option<&str>) {
        let mut conn_guard = self.inner.connection.lock().await;
        if conn_guard.as_ref().map(|c| c.links.generation) != Some(generation) {
            debug!(generation, "stale disconnect request ignored");
            return;
        }
        self.teardown(&mut conn_guard).await;
        drop(conn_guard);
        if let Some(reason) = reason {
            self.inner
                .sink
                .reconnect_prompt(&self.inner.config.entity_id, reason);
        }
    }

    /// Run [`disconnect_generation`](Self::disconnect_generation) on a
    /// detached task, so background tasks can request their own teardown.
    pub(crate) fn spawn_disconnect(&self, generation: u64, reason: Option<String>) {
        let ctrl = self.clone();
        tokio::spawn(async move {
            ctrl.disconnect_generation(generation, reason.as_deref()).await;
        });
    }

    async fn teardown(&self, conn_guard: &mut MutexGuard<'_, Option<Connection>>) {
        if let Some(pending) = self.inner.pending.lock().await.take() {
            debug!("cancelling connect in progress");
            pending.cancel();
        }
        if let Some(conn) = conn_guard.take() {
            conn.cancel.cancel();
            for handle in conn.task_handles {
                let _ = handle.await;
            }
        }

        let mut session = self.inner.session.lock().await;
        session.generation += 1;
        session.poller.reset();
        session.epg.cancel_in_flight();
        session.liveness_failures = 0;
        if !session.player.is_clear() {
            let updates = session.player.clear();
            self.publish(&updates);
        }
        session.player = PlayerSnapshot::default();

        let configured = [
            (Backend::Kodi, self.inner.config.kodi.is_some()),
            (Backend::Tvheadend, self.inner.config.tvheadend.is_some()),
            (Backend::EventSocket, self.inner.config.kodi.is_some()),
        ];
        for (backend, is_configured) in configured {
            if is_configured {
                self.set_status(&mut session, backend, ConnectionStatus::Offline);
            }
        }
        debug!(generation = session.generation, "disconnected");
    }

    /// Same as [`disconnect`](Self::disconnect).
    pub async fn enter_standby(&self) {
        info!("entering standby");
        self.disconnect().await;
    }

    /// Same as [`connect`](Self::connect).
    pub async fn leave_standby(&self) -> Result<(), CoreError> {
        info!("leaving standby");
        self.connect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.connection.lock().await.is_some()
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command through the command processor task.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let command_tx = self
            .inner
            .connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.command_tx.clone())
            .ok_or(CoreError::Disconnected)?;

        let (tx, rx) = tokio::sync::oneshot::channel();
        command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    /// Run EPG fetches back to back until the current pass is complete
    /// or the cache is still fresh. Returns the number of channels fetched.
    pub async fn run_epg_pass(&self) -> Result<usize, CoreError> {
        let (links, cancel) = {
            let guard = self.inner.connection.lock().await;
            let conn = guard.as_ref().ok_or(CoreError::Disconnected)?;
            (Arc::clone(&conn.links), conn.cancel.clone())
        };
        if links.tvheadend.is_none() {
            return Err(CoreError::Unsupported {
                operation: "EPG refresh".into(),
                reason: "TVHeadend is offline".into(),
            });
        }

        let mut fetched = 0;
        loop {
            match tasks::epg_step(self, &links, &cancel).await {
                tasks::EpgProgress::Fetched => fetched += 1,
                tasks::EpgProgress::Busy => tokio::time::sleep(EPG_BUSY_WAIT).await,
                tasks::EpgProgress::Done => break,
            }
        }
        Ok(fetched)
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to backend status changes.
    pub fn statuses(&self) -> watch::Receiver<BackendStatuses> {
        self.inner.status_tx.subscribe()
    }

    pub fn status(&self, backend: Backend) -> ConnectionStatus {
        self.inner.status_tx.borrow().get(backend)
    }

    pub async fn player_snapshot(&self) -> PlayerSnapshot {
        self.inner.session.lock().await.player.clone()
    }

    pub async fn poll_state(&self) -> PollState {
        self.inner.session.lock().await.poller.state()
    }

    pub async fn volume(&self) -> Option<u8> {
        self.inner.session.lock().await.volume
    }

    pub async fn channels(&self, group: ChannelGroup) -> Vec<ChannelRecord> {
        self.inner.session.lock().await.channels(group).to_vec()
    }

    pub async fn mapping(&self, group: ChannelGroup) -> ChannelMapping {
        self.inner.session.lock().await.mapping(group).clone()
    }

    pub async fn epg_expiration(&self) -> Option<chrono::DateTime<Utc>> {
        self.inner.session.lock().await.epg.expiration()
    }

    pub fn mapping_store(&self) -> Option<&MappingStore> {
        self.inner.store.as_ref()
    }

    // ── Internals ────────────────────────────────────────────────

    pub(crate) fn publish(&self, updates: &[AttributeUpdate]) {
        for update in updates {
            self.inner
                .sink
                .update_attr(&self.inner.config.entity_id, update);
        }
    }

    pub(crate) fn set_status(
        &self,
        session: &mut SessionState,
        backend: Backend,
        status: ConnectionStatus,
    ) {
        if session.statuses.get(backend) == status {
            return;
        }
        debug!(%backend, %status, "status change");
        session.statuses.set(backend, status);
        self.inner.status_tx.send_replace(session.statuses);
    }

    async fn probe_kodi(
        &self,
        kodi: Option<&KodiClient>,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Option<Result<(), CoreError>> {
        let kodi = kodi?;
        let outcome = policy
            .run("Kodi ping", cancel, |attempt| async move {
                let correlation = kodi.next_correlation();
                debug!(attempt, %correlation, "probing Kodi");
                match kodi.ping(correlation).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(CoreError::Protocol {
                        message: "JSONRPC.Ping did not answer pong".into(),
                        correlation: Some(correlation),
                    }),
                    Err(e) => Err(CoreError::from(e)),
                }
            })
            .await;
        Some(probe_result(Backend::Kodi, outcome))
    }

    async fn probe_tvheadend(
        &self,
        tvheadend: Option<&TvheadendClient>,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Option<Result<(), CoreError>> {
        let tvheadend = tvheadend?;
        let correlations = &self.inner.correlations;
        let outcome = policy
            .run("TVHeadend serverinfo", cancel, |attempt| async move {
                let correlation = correlations.next_id();
                debug!(attempt, %correlation, "probing TVHeadend");
                match tvheadend.server_info(correlation).await {
                    Ok(info) if info.is_online() => Ok(()),
                    Ok(_) => Err(CoreError::Protocol {
                        message: "serverinfo carries no server name".into(),
                        correlation: Some(correlation),
                    }),
                    Err(e) => Err(CoreError::from(e)),
                }
            })
            .await;
        Some(probe_result(Backend::Tvheadend, outcome))
    }

    async fn open_event_socket(
        &self,
        host: &str,
        port: u16,
        cancel: &CancellationToken,
    ) -> Option<EventSocketHandle> {
        let result = EventSocketHandle::connect(
            host,
            port,
            self.inner.config.timeout,
            cancel.child_token(),
        )
        .await;
        let mut session = self.inner.session.lock().await;
        if cancel.is_cancelled() {
            return None;
        }
        match result {
            Ok(socket) => {
                self.set_status(&mut session, Backend::EventSocket, ConnectionStatus::Online);
                Some(socket)
            }
            Err(e) => {
                // Push notifications are a fast path only.
                warn!(error = %e, "Kodi event server unavailable, relying on polling");
                self.set_status(&mut session, Backend::EventSocket, ConnectionStatus::Offline);
                None
            }
        }
    }

    /// Fetch Kodi's channel lists and make sure a channel mapping exists:
    /// already in memory, loaded from disk, or joined against TVHeadend.
    async fn load_channels(&self, links: &Links, cancel: &CancellationToken) {
        if let Some(kodi) = &links.kodi {
            let (tv, radio) = tokio::join!(
                fetch_group(kodi, ChannelGroup::Tv, cancel),
                fetch_group(kodi, ChannelGroup::Radio, cancel),
            );
            let mut session = self.inner.session.lock().await;
            if let Some(tv) = tv {
                session.replace_channels(ChannelGroup::Tv, tv);
            }
            if let Some(radio) = radio {
                session.replace_channels(ChannelGroup::Radio, radio);
            }
        }

        let needs_mapping = {
            let session = self.inner.session.lock().await;
            session.tv_mapping.is_empty() && session.radio_mapping.is_empty()
        };
        if !needs_mapping {
            debug!("channel mapping already present, skipping reconciliation");
            return;
        }

        if let Some(store) = &self.inner.store {
            match store.load() {
                Ok(Some(stored)) if !stored.is_empty() => {
                    let mut session = self.inner.session.lock().await;
                    session.tv_mapping = stored.tv;
                    session.radio_mapping = stored.radio;
                    return;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "could not read cached channel mapping"),
            }
        }

        let (Some(_), Some(tvheadend)) = (&links.kodi, &links.tvheadend) else {
            return;
        };
        let correlation = self.inner.correlations.next_id();
        let directory = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            res = tvheadend.channel_list(correlation) => res,
        };
        let directory = match directory {
            Ok(directory) => directory,
            Err(e) => {
                warn!(%correlation, error = %e, "TVHeadend channel list unavailable");
                return;
            }
        };

        let (tv, radio) = {
            let mut session = self.inner.session.lock().await;
            for group in ChannelGroup::ALL {
                let mapping = reconcile(session.channels(group), &directory);
                info!(%group, mapped = mapping.len(), "channel mapping built");
                *session.mapping_mut(group) = mapping;
            }
            (session.tv_mapping.clone(), session.radio_mapping.clone())
        };
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.save(&tv, &radio) {
                warn!(error = %e, "could not persist channel mapping");
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn probe_result(
    backend: Backend,
    outcome: Result<(), RetryError<CoreError>>,
) -> Result<(), CoreError> {
    match outcome {
        Ok(()) => Ok(()),
        Err(RetryError::Exhausted { attempts, last }) => Err(CoreError::ConnectionFailed {
            backend,
            attempts,
            reason: last.to_string(),
        }),
        Err(RetryError::Cancelled) => Err(CoreError::Disconnected),
    }
}

/// One Kodi channel group. A missing group is logged and yields `None`.
async fn fetch_group(
    kodi: &KodiClient,
    group: ChannelGroup,
    cancel: &CancellationToken,
) -> Option<Vec<ChannelRecord>> {
    let correlation = kodi.next_correlation();
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return None,
        res = kodi.pvr_channels(group.to_api(), correlation) => res,
    };
    match result {
        Ok(channels) => {
            debug!(%group, count = channels.len(), "Kodi channels loaded");
            Some(channels.into_iter().map(ChannelRecord::from).collect())
        }
        Err(e) => {
            warn!(%group, %correlation, error = %e, "Kodi channel list unavailable");
            None
        }
    }
}
