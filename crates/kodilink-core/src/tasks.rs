// ── Background tasks ──
//
// One set per connection: player polling, the progress ticker, the EPG
// loader, the event-server listener and the command processor. All of them
// exit on the connection's cancellation token and never apply a result to
// a session generation other than their own.

use std::sync::Arc;

use chrono::Utc;
use kodilink_api::kodi::KodiClient;
use kodilink_api::{CorrelationId, EventSocketHandle, KodiNotification, NotificationKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{MutexGuard, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::browse::{BrowseModel, ChannelListModel, ProgramListModel};
use crate::command::{Command, CommandEnvelope, CommandResult, EpgScope};
use crate::controller::{Controller, Links};
use crate::entity::{Attribute, AttributeUpdate};
use crate::epg::EpgStep;
use crate::error::CoreError;
use crate::model::{EpgEntry, PlayerState};
use crate::poller::{PollEvent, PollRequest, Poller, TickerAction};
use crate::session::{Backend, ConnectionStatus, SessionState};

const CHANNEL_MEDIA_TYPE: &str = "channel";

/// Lock the session if it still belongs to this connection.
async fn current_session<'a>(
    ctrl: &'a Controller,
    links: &Links,
) -> Option<MutexGuard<'a, SessionState>> {
    let session = ctrl.inner().session.lock().await;
    if session.generation == links.generation {
        Some(session)
    } else {
        trace!(
            task_generation = links.generation,
            session_generation = session.generation,
            "dropping result of a previous connection"
        );
        None
    }
}

fn apply_ticker(links: &Links, action: TickerAction) {
    match action {
        TickerAction::Keep => {}
        TickerAction::Restart => {
            links.ticker_tx.send_replace(true);
        }
        TickerAction::Stop => {
            links.ticker_tx.send_replace(false);
        }
    }
}

// ── Player polling ───────────────────────────────────────────────

pub(crate) async fn poll_task(
    ctrl: Controller,
    links: Arc<Links>,
    cancel: CancellationToken,
    mut poll_rx: mpsc::Receiver<PollEvent>,
) {
    let config = ctrl.config();
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(event) = poll_rx.recv() => event,
            _ = interval.tick() => {
                ticks += 1;
                let every = u64::from(config.liveness_every);
                if every > 0 && ticks % every == 0 && !check_liveness(&ctrl, &links, &cancel).await {
                    ctrl.spawn_disconnect(
                        links.generation,
                        Some("Kodi stopped answering. Reconnect?".into()),
                    );
                    break;
                }
                PollEvent::Tick
            }
        };
        drive(&ctrl, &links, &cancel, event).await;
    }
    debug!("poll task stopped");
}

/// Feed `event` into the poller and keep issuing the requests it asks
/// for until the cycle settles.
async fn drive(ctrl: &Controller, links: &Links, cancel: &CancellationToken, event: PollEvent) {
    let mut next = Some(event);
    while let Some(event) = next.take() {
        let step = {
            let Some(mut session) = current_session(ctrl, links).await else {
                return;
            };
            let session = &mut *session;
            let step = session.poller.advance(event, &mut session.player);
            ctrl.publish(&step.updates);
            step
        };
        apply_ticker(links, step.ticker);

        if let Some((correlation, request)) = step.request {
            next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                event = perform(links, correlation, request) => Some(event),
            };
        }
    }
}

/// Issue one poller request and turn its outcome into the next event.
async fn perform(links: &Links, correlation: CorrelationId, request: PollRequest) -> PollEvent {
    let Some(kodi) = &links.kodi else {
        return PollEvent::Failed {
            correlation,
            error: "Kodi is offline".into(),
        };
    };
    let kind = request.kind();
    let result = match request {
        PollRequest::ActivePlayers => kodi
            .active_players(correlation)
            .await
            .map(|players| PollEvent::ActivePlayers {
                correlation,
                players,
            }),
        PollRequest::Item { player_id } => kodi
            .player_item(player_id, correlation)
            .await
            .map(|res| PollEvent::Item {
                correlation,
                item: res.item,
            }),
        PollRequest::PrepareDownload { path, .. } => kodi
            .prepare_download(&path, correlation)
            .await
            .map(|download| PollEvent::Download {
                correlation,
                image_url: download.redirect_path().map(|p| kodi.image_url(p)),
            }),
        PollRequest::Properties { player_id } => kodi
            .player_properties(player_id, correlation)
            .await
            .map(|props| PollEvent::Properties { correlation, props }),
    };

    result.unwrap_or_else(|e| {
        if e.is_transient() {
            debug!(%correlation, ?kind, error = %e, "poll request failed");
        } else {
            warn!(%correlation, ?kind, error = %e, "unexpected poll response");
        }
        PollEvent::Failed {
            correlation,
            error: e.to_string(),
        }
    })
}

/// Volume refresh plus ping. `false` once consecutive ping failures
/// reach the probe limit.
async fn check_liveness(ctrl: &Controller, links: &Links, cancel: &CancellationToken) -> bool {
    let Some(kodi) = &links.kodi else {
        return true;
    };
    let (props, ping) = tokio::select! {
        biased;
        () = cancel.cancelled() => return true,
        res = async {
            let props = kodi.application_properties(kodi.next_correlation()).await;
            let ping = kodi.ping(kodi.next_correlation()).await;
            (props, ping)
        } => res,
    };

    let Some(mut session) = current_session(ctrl, links).await else {
        return true;
    };
    match props {
        Ok(props) if session.volume != Some(props.volume) => {
            session.volume = Some(props.volume);
            ctrl.publish(&[AttributeUpdate::number(
                Attribute::Volume,
                u64::from(props.volume),
            )]);
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "volume query failed"),
    }

    match ping {
        Ok(true) => {
            session.liveness_failures = 0;
            true
        }
        outcome => {
            session.liveness_failures += 1;
            let failures = session.liveness_failures;
            match outcome {
                Err(e) => warn!(failures, error = %e, "Kodi ping failed"),
                Ok(_) => warn!(failures, "Kodi ping answered without pong"),
            }
            if failures >= ctrl.config().max_probe_attempts {
                error!(failures, "Kodi stopped answering, disconnecting");
                false
            } else {
                true
            }
        }
    }
}

// ── Progress ticker ──────────────────────────────────────────────

/// Advance the playback position once per tick while the ticker runs.
/// Every value sent on the watch channel restarts the tick phase.
pub(crate) async fn progress_task(
    ctrl: Controller,
    links: Arc<Links>,
    cancel: CancellationToken,
    mut ticker_rx: watch::Receiver<bool>,
) {
    let period = ctrl.config().progress_tick;
    loop {
        let running = *ticker_rx.borrow_and_update();
        if running {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    changed = ticker_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        break;
                    }
                    _ = interval.tick() => {
                        let Some(mut session) = current_session(&ctrl, &links).await else {
                            return;
                        };
                        if let Some(update) = Poller::tick_progress(&mut session.player) {
                            ctrl.publish(&[update]);
                        }
                    }
                }
            }
        } else {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                changed = ticker_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

// ── EPG loading ──────────────────────────────────────────────────

/// Result of one EPG timer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EpgProgress {
    /// One channel was fetched (or failed and was skipped).
    Fetched,
    /// Another fetch is still in flight.
    Busy,
    /// Nothing to do until the cache expires.
    Done,
}

pub(crate) async fn epg_task(ctrl: Controller, links: Arc<Links>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(ctrl.config().epg_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                epg_step(&ctrl, &links, &cancel).await;
            }
        }
    }
    debug!("EPG task stopped");
}

pub(crate) async fn epg_step(
    ctrl: &Controller,
    links: &Links,
    cancel: &CancellationToken,
) -> EpgProgress {
    let Some(tvheadend) = &links.tvheadend else {
        return EpgProgress::Done;
    };

    let step = {
        let Some(mut session) = current_session(ctrl, links).await else {
            return EpgProgress::Done;
        };
        if session.epg.in_flight().is_some() {
            return EpgProgress::Busy;
        }
        let session = &mut *session;
        session
            .epg
            .tick(Utc::now(), &session.tv_mapping, &ctrl.config().epg_channels)
    };

    let EpgStep::Fetch {
        correlation,
        channel_uuid,
        limit,
        ..
    } = step
    else {
        return EpgProgress::Done;
    };

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return EpgProgress::Done,
        res = tvheadend.epg_grid(&channel_uuid, limit, correlation) => res,
    };

    let Some(mut session) = current_session(ctrl, links).await else {
        return EpgProgress::Done;
    };
    match result {
        Ok(events) => {
            session
                .epg
                .apply(correlation, events.into_iter().map(EpgEntry::from).collect());
        }
        Err(e) => {
            warn!(%correlation, %channel_uuid, error = %e, "EPG fetch failed");
            session.epg.fail(correlation);
        }
    }
    EpgProgress::Fetched
}

// ── Event server ─────────────────────────────────────────────────

pub(crate) async fn event_task(
    ctrl: Controller,
    links: Arc<Links>,
    cancel: CancellationToken,
    socket: EventSocketHandle,
) {
    let mut rx = socket.subscribe();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(note) => {
                    if !handle_notification(&ctrl, &links, &note) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event notifications lagged");
                }
                Err(RecvError::Closed) => {
                    info!("Kodi event server connection closed");
                    if let Some(mut session) = current_session(&ctrl, &links).await {
                        ctrl.set_status(&mut session, Backend::EventSocket, ConnectionStatus::Offline);
                    }
                    break;
                }
            }
        }
    }
    socket.shutdown();
}

/// React to one push notification. `false` stops the listener.
fn handle_notification(ctrl: &Controller, links: &Links, note: &KodiNotification) -> bool {
    match note.kind {
        NotificationKind::OnQuit => {
            info!("Kodi is shutting down");
            ctrl.spawn_disconnect(links.generation, None);
            false
        }
        NotificationKind::OnResume => {
            debug!("playback resumed, polling now");
            if let Err(e) = links.poll_tx.try_send(PollEvent::Resume) {
                debug!(error = %e, "resume not queued");
            }
            true
        }
        NotificationKind::OnPlay => {
            debug!(params = %note.params, "playback started");
            true
        }
        NotificationKind::Other => {
            trace!(method = %note.method, "ignoring notification");
            true
        }
    }
}

// ── Command processing ───────────────────────────────────────────

pub(crate) async fn command_processor_task(
    ctrl: Controller,
    links: Arc<Links>,
    cancel: CancellationToken,
    mut rx: mpsc::Receiver<CommandEnvelope>,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(CoreError::Disconnected),
                    res = route_command(&ctrl, &links, envelope.command) => res,
                };
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

async fn route_command(
    ctrl: &Controller,
    links: &Links,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    debug!(command = ?cmd, "executing command");

    if let Some(action) = cmd.input_action() {
        let kodi = require_kodi(links)?;
        kodi.input(action, kodi.next_correlation()).await?;
        return Ok(CommandResult::Ok);
    }
    if let Some(action) = cmd.channel_action() {
        let kodi = require_kodi(links)?;
        {
            let session = session(ctrl, links).await?;
            if session.player.media_type != CHANNEL_MEDIA_TYPE {
                return Err(CoreError::Unsupported {
                    operation: action.into(),
                    reason: "current media is not a TV channel".into(),
                });
            }
        }
        kodi.execute_action(action, kodi.next_correlation()).await?;
        apply_ticker(links, TickerAction::Stop);
        queue_poll(links, PollEvent::Tick);
        return Ok(CommandResult::Ok);
    }

    match cmd {
        // ── Playback ─────────────────────────────────────────────

        Command::PlayChannel { channel_id } => {
            let kodi = require_kodi(links)?;
            kodi.open_channel(channel_id, kodi.next_correlation()).await?;
            {
                let mut session = session(ctrl, links).await?;
                let update = session.player.set_state(PlayerState::Playing);
                ctrl.publish(&[update]);
            }
            queue_poll(links, PollEvent::Resume);
            Ok(CommandResult::Ok)
        }

        Command::PlayPause => {
            let kodi = require_kodi(links)?;
            let player_id = active_player(ctrl, links, "PlayPause").await?;
            kodi.play_pause(player_id, kodi.next_correlation()).await?;
            Ok(CommandResult::Ok)
        }

        Command::Stop => {
            let kodi = require_kodi(links)?;
            let player_id = active_player(ctrl, links, "Stop").await?;
            kodi.stop(player_id, kodi.next_correlation()).await?;
            let ticker = {
                let mut session = session(ctrl, links).await?;
                let session = &mut *session;
                let step = session.poller.advance(PollEvent::Stopped, &mut session.player);
                ctrl.publish(&step.updates);
                step.ticker
            };
            apply_ticker(links, ticker);
            Ok(CommandResult::Ok)
        }

        // ── Application ──────────────────────────────────────────

        Command::SetVolume(volume) => {
            let kodi = require_kodi(links)?;
            let volume = kodi.set_volume(volume, kodi.next_correlation()).await?;
            let mut session = session(ctrl, links).await?;
            session.volume = Some(volume);
            ctrl.publish(&[AttributeUpdate::number(Attribute::Volume, u64::from(volume))]);
            Ok(CommandResult::Volume(volume))
        }

        // ── Browsing ─────────────────────────────────────────────

        Command::ShowEpg(scope) => {
            let model = {
                let session = session(ctrl, links).await?;
                let now = Utc::now();
                match scope {
                    EpgScope::All => session.epg.render_grid(
                        now,
                        &session.tv_mapping,
                        &session.tv_channels,
                        &ctrl.config().epg_channels,
                    ),
                    EpgScope::Channel(number) => session.epg.render_channel(
                        number,
                        now,
                        &session.tv_mapping,
                        &session.tv_channels,
                    ),
                }
            };
            Ok(show(ctrl, BrowseModel::Epg(model)))
        }

        Command::ShowChannelList(group) => {
            let host = links
                .tvheadend
                .as_ref()
                .and_then(|t| t.host().map(str::to_owned))
                .or_else(|| {
                    ctrl.config()
                        .tvheadend
                        .as_ref()
                        .and_then(|ep| ep.host().map(str::to_owned))
                });
            let model = {
                let session = session(ctrl, links).await?;
                ChannelListModel::build(group, session.channels(group), host.as_deref())
            };
            Ok(show(ctrl, BrowseModel::Channels(model)))
        }

        Command::ShowChannelPrograms { channel_id } => {
            let model = {
                let session = session(ctrl, links).await?;
                let (group, channel) =
                    session
                        .channel_by_id(channel_id)
                        .ok_or_else(|| CoreError::ChannelNotFound {
                            identifier: channel_id.to_string(),
                        })?;
                let entries = session
                    .mapping(group)
                    .uuid_for(channel.kodi_channel_number)
                    .map_or(&[][..], |uuid| session.epg.entries_for(uuid));
                ProgramListModel::build(channel_id, entries)
            };
            Ok(show(ctrl, BrowseModel::Programs(model)))
        }

        // Handled above.
        Command::Next
        | Command::Previous
        | Command::ChannelUp
        | Command::ChannelDown
        | Command::Up
        | Command::Down
        | Command::Left
        | Command::Right
        | Command::Ok
        | Command::Back
        | Command::Menu => Ok(CommandResult::Ok),
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn require_kodi(links: &Links) -> Result<&KodiClient, CoreError> {
    links.kodi.as_ref().ok_or_else(|| CoreError::Unsupported {
        operation: "Kodi command".into(),
        reason: "Kodi is offline".into(),
    })
}

async fn session<'a>(
    ctrl: &'a Controller,
    links: &Links,
) -> Result<MutexGuard<'a, SessionState>, CoreError> {
    current_session(ctrl, links)
        .await
        .ok_or(CoreError::Disconnected)
}

async fn active_player(ctrl: &Controller, links: &Links, operation: &str) -> Result<i64, CoreError> {
    session(ctrl, links)
        .await?
        .player
        .player_id
        .ok_or_else(|| CoreError::Unsupported {
            operation: operation.into(),
            reason: "no active player".into(),
        })
}

fn queue_poll(links: &Links, event: PollEvent) {
    if let Err(e) = links.poll_tx.try_send(event) {
        debug!(error = %e, "poll event not queued");
    }
}

fn show(ctrl: &Controller, model: BrowseModel) -> CommandResult {
    let model = Arc::new(model);
    ctrl.inner()
        .sink
        .set_browse_model(&ctrl.config().entity_id, Arc::clone(&model));
    CommandResult::Browse(model)
}
