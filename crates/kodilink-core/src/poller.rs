// ── Player poller ──
//
// Enum-driven state machine deciding what to ask Kodi next. Every async
// completion is fed back through `Poller::advance` as a `PollEvent`; the
// returned `Step` names the next request (if any), the attribute batch to
// publish and what to do with the progress ticker. No I/O happens here.

use std::sync::Arc;

use kodilink_api::kodi::models::{ActivePlayer, PlayerItem, PlayerProperties};
use kodilink_api::{CorrelationId, CorrelationSource, RequestKind};
use serde::Serialize;
use strum::Display;
use tracing::{debug, trace};

use crate::entity::{Attribute, AttributeUpdate};
use crate::model::{PlayerSnapshot, PlayerState, PlayerType};

/// Item type the poller reports on; anything else is ignored.
const CHANNEL_ITEM_TYPE: &str = "channel";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
pub enum PollState {
    #[default]
    GetActivePlayers,
    GetItem,
    PrepareDownload,
    GetProperties,
    /// Set by an explicit Stop command; the next tick restarts the cycle.
    Stopped,
}

/// A request the poll task must issue on the poller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollRequest {
    ActivePlayers,
    Item { player_id: i64 },
    PrepareDownload { player_id: i64, path: String },
    Properties { player_id: i64 },
}

impl PollRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::ActivePlayers => RequestKind::ActivePlayers,
            Self::Item { .. } => RequestKind::PlayerItem,
            Self::PrepareDownload { .. } => RequestKind::PrepareDownload,
            Self::Properties { .. } => RequestKind::PlayerProperties,
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// Poll timer fired.
    Tick,
    /// `Player.OnResume` or a freshly opened channel: restart the cycle now.
    Resume,
    ActivePlayers {
        correlation: CorrelationId,
        players: Vec<ActivePlayer>,
    },
    Item {
        correlation: CorrelationId,
        item: Option<PlayerItem>,
    },
    /// Thumbnail resolved; `None` when Kodi did not offer a redirect.
    Download {
        correlation: CorrelationId,
        image_url: Option<String>,
    },
    Properties {
        correlation: CorrelationId,
        props: PlayerProperties,
    },
    /// The in-flight request failed (transport, status or protocol).
    Failed {
        correlation: CorrelationId,
        error: String,
    },
    /// Explicit Stop command succeeded.
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickerAction {
    #[default]
    Keep,
    Restart,
    Stop,
}

/// Outcome of one `advance` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub request: Option<(CorrelationId, PollRequest)>,
    pub updates: Vec<AttributeUpdate>,
    pub ticker: TickerAction,
}

impl Step {
    fn idle() -> Self {
        Self::default()
    }

    fn with_request(mut self, correlation: CorrelationId, request: PollRequest) -> Self {
        self.request = Some((correlation, request));
        self
    }
}

#[derive(Debug)]
pub struct Poller {
    state: PollState,
    correlations: Arc<CorrelationSource>,
    /// Correlation of the single request this poller is waiting on.
    awaiting: Option<CorrelationId>,
    /// True until the first GetProperties since connect has been applied.
    first_run: bool,
}

impl Poller {
    pub fn new(correlations: Arc<CorrelationSource>) -> Self {
        Self {
            state: PollState::GetActivePlayers,
            correlations,
            awaiting: None,
            first_run: true,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn in_flight(&self) -> Option<CorrelationId> {
        self.awaiting
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// Forget everything session-specific. Responses to requests issued
    /// before the reset no longer match and are dropped.
    pub fn reset(&mut self) {
        self.state = PollState::GetActivePlayers;
        self.awaiting = None;
        self.first_run = true;
    }

    /// Feed one event into the machine.
    pub fn advance(&mut self, event: PollEvent, snapshot: &mut PlayerSnapshot) -> Step {
        match event {
            PollEvent::Tick => self.on_tick(),
            PollEvent::Resume => {
                debug!(from = %self.state, "resuming poll cycle");
                self.state = PollState::GetActivePlayers;
                self.awaiting = None;
                let mut step = self.issue(PollRequest::ActivePlayers);
                if snapshot.state != PlayerState::Playing {
                    step.updates.push(snapshot.set_state(PlayerState::Playing));
                }
                step
            }
            PollEvent::Stopped => {
                self.state = PollState::Stopped;
                self.awaiting = None;
                Step {
                    request: None,
                    updates: snapshot.clear(),
                    ticker: TickerAction::Stop,
                }
            }
            PollEvent::ActivePlayers {
                correlation,
                players,
            } => {
                if !self.accept(correlation) {
                    return Step::idle();
                }
                self.on_active_players(&players, snapshot)
            }
            PollEvent::Item { correlation, item } => {
                if !self.accept(correlation) {
                    return Step::idle();
                }
                self.on_item(item, snapshot)
            }
            PollEvent::Download {
                correlation,
                image_url,
            } => {
                if !self.accept(correlation) {
                    return Step::idle();
                }
                let mut updates = Vec::new();
                if let Some(url) = image_url {
                    snapshot.thumbnail.clone_from(&url);
                    updates.push(AttributeUpdate::text(Attribute::MediaImage, url));
                }
                let mut step = self.request_properties(snapshot);
                step.updates = updates;
                step
            }
            PollEvent::Properties { correlation, props } => {
                if !self.accept(correlation) {
                    return Step::idle();
                }
                self.on_properties(&props, snapshot)
            }
            PollEvent::Failed { correlation, error } => {
                if !self.accept(correlation) {
                    return Step::idle();
                }
                debug!(%correlation, state = %self.state, error, "poll request failed");
                if self.state == PollState::PrepareDownload {
                    // Only the image update is lost.
                    self.request_properties(snapshot)
                } else {
                    self.state = PollState::GetActivePlayers;
                    Step::idle()
                }
            }
        }
    }

    /// Advance the displayed position by one second while playing.
    pub fn tick_progress(snapshot: &mut PlayerSnapshot) -> Option<AttributeUpdate> {
        if !snapshot.is_playing {
            return None;
        }
        snapshot.position_secs += 1;
        if snapshot.duration_secs > 0 {
            snapshot.position_secs = snapshot.position_secs.min(snapshot.duration_secs);
        }
        Some(AttributeUpdate::number(
            Attribute::MediaProgress,
            snapshot.position_secs,
        ))
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn on_tick(&mut self) -> Step {
        if let Some(correlation) = self.awaiting {
            trace!(%correlation, "poll cycle still in flight, skipping tick");
            return Step::idle();
        }
        self.state = PollState::GetActivePlayers;
        self.issue(PollRequest::ActivePlayers)
    }

    fn on_active_players(&mut self, players: &[ActivePlayer], snapshot: &mut PlayerSnapshot) -> Step {
        let Some(player) = players.iter().find(|p| p.player_id > 0) else {
            self.state = PollState::GetActivePlayers;
            return Step::idle();
        };
        snapshot.player_id = Some(player.player_id);
        snapshot.player_type = PlayerType::from_kodi(&player.player_type);
        self.state = PollState::GetItem;
        self.issue(PollRequest::Item {
            player_id: player.player_id,
        })
    }

    fn on_item(&mut self, item: Option<PlayerItem>, snapshot: &mut PlayerSnapshot) -> Step {
        let Some(item) = item else {
            self.state = PollState::GetActivePlayers;
            return Step::idle();
        };
        if item.item_type.as_deref() != Some(CHANNEL_ITEM_TYPE) {
            debug!(item_type = ?item.item_type, "not a channel, ignoring item");
            self.state = PollState::GetActivePlayers;
            return Step::idle();
        }
        if !self.first_run && item.title == snapshot.title {
            trace!(title = %item.title, "item unchanged");
            self.state = PollState::GetActivePlayers;
            return Step::idle();
        }
        if !self.first_run && snapshot.state == PlayerState::Idle {
            // Paused: only look at the speed until playback picks up again.
            trace!(title = %item.title, "player idle, not reporting item");
            return self.request_properties(snapshot);
        }

        snapshot.media_type = CHANNEL_ITEM_TYPE.to_owned();
        snapshot.title.clone_from(&item.title);
        snapshot.artist.clone_from(&item.label);
        let updates = vec![
            AttributeUpdate::text(Attribute::MediaType, CHANNEL_ITEM_TYPE),
            AttributeUpdate::text(Attribute::MediaTitle, item.title),
            AttributeUpdate::text(Attribute::MediaArtist, item.label),
        ];

        let mut step = match snapshot.player_id {
            Some(player_id) if !item.thumbnail.is_empty() => {
                self.state = PollState::PrepareDownload;
                self.issue(PollRequest::PrepareDownload {
                    player_id,
                    path: item.thumbnail,
                })
            }
            _ => self.request_properties(snapshot),
        };
        step.updates = updates;
        step
    }

    fn on_properties(&mut self, props: &PlayerProperties, snapshot: &mut PlayerSnapshot) -> Step {
        self.state = PollState::GetActivePlayers;
        self.first_run = false;

        let playing = props.speed.unwrap_or(0.0) > 0.0;
        if !playing && snapshot.is_clear() {
            trace!("still paused");
            return Step {
                ticker: TickerAction::Stop,
                ..Step::idle()
            };
        }

        snapshot.duration_secs = props.totaltime.map_or(0, |t| t.as_secs());
        snapshot.position_secs = props.time.map_or(0, |t| t.as_secs());
        let mut updates = vec![
            AttributeUpdate::number(Attribute::MediaDuration, snapshot.duration_secs),
            AttributeUpdate::number(Attribute::MediaProgress, snapshot.position_secs),
        ];

        if playing {
            updates.push(snapshot.set_state(PlayerState::Playing));
            Step {
                request: None,
                updates,
                ticker: TickerAction::Restart,
            }
        } else {
            updates.extend(snapshot.clear());
            Step {
                request: None,
                updates,
                ticker: TickerAction::Stop,
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn request_properties(&mut self, snapshot: &PlayerSnapshot) -> Step {
        match snapshot.player_id {
            Some(player_id) => {
                self.state = PollState::GetProperties;
                self.issue(PollRequest::Properties { player_id })
            }
            None => {
                self.state = PollState::GetActivePlayers;
                Step::idle()
            }
        }
    }

    fn issue(&mut self, request: PollRequest) -> Step {
        let correlation = self.correlations.next_id();
        trace!(%correlation, kind = %request.kind(), "poll request");
        self.awaiting = Some(correlation);
        Step::idle().with_request(correlation, request)
    }

    /// Consume the awaited correlation. Anything else is a stale reply.
    fn accept(&mut self, correlation: CorrelationId) -> bool {
        if self.awaiting == Some(correlation) {
            self.awaiting = None;
            true
        } else {
            debug!(%correlation, awaiting = ?self.awaiting, "discarding stale poll response");
            false
        }
    }
}
