// ── Session state ──
//
// The single owned bundle of mutable integration state. The controller
// keeps it behind one async mutex; components receive `&mut` access to
// the parts they own and never reach for globals.

use serde::Serialize;
use strum::Display;

use crate::epg::EpgAggregator;
use crate::model::{ChannelGroup, ChannelRecord, PlayerSnapshot};
use crate::poller::Poller;
use crate::reconcile::ChannelMapping;

/// The three independently tracked connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum Backend {
    #[strum(serialize = "Kodi")]
    Kodi,
    #[strum(serialize = "TVHeadend")]
    Tvheadend,
    #[strum(serialize = "Kodi event server")]
    EventSocket,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
pub enum ConnectionStatus {
    #[default]
    Unconfigured,
    Connecting,
    Online,
    Offline,
}

/// Per-backend status. Written only by the connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendStatuses {
    pub kodi: ConnectionStatus,
    pub tvheadend: ConnectionStatus,
    pub event_socket: ConnectionStatus,
}

impl BackendStatuses {
    pub fn get(&self, backend: Backend) -> ConnectionStatus {
        match backend {
            Backend::Kodi => self.kodi,
            Backend::Tvheadend => self.tvheadend,
            Backend::EventSocket => self.event_socket,
        }
    }

    pub(crate) fn set(&mut self, backend: Backend, status: ConnectionStatus) {
        match backend {
            Backend::Kodi => self.kodi = status,
            Backend::Tvheadend => self.tvheadend = status,
            Backend::EventSocket => self.event_socket = status,
        }
    }

    pub fn is_online(&self, backend: Backend) -> bool {
        self.get(backend) == ConnectionStatus::Online
    }
}

#[derive(Debug)]
pub struct SessionState {
    pub statuses: BackendStatuses,
    /// Bumped on every disconnect. Work started under an older generation
    /// must not touch the state.
    pub generation: u64,
    pub poller: Poller,
    pub player: PlayerSnapshot,
    pub volume: Option<u8>,
    pub tv_channels: Vec<ChannelRecord>,
    pub radio_channels: Vec<ChannelRecord>,
    pub tv_mapping: ChannelMapping,
    pub radio_mapping: ChannelMapping,
    pub epg: EpgAggregator,
    /// Consecutive failed liveness pings while online.
    pub liveness_failures: u32,
}

impl SessionState {
    pub fn new(poller: Poller, epg: EpgAggregator) -> Self {
        Self {
            statuses: BackendStatuses::default(),
            generation: 0,
            poller,
            player: PlayerSnapshot::default(),
            volume: None,
            tv_channels: Vec::new(),
            radio_channels: Vec::new(),
            tv_mapping: ChannelMapping::new(),
            radio_mapping: ChannelMapping::new(),
            epg,
            liveness_failures: 0,
        }
    }

    pub fn channels(&self, group: ChannelGroup) -> &[ChannelRecord] {
        match group {
            ChannelGroup::Tv => &self.tv_channels,
            ChannelGroup::Radio => &self.radio_channels,
        }
    }

    /// Replace a channel list wholesale.
    pub fn replace_channels(&mut self, group: ChannelGroup, channels: Vec<ChannelRecord>) {
        match group {
            ChannelGroup::Tv => self.tv_channels = channels,
            ChannelGroup::Radio => self.radio_channels = channels,
        }
    }

    pub fn mapping(&self, group: ChannelGroup) -> &ChannelMapping {
        match group {
            ChannelGroup::Tv => &self.tv_mapping,
            ChannelGroup::Radio => &self.radio_mapping,
        }
    }

    pub(crate) fn mapping_mut(&mut self, group: ChannelGroup) -> &mut ChannelMapping {
        match group {
            ChannelGroup::Tv => &mut self.tv_mapping,
            ChannelGroup::Radio => &mut self.radio_mapping,
        }
    }

    /// Kodi channel by its Kodi id, searched in both groups.
    pub fn channel_by_id(&self, channel_id: u32) -> Option<(ChannelGroup, &ChannelRecord)> {
        ChannelGroup::ALL.into_iter().find_map(|group| {
            self.channels(group)
                .iter()
                .find(|ch| ch.kodi_channel_id == channel_id)
                .map(|ch| (group, ch))
        })
    }
}
