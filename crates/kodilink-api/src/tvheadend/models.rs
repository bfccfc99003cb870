// TVHeadend REST wire types

use serde::{Deserialize, Serialize};

/// `GET /api/serverinfo`
///
/// A reply carrying `name` means the server is reachable and we are
/// authorized.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sw_version: Option<String>,
    #[serde(default)]
    pub api_version: Option<u32>,
}

impl ServerInfo {
    pub fn is_online(&self) -> bool {
        self.name.is_some()
    }
}

/// `GET /api/channel/list`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelDirectory {
    #[serde(default)]
    pub entries: Vec<DirectoryEntry>,
}

/// One channel of the directory: `key` is the channel UUID, `val` its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub key: String,
    pub val: String,
}

/// `GET /api/epg/events/grid`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpgGrid {
    #[serde(default)]
    pub entries: Vec<EpgEvent>,
    #[serde(rename = "totalCount", default)]
    pub total_count: u64,
}

/// Single EPG event as served by TVHeadend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgEvent {
    #[serde(rename = "channelUuid", default)]
    pub channel_uuid: String,
    #[serde(rename = "channelName", default)]
    pub channel_name: Option<String>,
    #[serde(rename = "eventId", default)]
    pub event_id: Option<u64>,
    /// Unix seconds.
    pub start: i64,
    /// Unix seconds.
    pub stop: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
