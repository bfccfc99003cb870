use kodilink_api::tvheadend::EpgEvent;
use serde::Serialize;

/// One guide entry of a TVHeadend channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpgEntry {
    pub channel_uuid: String,
    /// Unix seconds.
    pub start: i64,
    /// Unix seconds.
    pub stop: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
}

impl EpgEntry {
    pub fn duration_secs(&self) -> i64 {
        (self.stop - self.start).max(0)
    }
}

impl From<EpgEvent> for EpgEntry {
    fn from(ev: EpgEvent) -> Self {
        Self {
            channel_uuid: ev.channel_uuid,
            start: ev.start,
            stop: ev.stop,
            title: ev.title,
            subtitle: ev.subtitle.filter(|s| !s.is_empty()),
            description: ev.description.filter(|s| !s.is_empty()),
        }
    }
}
