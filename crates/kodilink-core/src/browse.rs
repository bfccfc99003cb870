// ── Browse models ──
//
// View models handed to the entity through `EntitySink::set_browse_model`:
// the EPG timeline grid, channel lists and per-channel program lists. They
// are plain serializable data; building them never touches session state.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::epg::{LABEL_WIDTH, PX_PER_MINUTE};
use crate::model::{ChannelGroup, ChannelRecord, EpgEntry, fix_thumbnail};

pub const HEADER_COLOR: &str = "#FF0000";
pub const CHANNEL_LABEL_COLOR: &str = "#0000FF";
pub const PROGRAM_COLOR: &str = "#FFFF00";
pub const TEXT_COLOR: &str = "#FFFFFF";

const NO_PROGRAM: &str = "No program available";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowseModel {
    Epg(EpgGridModel),
    Channels(ChannelListModel),
    Programs(ProgramListModel),
}

// ── EPG grid ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpgItemKind {
    Header,
    ChannelLabel,
    Program,
}

/// One positioned cell of the timeline grid. `x` and `width` are pixels,
/// `y` is a row index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpgItem {
    pub id: String,
    pub kind: EpgItemKind,
    pub x: i64,
    pub y: u32,
    pub width: i64,
    pub height: u32,
    pub color: &'static str,
    pub text_color: &'static str,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpgGridModel {
    /// Grid origin (the hour before "now").
    pub starts_at: i64,
    pub items: Vec<EpgItem>,
}

impl EpgGridModel {
    pub fn programs(&self) -> impl Iterator<Item = &EpgItem> {
        self.items.iter().filter(|i| i.kind == EpgItemKind::Program)
    }

    pub fn headers(&self) -> impl Iterator<Item = &EpgItem> {
        self.items.iter().filter(|i| i.kind == EpgItemKind::Header)
    }

    /// Label of grid row `y`, if the grid has one.
    pub fn row_label(&self, y: u32) -> Option<&str> {
        self.items
            .iter()
            .find(|i| i.kind == EpgItemKind::ChannelLabel && i.y == y)
            .map(|i| i.title.as_str())
    }

    /// Unix time at the left edge of a program cell. Programs clipped at
    /// the grid origin report the origin.
    pub fn start_of(&self, item: &EpgItem) -> i64 {
        self.starts_at + (item.x - LABEL_WIDTH) / PX_PER_MINUTE * 60
    }

    /// Unix time at the right edge of a program cell.
    pub fn stop_of(&self, item: &EpgItem) -> i64 {
        self.start_of(item) + item.width / PX_PER_MINUTE * 60
    }
}

// ── Channel list ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelListItem {
    pub channel_id: u32,
    pub number: u32,
    pub title: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelListModel {
    pub group: ChannelGroup,
    pub items: Vec<ChannelListItem>,
}

impl ChannelListModel {
    /// Project a Kodi channel list, rewriting thumbnails into fetchable URLs.
    pub fn build(group: ChannelGroup, channels: &[ChannelRecord], tvheadend_host: Option<&str>) -> Self {
        let items = channels
            .iter()
            .map(|ch| ChannelListItem {
                channel_id: ch.kodi_channel_id,
                number: ch.kodi_channel_number,
                title: ch.label.clone(),
                image_url: fix_thumbnail(&ch.thumbnail_uri, tvheadend_host),
            })
            .collect();
        Self { group, items }
    }
}

// ── Program list ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramListItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramListModel {
    pub channel_id: u32,
    pub items: Vec<ProgramListItem>,
}

impl ProgramListModel {
    /// "HH:MM title" rows sorted by start time, or a single placeholder row.
    pub fn build(channel_id: u32, entries: &[EpgEntry]) -> Self {
        let mut sorted: Vec<&EpgEntry> = entries.iter().collect();
        sorted.sort_by_key(|e| e.start);

        let mut items: Vec<ProgramListItem> = sorted
            .into_iter()
            .map(|e| ProgramListItem {
                id: e.start.to_string(),
                title: format!("{} {}", local_clock(e.start), e.title),
                subtitle: e.subtitle.clone(),
            })
            .collect();

        if items.is_empty() {
            items.push(ProgramListItem {
                id: "0".into(),
                title: NO_PROGRAM.into(),
                subtitle: None,
            });
        }
        Self { channel_id, items }
    }
}

fn local_clock(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: i64, title: &str) -> EpgEntry {
        EpgEntry {
            channel_uuid: "uuid-1".into(),
            start,
            stop: start + 600,
            title: title.into(),
            subtitle: None,
            description: None,
        }
    }

    #[test]
    fn program_list_is_sorted_by_start() {
        let model = ProgramListModel::build(7, &[entry(2_000, "Late"), entry(1_000, "Early")]);
        assert_eq!(model.items.len(), 2);
        assert!(model.items[0].title.ends_with(" Early"));
        assert!(model.items[1].title.ends_with(" Late"));
        // "HH:MM " prefix
        assert_eq!(model.items[0].title.find(' '), Some(5));
    }

    #[test]
    fn empty_program_list_has_placeholder() {
        let model = ProgramListModel::build(7, &[]);
        assert_eq!(model.items.len(), 1);
        assert_eq!(model.items[0].title, NO_PROGRAM);
    }

    #[test]
    fn channel_list_fixes_thumbnails() {
        let channels = [ChannelRecord {
            kodi_channel_id: 7,
            kodi_channel_number: 3,
            label: "BBC One".into(),
            thumbnail_uri: "image://http%3a%2f%2f127.0.0.1%3a9981%2fimagecache%2f5/".into(),
        }];
        let model = ChannelListModel::build(ChannelGroup::Tv, &channels, Some("tvh.lan"));
        assert_eq!(model.items[0].image_url, "http://tvh.lan:9981/imagecache/5");
        assert_eq!(model.items[0].number, 3);
    }
}
