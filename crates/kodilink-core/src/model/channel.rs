// ── Channel records ──

use kodilink_api::kodi::models::PvrChannel;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use strum::{Display, EnumString};

/// Kodi PVR channel group; each keeps its own channel mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelGroup {
    Tv,
    Radio,
}

impl ChannelGroup {
    pub const ALL: [Self; 2] = [Self::Tv, Self::Radio];

    pub(crate) fn to_api(self) -> kodilink_api::kodi::ChannelGroup {
        match self {
            Self::Tv => kodilink_api::kodi::ChannelGroup::Tv,
            Self::Radio => kodilink_api::kodi::ChannelGroup::Radio,
        }
    }
}

/// One Kodi channel. Lists of these are replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    pub kodi_channel_id: u32,
    pub kodi_channel_number: u32,
    pub label: String,
    /// Raw `image://...` URI as sent by Kodi.
    pub thumbnail_uri: String,
}

impl From<PvrChannel> for ChannelRecord {
    fn from(ch: PvrChannel) -> Self {
        Self {
            kodi_channel_id: ch.channel_id,
            kodi_channel_number: ch.channel_number,
            label: ch.label,
            thumbnail_uri: ch.thumbnail,
        }
    }
}

/// Turn a Kodi `image://<percent-encoded-url>/` thumbnail into a plain URL.
///
/// A loopback host is replaced by `tvheadend_host` since the image is
/// usually served by TVHeadend running next to Kodi.
pub fn fix_thumbnail(raw: &str, tvheadend_host: Option<&str>) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let mut url = decoded
        .strip_prefix("image://")
        .unwrap_or(decoded.as_ref())
        .to_owned();

    if let Some(host) = tvheadend_host {
        url = url.replace("127.0.0.1", host);
    }
    if url.ends_with('/') {
        url.pop();
    }
    url
}
