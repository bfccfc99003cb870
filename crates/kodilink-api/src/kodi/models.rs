// Kodi JSON-RPC wire types
//
// Kodi is loose with numeric types across versions: channel ids and
// numbers arrive as either JSON numbers or strings. The lenient
// deserializers below accept both.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request body.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
    pub id: u64,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

// ── Player ──────────────────────────────────────────────────────────

/// Entry of `Player.GetActivePlayers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActivePlayer {
    #[serde(rename = "playerid", deserialize_with = "lenient_i64")]
    pub player_id: i64,
    /// `video`, `audio` or `picture`.
    #[serde(rename = "type", default)]
    pub player_type: String,
}

/// `Player.GetItem` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerItemResult {
    #[serde(default)]
    pub item: Option<PlayerItem>,
}

/// The item a player is currently rendering.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerItem {
    /// `channel`, `movie`, `episode`, `song`, `unknown`...
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub showtitle: String,
    #[serde(default)]
    pub artist: Vec<String>,
    #[serde(default)]
    pub duration: i64,
}

/// Item properties requested from `Player.GetItem`.
pub const PLAYER_ITEM_PROPERTIES: &[&str] = &[
    "title",
    "album",
    "artist",
    "season",
    "episode",
    "duration",
    "showtitle",
    "tvshowid",
    "thumbnail",
    "file",
    "fanart",
    "streamdetails",
];

/// `Files.PrepareDownload` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreparedDownload {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub details: DownloadDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadDetails {
    #[serde(default)]
    pub path: String,
}

impl PreparedDownload {
    /// Path relative to the Kodi web server, when the file is served by redirect.
    pub fn redirect_path(&self) -> Option<&str> {
        (self.protocol == "http" && self.mode == "redirect" && !self.details.path.is_empty())
            .then_some(self.details.path.as_str())
    }
}

/// Kodi's `Global.Time` shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct KodiTime {
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub milliseconds: u64,
}

impl KodiTime {
    /// Whole seconds, truncating milliseconds.
    pub fn as_secs(self) -> u64 {
        (self.hours * 3_600_000 + self.minutes * 60_000 + self.seconds * 1000 + self.milliseconds)
            / 1000
    }
}

/// `Player.GetProperties` result for `totaltime`, `time`, `speed`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerProperties {
    #[serde(default)]
    pub totaltime: Option<KodiTime>,
    #[serde(default)]
    pub time: Option<KodiTime>,
    #[serde(default)]
    pub speed: Option<f64>,
}

// ── Application ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationProperties {
    #[serde(default)]
    pub volume: u8,
    #[serde(default)]
    pub muted: bool,
}

// ── PVR ─────────────────────────────────────────────────────────────

/// Kodi PVR channel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelGroup {
    Tv,
    Radio,
}

impl ChannelGroup {
    pub fn group_id(self) -> &'static str {
        match self {
            Self::Tv => "alltv",
            Self::Radio => "allradio",
        }
    }
}

/// `PVR.GetChannels` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsResult {
    #[serde(default)]
    pub channels: Vec<PvrChannel>,
}

/// Single PVR channel as reported by Kodi.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PvrChannel {
    #[serde(rename = "channelid", alias = "id", deserialize_with = "lenient_u32")]
    pub channel_id: u32,
    #[serde(
        rename = "channelnumber",
        alias = "number",
        default,
        deserialize_with = "lenient_u32"
    )]
    pub channel_number: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(rename = "uniqueid", default, deserialize_with = "lenient_u32")]
    pub unique_id: u32,
}

/// Channel properties requested from `PVR.GetChannels`.
pub const CHANNEL_PROPERTIES: &[&str] = &["thumbnail", "uniqueid", "channelnumber"];

// ── Lenient numbers ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    fn into_i64(self) -> Result<i64, String> {
        match self {
            Self::Int(n) => Ok(n),
            #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
            Self::Float(f) if f.fract() == 0.0 => Ok(f as i64),
            Self::Float(f) => Err(format!("expected an integer, got {f}")),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("expected a numeric string, got {s:?}")),
        }
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    NumberOrString::deserialize(de)?
        .into_i64()
        .map_err(serde::de::Error::custom)
}

fn lenient_u32<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    let n = lenient_i64(de)?;
    u32::try_from(n).map_err(|_| serde::de::Error::custom(format!("{n} is out of range")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_accepts_string_numbers() {
        let ch: PvrChannel =
            serde_json::from_value(json!({"id": "7", "number": "3", "label": "BBC One"}))
                .unwrap();
        assert_eq!(ch.channel_id, 7);
        assert_eq!(ch.channel_number, 3);
        assert_eq!(ch.label, "BBC One");
    }

    #[test]
    fn channel_accepts_kodi_native_shape() {
        let ch: PvrChannel = serde_json::from_value(json!({
            "channelid": 12,
            "channelnumber": 101,
            "label": "Das Erste HD",
            "thumbnail": "image://http%3a%2f%2f127.0.0.1%3a9981%2fimagecache%2f3/",
            "uniqueid": 4242
        }))
        .unwrap();
        assert_eq!(ch.channel_id, 12);
        assert_eq!(ch.channel_number, 101);
        assert_eq!(ch.unique_id, 4242);
    }

    #[test]
    fn kodi_time_converts_to_seconds() {
        let t = KodiTime {
            hours: 1,
            minutes: 2,
            seconds: 3,
            milliseconds: 999,
        };
        assert_eq!(t.as_secs(), 3723);
    }

    #[test]
    fn redirect_path_requires_http_redirect() {
        let ok: PreparedDownload = serde_json::from_value(json!({
            "protocol": "http",
            "mode": "redirect",
            "details": {"path": "vfs/image%3A%2F%2Flogo.png"}
        }))
        .unwrap();
        assert_eq!(ok.redirect_path(), Some("vfs/image%3A%2F%2Flogo.png"));

        let direct: PreparedDownload =
            serde_json::from_value(json!({"protocol": "http", "mode": "direct"}))
                .unwrap();
        assert_eq!(direct.redirect_path(), None);
    }
}
