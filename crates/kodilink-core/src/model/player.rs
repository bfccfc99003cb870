// ── Player snapshot ──
//
// What the media-player entity currently shows. Mutated only by the
// player poller; every mutation returns the attribute updates it implies
// so callers publish a whole batch or nothing.

use serde::Serialize;
use strum::{Display, EnumString};

use crate::entity::{Attribute, AttributeUpdate, AttributeValue};

/// Kodi player kind, as reported by `Player.GetActivePlayers`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlayerType {
    Video,
    Audio,
    #[default]
    Unset,
}

impl PlayerType {
    pub fn from_kodi(kind: &str) -> Self {
        match kind {
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Unset,
        }
    }
}

/// Entity `STATE` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayerState {
    Off,
    On,
    #[default]
    Idle,
    Playing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub player_id: Option<i64>,
    pub player_type: PlayerType,
    pub media_type: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    pub duration_secs: u64,
    pub position_secs: u64,
    pub is_playing: bool,
    pub state: PlayerState,
}

impl PlayerSnapshot {
    /// Blank media fields and idle state.
    pub fn is_clear(&self) -> bool {
        self.media_type.is_empty()
            && self.title.is_empty()
            && self.artist.is_empty()
            && self.thumbnail.is_empty()
            && !self.is_playing
            && self.state == PlayerState::Idle
    }

    /// Blank the media fields and go idle. The player stays known so a
    /// paused channel can still be resumed.
    pub fn clear(&mut self) -> Vec<AttributeUpdate> {
        self.media_type.clear();
        self.title.clear();
        self.artist.clear();
        self.thumbnail.clear();
        self.is_playing = false;
        self.state = PlayerState::Idle;
        vec![
            AttributeUpdate::text(Attribute::MediaType, ""),
            AttributeUpdate::text(Attribute::MediaTitle, ""),
            AttributeUpdate::text(Attribute::MediaArtist, ""),
            AttributeUpdate::text(Attribute::MediaImage, ""),
            AttributeUpdate::new(Attribute::State, AttributeValue::State(PlayerState::Idle)),
        ]
    }

    pub fn set_state(&mut self, state: PlayerState) -> AttributeUpdate {
        self.state = state;
        self.is_playing = state == PlayerState::Playing;
        AttributeUpdate::new(Attribute::State, AttributeValue::State(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_keeps_the_player() {
        let mut snap = PlayerSnapshot {
            player_id: Some(1),
            player_type: PlayerType::Video,
            media_type: "channel".into(),
            title: "News".into(),
            artist: "BBC One".into(),
            thumbnail: "http://kodi/logo.png".into(),
            duration_secs: 1800,
            position_secs: 60,
            is_playing: true,
            state: PlayerState::Playing,
        };
        let updates = snap.clear();
        assert!(snap.is_clear());
        assert_eq!(snap.player_id, Some(1));
        assert_eq!(snap.player_type, PlayerType::Video);
        assert_eq!(snap.duration_secs, 1800);
        assert_eq!(updates.len(), 5);
        assert_eq!(
            updates.last().map(|u| u.attribute),
            Some(Attribute::State)
        );
    }

    #[test]
    fn player_type_parses_kodi_names() {
        assert_eq!(PlayerType::from_kodi("video"), PlayerType::Video);
        assert_eq!(PlayerType::from_kodi("audio"), PlayerType::Audio);
        assert_eq!(PlayerType::from_kodi("picture"), PlayerType::Unset);
        assert_eq!(PlayerState::Playing.to_string(), "PLAYING");
    }
}
