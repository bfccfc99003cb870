// ── Command API ──
//
// Every remote-control action flows through one `Command` enum, routed by
// the controller's command processor to Kodi or to a browse projection.

use std::sync::Arc;

use kodilink_api::kodi::InputAction;

use crate::browse::BrowseModel;
use crate::error::CoreError;
use crate::model::ChannelGroup;

/// A command plus the oneshot that receives its result.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Which EPG grid to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpgScope {
    /// Every configured (or mapped) channel.
    All,
    /// A single Kodi channel number.
    Channel(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Playback ─────────────────────────────────────────────────────
    PlayChannel { channel_id: u32 },
    PlayPause,
    Stop,
    Next,
    Previous,
    ChannelUp,
    ChannelDown,

    // ── Navigation ───────────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Ok,
    Back,
    Menu,

    // ── Application ──────────────────────────────────────────────────
    SetVolume(u8),

    // ── Browsing ─────────────────────────────────────────────────────
    ShowEpg(EpgScope),
    ShowChannelList(ChannelGroup),
    ShowChannelPrograms { channel_id: u32 },
}

impl Command {
    /// Next/ChannelUp map to `channelup`, Previous/ChannelDown to `channeldown`.
    pub(crate) fn channel_action(&self) -> Option<&'static str> {
        match self {
            Self::Next | Self::ChannelUp => Some("channelup"),
            Self::Previous | Self::ChannelDown => Some("channeldown"),
            _ => None,
        }
    }

    pub(crate) fn input_action(&self) -> Option<InputAction> {
        match self {
            Self::Up => Some(InputAction::Up),
            Self::Down => Some(InputAction::Down),
            Self::Left => Some(InputAction::Left),
            Self::Right => Some(InputAction::Right),
            Self::Ok => Some(InputAction::Select),
            Self::Back => Some(InputAction::Back),
            Self::Menu => Some(InputAction::ContextMenu),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    Volume(u8),
    Browse(Arc<BrowseModel>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_navigation_actions() {
        assert_eq!(Command::Next.channel_action(), Some("channelup"));
        assert_eq!(Command::ChannelDown.channel_action(), Some("channeldown"));
        assert_eq!(Command::Ok.channel_action(), None);
    }

    #[test]
    fn navigation_keys_map_to_input_methods() {
        assert_eq!(Command::Ok.input_action(), Some(InputAction::Select));
        assert_eq!(Command::Menu.input_action(), Some(InputAction::ContextMenu));
        assert_eq!(Command::ShowEpg(EpgScope::All).input_action(), None);
    }
}
