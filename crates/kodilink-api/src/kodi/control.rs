// Kodi Input and Application endpoints
//
// Remote-control navigation, channel zapping and volume.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::kodi::client::KodiClient;
use crate::kodi::models::ApplicationProperties;
use crate::request::CorrelationId;

/// Navigation keys, each a parameterless `Input.*` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    ContextMenu,
}

impl InputAction {
    pub fn method(self) -> &'static str {
        match self {
            Self::Up => "Input.Up",
            Self::Down => "Input.Down",
            Self::Left => "Input.Left",
            Self::Right => "Input.Right",
            Self::Select => "Input.Select",
            Self::Back => "Input.Back",
            Self::ContextMenu => "Input.ContextMenu",
        }
    }
}

impl KodiClient {
    /// Send a navigation key.
    pub async fn input(&self, action: InputAction, correlation: CorrelationId) -> Result<(), Error> {
        debug!(method = action.method(), "sending input");
        self.request(action.method(), Value::Null, correlation)
            .await?;
        Ok(())
    }

    /// `Input.ExecuteAction`, e.g. `channelup` / `channeldown`.
    pub async fn execute_action(
        &self,
        action: &str,
        correlation: CorrelationId,
    ) -> Result<(), Error> {
        debug!(action, "executing input action");
        self.request("Input.ExecuteAction", json!({ "action": action }), correlation)
            .await?;
        Ok(())
    }

    /// `Application.GetProperties` for `volume` and `muted`.
    pub async fn application_properties(
        &self,
        correlation: CorrelationId,
    ) -> Result<ApplicationProperties, Error> {
        self.call(
            "Application.GetProperties",
            json!({ "properties": ["volume", "muted"] }),
            correlation,
        )
        .await
    }

    /// `Application.SetVolume`. Returns the volume Kodi settled on.
    pub async fn set_volume(&self, volume: u8, correlation: CorrelationId) -> Result<u8, Error> {
        debug!(volume, "setting volume");
        self.call(
            "Application.SetVolume",
            json!({ "volume": volume.min(100) }),
            correlation,
        )
        .await
    }
}
