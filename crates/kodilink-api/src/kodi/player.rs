// Kodi Player and Files endpoints used by the player poller.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::kodi::client::KodiClient;
use crate::kodi::models::{
    ActivePlayer, PLAYER_ITEM_PROPERTIES, PlayerItemResult, PlayerProperties, PreparedDownload,
};
use crate::request::CorrelationId;

impl KodiClient {
    /// `Player.GetActivePlayers`
    pub async fn active_players(
        &self,
        correlation: CorrelationId,
    ) -> Result<Vec<ActivePlayer>, Error> {
        self.call("Player.GetActivePlayers", Value::Null, correlation)
            .await
    }

    /// `Player.GetItem` for `player_id` with the item properties the
    /// entity needs.
    pub async fn player_item(
        &self,
        player_id: i64,
        correlation: CorrelationId,
    ) -> Result<PlayerItemResult, Error> {
        debug!(player_id, "fetching player item");
        self.call(
            "Player.GetItem",
            json!({ "playerid": player_id, "properties": PLAYER_ITEM_PROPERTIES }),
            correlation,
        )
        .await
    }

    /// `Files.PrepareDownload` for an `image://` thumbnail path.
    pub async fn prepare_download(
        &self,
        path: &str,
        correlation: CorrelationId,
    ) -> Result<PreparedDownload, Error> {
        self.call("Files.PrepareDownload", json!({ "path": path }), correlation)
            .await
    }

    /// `Player.GetProperties` for `totaltime`, `time` and `speed`.
    pub async fn player_properties(
        &self,
        player_id: i64,
        correlation: CorrelationId,
    ) -> Result<PlayerProperties, Error> {
        self.call(
            "Player.GetProperties",
            json!({ "playerid": player_id, "properties": ["totaltime", "time", "speed"] }),
            correlation,
        )
        .await
    }

    /// `Player.PlayPause`
    pub async fn play_pause(&self, player_id: i64, correlation: CorrelationId) -> Result<(), Error> {
        debug!(player_id, "toggling play/pause");
        self.request("Player.PlayPause", json!({ "playerid": player_id }), correlation)
            .await?;
        Ok(())
    }

    /// `Player.Stop`
    pub async fn stop(&self, player_id: i64, correlation: CorrelationId) -> Result<(), Error> {
        debug!(player_id, "stopping player");
        self.request("Player.Stop", json!({ "playerid": player_id }), correlation)
            .await?;
        Ok(())
    }

    /// `Player.Open` with a PVR channel item.
    pub async fn open_channel(
        &self,
        channel_id: u32,
        correlation: CorrelationId,
    ) -> Result<(), Error> {
        debug!(channel_id, "opening channel");
        self.request(
            "Player.Open",
            json!({ "item": { "channelid": channel_id } }),
            correlation,
        )
        .await?;
        Ok(())
    }
}
