// Kodi PVR endpoints

use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::kodi::client::KodiClient;
use crate::kodi::models::{CHANNEL_PROPERTIES, ChannelGroup, ChannelsResult, PvrChannel};
use crate::request::CorrelationId;

impl KodiClient {
    /// Full channel list of a PVR group, in Kodi's order.
    ///
    /// `PVR.GetChannels` with `channelgroupid` `alltv` or `allradio`.
    pub async fn pvr_channels(
        &self,
        group: ChannelGroup,
        correlation: CorrelationId,
    ) -> Result<Vec<PvrChannel>, Error> {
        debug!(group = group.group_id(), "fetching PVR channels");
        let result: ChannelsResult = self
            .call(
                "PVR.GetChannels",
                json!({
                    "channelgroupid": group.group_id(),
                    "properties": CHANNEL_PROPERTIES,
                }),
                correlation,
            )
            .await?;
        Ok(result.channels)
    }
}
