// ── Domain model ──
//
// Session-level types shared by the poller, the reconciler and the EPG
// aggregator. API wire types are converted into these at the boundary.

pub mod channel;
pub mod epg;
pub mod player;

pub use channel::{ChannelGroup, ChannelRecord, fix_thumbnail};
pub use epg::EpgEntry;
pub use player::{PlayerSnapshot, PlayerState, PlayerType};
