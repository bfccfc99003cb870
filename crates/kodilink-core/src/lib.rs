// kodilink-core: Session engine between kodilink-api and consumers (CLI, remote UI).

pub mod browse;
pub mod command;
pub mod config;
pub mod controller;
pub mod entity;
pub mod epg;
pub mod error;
pub mod model;
pub mod persist;
pub mod poller;
pub mod reconcile;
pub mod retry;
pub mod session;
mod tasks;

// ── Primary re-exports ──────────────────────────────────────────────
pub use browse::{BrowseModel, ChannelListModel, EpgGridModel, EpgItem, EpgItemKind, ProgramListModel};
pub use command::{Command, CommandResult, EpgScope};
pub use config::{Endpoint, IntegrationConfig};
pub use controller::Controller;
pub use entity::{
    Attribute, AttributeUpdate, AttributeValue, BroadcastSink, EntityEvent, EntitySink,
};
pub use epg::{EpgAggregator, EpgStep};
pub use error::CoreError;
pub use persist::{MappingStore, StoredMappings};
pub use poller::{PollEvent, PollRequest, PollState, Poller, Step, TickerAction};
pub use reconcile::{ChannelMapping, reconcile};
pub use session::{Backend, BackendStatuses, ConnectionStatus, SessionState};

pub use model::{ChannelGroup, ChannelRecord, EpgEntry, PlayerSnapshot, PlayerState, PlayerType};

// Transport type carried by `Endpoint`.
pub use kodilink_api::Credentials;
