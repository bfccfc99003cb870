// TVHeadend REST client modules

pub mod client;
pub mod models;

pub use client::TvheadendClient;
pub use models::{DirectoryEntry, EpgEvent, ServerInfo};
