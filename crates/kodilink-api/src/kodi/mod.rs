// Kodi JSON-RPC client modules
//
// Transport mechanics live in `client`; the typed methods are split by
// Kodi namespace (Player, PVR, Input/Application) into inherent impls.

pub mod client;
pub mod control;
pub mod models;
pub mod player;
pub mod pvr;

pub use client::{KodiClient, Reply};
pub use control::InputAction;
pub use models::ChannelGroup;
