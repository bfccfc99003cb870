// kodilink-api: Async clients for Kodi (JSON-RPC + event server) and TVHeadend (REST)

pub mod error;
pub mod event_socket;
pub mod kodi;
pub mod request;
pub mod transport;
pub mod tvheadend;

pub use error::Error;
pub use event_socket::{EventSocketHandle, KodiNotification, NotificationKind};
pub use kodi::KodiClient;
pub use request::{CorrelationId, CorrelationSource, RequestKind};
pub use transport::{Credentials, TransportConfig};
pub use tvheadend::TvheadendClient;
