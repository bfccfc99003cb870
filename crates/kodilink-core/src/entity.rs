// ── Entity update contract ──
//
// The remote UI owns the media-player entity; the integration only pushes
// attribute values, browse models and reconnect prompts into it through
// `EntitySink`. `BroadcastSink` fans these out to any number of
// subscribers (the CLI `watch` command, tests).

use std::sync::Arc;

use serde::Serialize;
use strum::{Display, EnumString};
use tokio::sync::broadcast;

use crate::browse::BrowseModel;
use crate::model::PlayerState;

const ENTITY_CHANNEL_SIZE: usize = 256;

/// Media-player attributes the integration writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Attribute {
    State,
    MediaType,
    MediaTitle,
    MediaArtist,
    MediaImage,
    MediaDuration,
    MediaProgress,
    Volume,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(u64),
    State(PlayerState),
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::State(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeUpdate {
    pub attribute: Attribute,
    pub value: AttributeValue,
}

impl AttributeUpdate {
    pub fn new(attribute: Attribute, value: AttributeValue) -> Self {
        Self { attribute, value }
    }

    pub fn text(attribute: Attribute, value: impl Into<String>) -> Self {
        Self::new(attribute, AttributeValue::Text(value.into()))
    }

    pub fn number(attribute: Attribute, value: u64) -> Self {
        Self::new(attribute, AttributeValue::Number(value))
    }
}

/// Receiver of entity updates.
///
/// Implementations must not block: they are called while session state
/// is locked so a batch is observed in order.
pub trait EntitySink: Send + Sync {
    fn update_attr(&self, entity_id: &str, update: &AttributeUpdate);

    fn set_browse_model(&self, entity_id: &str, model: Arc<BrowseModel>);

    /// Ask the user to reconnect (all retries exhausted).
    fn reconnect_prompt(&self, entity_id: &str, reason: &str);
}

/// Everything a `BroadcastSink` publishes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EntityEvent {
    Attribute {
        entity_id: String,
        #[serde(flatten)]
        update: AttributeUpdate,
    },
    Browse {
        entity_id: String,
        model: Arc<BrowseModel>,
    },
    ReconnectPrompt {
        entity_id: String,
        reason: String,
    },
}

/// Sink publishing every update on a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Arc<EntityEvent>>,
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ENTITY_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EntityEvent>> {
        self.tx.subscribe()
    }

    fn publish(&self, event: EntityEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(Arc::new(event));
    }
}

impl EntitySink for BroadcastSink {
    fn update_attr(&self, entity_id: &str, update: &AttributeUpdate) {
        self.publish(EntityEvent::Attribute {
            entity_id: entity_id.to_owned(),
            update: update.clone(),
        });
    }

    fn set_browse_model(&self, entity_id: &str, model: Arc<BrowseModel>) {
        self.publish(EntityEvent::Browse {
            entity_id: entity_id.to_owned(),
            model,
        });
    }

    fn reconnect_prompt(&self, entity_id: &str, reason: &str) {
        self.publish(EntityEvent::ReconnectPrompt {
            entity_id: entity_id.to_owned(),
            reason: reason.to_owned(),
        });
    }
}
