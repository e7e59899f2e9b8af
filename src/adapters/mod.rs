//! Protocol adapters
//!
//! One adapter per wire protocol family. Both expose the same capability set:
//! connect, disconnect, send chat, and a stream of [`BotEvent`]s.

pub mod bedrock;
pub mod java;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::bot::events::EventSender;
use crate::types::{InventoryItem, SessionConfig};

pub use bedrock::BedrockAdapter;
pub use java::JavaAdapter;

/// Opens sessions for one protocol family
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Construct a session and start pumping its events into `events`.
    ///
    /// Returns once the client object exists; joining the world is reported
    /// later through [`BotEvent::SessionEstablished`](crate::bot::BotEvent).
    async fn connect(&self, config: &SessionConfig, events: EventSender) -> Result<Box<dyn SessionHandle>>;
}

/// A live protocol connection owned by the bot manager
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn disconnect(&self);

    async fn send_chat(&self, text: &str) -> Result<()>;

    /// In-game controls, for editions that expose an inventory
    fn player(&self) -> Option<Arc<dyn PlayerControl>> {
        None
    }
}

/// Inventory and item-use access used by the auto-eat loop
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Current food level, `None` until the server has reported it
    fn food(&self) -> Option<u32>;

    fn inventory(&self) -> Vec<InventoryItem>;

    /// Put `item` into the active hand
    async fn equip(&self, item: &InventoryItem) -> Result<()>;

    /// Use the item in the active hand
    async fn consume(&self) -> Result<()>;
}
