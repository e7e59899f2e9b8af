use tokio::sync::mpsc;

use crate::types::Position;

/// Protocol events normalized across both editions.
///
/// Adapters translate whatever their protocol library reports into these and
/// push them onto the session's event channel; the bot manager's dispatcher
/// is the only consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    /// Bot joined / spawned / logged in
    SessionEstablished,
    /// Connection closed by the remote end or the transport
    SessionEnded { reason: String },
    /// Kicked or refused by the server
    SessionRejected { reason: String },
    /// Transport-level failure
    TransportError { message: String },
    /// Chat line received; `speaker` is `None` for system messages
    ChatReceived { speaker: Option<String>, text: String },
    HealthUpdated { health: f32, food: f32 },
    PositionUpdated(Position),
    /// One physics tick worth of proximity data
    ProximityTick {
        own: Position,
        /// Positions of other players; `None` when not yet resolved
        others: Vec<Option<Position>>,
    },
    InventoryUpdated { full: bool },
}

pub type EventSender = mpsc::UnboundedSender<BotEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<BotEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
