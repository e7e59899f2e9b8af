pub mod auto_eat;
pub mod events;
pub mod manager;
pub mod threat;

pub use events::BotEvent;
pub use manager::{BotManager, StartOutcome};
