//! Anarchy Bot
//!
//! Runs one Minecraft bot session at a time, Java edition through Azalea or
//! Bedrock edition over RakNet, and serves its status, logs and controls to
//! a web dashboard.

#![recursion_limit = "256"]

pub mod adapters;
pub mod api;
pub mod bot;
pub mod config;
pub mod console;
pub mod logging;
pub mod state;
pub mod store;
pub mod types;
pub mod utils;

pub use bot::{BotEvent, BotManager, StartOutcome};
pub use types::{BotStatus, ConnectionState, SessionConfig};
