//! Operator console on stdin
//!
//! `/start [id]`, `/stop`, `/status` and `/help` control the bot; any other
//! line (including in-game slash commands) is sent as chat.

use std::sync::Arc;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::bot::{BotManager, StartOutcome};
use crate::store::ProfileStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(Option<u32>),
    Stop,
    Status,
    Help,
    Chat(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let input = line.trim();
        if input.is_empty() {
            return None;
        }

        let mut parts = input.split_whitespace();
        let command = match parts.next()?.to_lowercase().as_str() {
            "/start" => match parts.next() {
                Some(id) => match id.parse() {
                    Ok(id) => ConsoleCommand::Start(Some(id)),
                    Err(_) => ConsoleCommand::Help,
                },
                None => ConsoleCommand::Start(None),
            },
            "/stop" => ConsoleCommand::Stop,
            "/status" => ConsoleCommand::Status,
            "/help" => ConsoleCommand::Help,
            _ => ConsoleCommand::Chat(input.to_string()),
        };
        Some(command)
    }
}

fn print_help() {
    info!("Console commands:");
    info!("  /start [profile id] - Connect the bot");
    info!("  /stop - Disconnect the bot");
    info!("  /status - Show the bot status");
    info!("  <text> - Send chat (slash commands go to the server)");
}

/// Read commands until stdin closes
pub async fn run(bot: BotManager, profiles: Arc<dyn ProfileStore>) {
    print_help();
    let mut lines = BufReader::new(stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };

        match command {
            ConsoleCommand::Start(id) => match profiles.get_config(id) {
                Some(profile) => {
                    // Connects in the background so /stop stays usable
                    let bot = bot.clone();
                    tokio::spawn(async move {
                        match bot.start(profile.session_config()).await {
                            StartOutcome::AlreadyRunning => info!("Bot is already running"),
                            StartOutcome::Cancelled => info!("Start cancelled"),
                            StartOutcome::Started | StartOutcome::Failed(_) => {}
                        }
                    });
                }
                None => warn!("No profile found to start with"),
            },
            ConsoleCommand::Stop => bot.stop().await,
            ConsoleCommand::Status => {
                let status = bot.get_status();
                info!(
                    "State: {:?} | Online: {} | Health: {} | Food: {} | Nearby players: {}",
                    bot.connection_state(),
                    status.online,
                    status.health,
                    status.food,
                    status.nearby_players
                );
            }
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Chat(message) => {
                if !bot.chat(&message).await {
                    warn!("Bot is not running, message not sent");
                }
            }
        }
    }
}
