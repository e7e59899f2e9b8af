use anyhow::{Context, Result};
use anarchy_bot::{
    api::{build_router, AppState},
    bot::BotManager,
    config::ConfigLoader,
    console,
    logging::init_logger,
    store::{FileProfileStore, LogStore, ProfileInput, ProfileStore},
};
use dialoguer::{Input, Select};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    info!("Starting Anarchy Bot v{}", VERSION);

    // Load or create configuration
    let config_loader = ConfigLoader::new();
    let config = config_loader.load()?;

    let profiles = FileProfileStore::open(config_loader.base_dir().join(&config.profiles_file))?;
    if profiles.is_empty() {
        if std::io::stdin().is_terminal() {
            first_run_setup(&profiles)?;
        } else {
            profiles.ensure_default()?;
            info!("Created default profile");
        }
    }
    let profiles: Arc<dyn ProfileStore> = Arc::new(profiles);

    let logs = Arc::new(LogStore::new(config.log_capacity));
    let bot = BotManager::new(logs.clone(), config.bot.clone());

    let password = config.active_password().map(Arc::<str>::from);
    if password.is_none() {
        warn!("web_gui_password is not set, the dashboard API accepts every request");
    }

    if config.enable_console_input {
        tokio::spawn(console::run(bot.clone(), profiles.clone()));
    }

    let app = build_router(AppState {
        bot: bot.clone(),
        profiles,
        logs,
        password,
    });

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind dashboard API on {address}"))?;
    info!("Dashboard API listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(bot))
        .await
        .context("Dashboard API server failed")?;

    info!("Anarchy Bot stopped");
    Ok(())
}

/// Ask for the first profile interactively
fn first_run_setup(profiles: &FileProfileStore) -> Result<()> {
    info!("No bot profile found, starting first-run setup");

    let server_ip: String = Input::new()
        .with_prompt("Server address")
        .default("localhost".to_string())
        .interact_text()?;

    let editions = ["Java", "Bedrock"];
    let edition = Select::new()
        .with_prompt("Edition")
        .items(&editions)
        .default(0)
        .interact()?;
    let is_bedrock = edition == 1;

    let server_port: u16 = Input::new()
        .with_prompt("Server port")
        .default(if is_bedrock { 19132 } else { 25565 })
        .interact_text()?;

    let username: String = Input::new()
        .with_prompt("Bot username")
        .default("AnarchyBot".to_string())
        .interact_text()?;

    let profile = profiles.upsert(ProfileInput {
        server_ip,
        server_port,
        username,
        is_bedrock: Some(is_bedrock),
        ..ProfileInput::default()
    })?;
    info!(
        "Saved profile {} ({}:{})",
        profile.id, profile.server_ip, profile.server_port
    );
    Ok(())
}

async fn shutdown_signal(bot: BotManager) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    bot.stop().await;
}
