use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "anarchy_bot.log";

static COLOR_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"§[0-9a-fk-orA-FK-OR]").expect("valid color code regex"));

pub fn init_logger() -> Result<()> {
    let log_dir = get_log_dir();

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Console and file output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!("Logger initialized, writing to {:?}", log_dir.join(LOG_FILE_NAME));
    Ok(())
}

fn get_log_dir() -> PathBuf {
    // Log next to the executable
    match std::env::current_exe() {
        Ok(exe_path) => exe_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| {
                eprintln!("Warning: Could not get parent directory of executable, using current directory");
                PathBuf::from(".")
            }),
        Err(e) => {
            eprintln!("Warning: Could not get executable path ({}), using current directory", e);
            PathBuf::from(".")
        }
    }
}

/// Remove Minecraft color codes from a string
pub fn remove_color_codes(text: &str) -> String {
    COLOR_CODE_RE.replace_all(text, "").to_string()
}
