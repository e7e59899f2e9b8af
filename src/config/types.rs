use serde::{Deserialize, Serialize};

/// Application configuration, stored as `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_web_gui_host")]
    pub web_gui_host: String,

    #[serde(default = "default_web_gui_port")]
    pub web_gui_port: u16,

    /// Bearer token required by the dashboard API. Unset leaves the API open.
    #[serde(default)]
    pub web_gui_password: Option<String>,

    #[serde(default = "default_profiles_file")]
    pub profiles_file: String,

    /// Maximum number of dashboard log entries kept in memory
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    #[serde(default = "default_true")]
    pub enable_console_input: bool,

    #[serde(default)]
    pub bot: BotSettings,
}

/// Tuning for the in-game background behaviours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    #[serde(default = "default_auto_eat_interval_secs")]
    pub auto_eat_interval_secs: u64,

    /// Auto-eat only runs when food is at or below this value (out of 20)
    #[serde(default = "default_auto_eat_food_threshold")]
    pub auto_eat_food_threshold: u32,

    /// Players closer than this many blocks count as nearby
    #[serde(default = "default_threat_radius")]
    pub threat_radius: f64,
}

// Default values
fn default_web_gui_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_gui_port() -> u16 {
    8080
}

fn default_profiles_file() -> String {
    "profiles.toml".to_string()
}

fn default_log_capacity() -> usize {
    500
}

fn default_true() -> bool {
    true
}

fn default_auto_eat_interval_secs() -> u64 {
    5
}

fn default_auto_eat_food_threshold() -> u32 {
    14
}

fn default_threat_radius() -> f64 {
    30.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_gui_host: default_web_gui_host(),
            web_gui_port: default_web_gui_port(),
            web_gui_password: None,
            profiles_file: default_profiles_file(),
            log_capacity: default_log_capacity(),
            enable_console_input: true,
            bot: BotSettings::default(),
        }
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            auto_eat_interval_secs: default_auto_eat_interval_secs(),
            auto_eat_food_threshold: default_auto_eat_food_threshold(),
            threat_radius: default_threat_radius(),
        }
    }
}

impl Config {
    /// Returns the dashboard password only if it is non-empty.
    pub fn active_password(&self) -> Option<&str> {
        self.web_gui_password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.web_gui_host, self.web_gui_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.web_gui_port, 8080);
        assert_eq!(config.bot.auto_eat_interval_secs, 5);
        assert_eq!(config.bot.auto_eat_food_threshold, 14);
        assert_eq!(config.bot.threat_radius, 30.0);
        assert!(config.active_password().is_none());
    }

    #[test]
    fn test_partial_bot_table() {
        let config: Config = toml::from_str(
            r#"
            web_gui_password = ""
            [bot]
            threat_radius = 16.0
            "#,
        )
        .unwrap();
        assert_eq!(config.bot.threat_radius, 16.0);
        assert_eq!(config.bot.auto_eat_interval_secs, 5);
        assert!(config.active_password().is_none());
    }
}
