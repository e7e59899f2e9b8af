use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Last-known bot state as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub online: bool,
    pub health: f32,
    pub food: f32,
    pub position: Option<Position>,
    pub nearby_players: u32,
    pub inventory_full: bool,
}

impl Default for BotStatus {
    fn default() -> Self {
        Self {
            online: false,
            health: 20.0,
            food: 20.0,
            position: None,
            nearby_players: 0,
            inventory_full: false,
        }
    }
}

/// Kind of a dashboard log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Warning,
    Error,
    Chat,
}

/// Authentication mode requested by a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Offline,
    Microsoft,
    Bedrock,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Offline => "offline",
            AuthMode::Microsoft => "microsoft",
            AuthMode::Bedrock => "bedrock",
        }
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "offline" => Ok(AuthMode::Offline),
            "microsoft" => Ok(AuthMode::Microsoft),
            "bedrock" => Ok(AuthMode::Bedrock),
            other => Err(format!("unknown auth type: {}", other)),
        }
    }
}

/// Which wire protocol family a session speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    Java,
    Bedrock,
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::Java => write!(f, "Java"),
            ProtocolVariant::Bedrock => write!(f, "Bedrock"),
        }
    }
}

/// Connection lifecycle of the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Online,
    Error,
}

/// Everything needed to open one protocol session.
///
/// Immutable for the lifetime of the session it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub version: String,
    pub auth: AuthMode,
    pub is_bedrock: bool,
}

impl SessionConfig {
    pub fn variant(&self) -> ProtocolVariant {
        if self.is_bedrock {
            ProtocolVariant::Bedrock
        } else {
            ProtocolVariant::Java
        }
    }
}

/// An item held in the bot's inventory
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    /// Item name in snake_case, e.g. `cooked_beef`
    pub name: String,
    pub count: u32,
    /// Slot index within the player's inventory menu
    pub slot: usize,
    /// Whether the slot is on the hotbar and can be selected directly
    pub hotbar: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_value(BotStatus::default()).unwrap();
        assert_eq!(json["online"], false);
        assert_eq!(json["nearbyPlayers"], 0);
        assert_eq!(json["inventoryFull"], false);
        assert!(json["position"].is_null());
    }

    #[test]
    fn test_auth_mode_from_str() {
        assert_eq!("Microsoft".parse::<AuthMode>(), Ok(AuthMode::Microsoft));
        assert_eq!("offline".parse::<AuthMode>(), Ok(AuthMode::Offline));
        assert!("mojang".parse::<AuthMode>().is_err());
    }
}
