//! Bot profile store
//!
//! Profiles describe which server the bot joins and how. They are persisted
//! as a TOML file next to `config.toml` and looked up by id when the bot is
//! started from the dashboard.

use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::types::{AuthMode, SessionConfig};

const DEFAULT_JAVA_VERSION: &str = "1.20.1";
const DEFAULT_BEDROCK_VERSION: &str = "1.19.50";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid profile: {0}")]
    Invalid(String),
    #[error("profile {0} not found")]
    NotFound(u32),
    #[error("failed to persist profiles: {0}")]
    Persist(#[from] anyhow::Error),
}

/// A stored bot profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: u32,
    pub name: String,
    pub server_ip: String,
    pub server_port: u16,
    pub username: String,
    pub auth_type: AuthMode,
    #[serde(default)]
    pub version: Option<String>,
    /// Player the bot obeys; stored for the dashboard only
    #[serde(default)]
    pub master_name: String,
    #[serde(default)]
    pub is_bedrock: bool,
    #[serde(default)]
    pub is_auto_farm: bool,
    #[serde(default)]
    pub is_auto_defense: bool,
    #[serde(default)]
    pub is_auto_trade: bool,
}

impl Profile {
    /// Resolve the session parameters the bot manager starts with.
    ///
    /// Bedrock profiles always use bedrock auth; a missing version falls back
    /// to the per-edition default.
    pub fn session_config(&self) -> SessionConfig {
        let version = self
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                if self.is_bedrock {
                    DEFAULT_BEDROCK_VERSION.to_string()
                } else {
                    DEFAULT_JAVA_VERSION.to_string()
                }
            });

        SessionConfig {
            host: self.server_ip.clone(),
            port: self.server_port,
            username: self.username.clone(),
            version,
            auth: if self.is_bedrock { AuthMode::Bedrock } else { self.auth_type },
            is_bedrock: self.is_bedrock,
        }
    }
}

/// Profile fields accepted from the dashboard
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_server_ip")]
    pub server_ip: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_auth_type")]
    pub auth_type: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub master_name: String,
    #[serde(default)]
    pub is_bedrock: Option<bool>,
    #[serde(default)]
    pub is_auto_farm: bool,
    #[serde(default)]
    pub is_auto_defense: bool,
    #[serde(default)]
    pub is_auto_trade: bool,
}

fn default_name() -> String {
    "Default Profile".to_string()
}

fn default_server_ip() -> String {
    "localhost".to_string()
}

fn default_server_port() -> u16 {
    25565
}

fn default_username() -> String {
    "AnarchyBot".to_string()
}

fn default_auth_type() -> String {
    "offline".to_string()
}

impl Default for ProfileInput {
    fn default() -> Self {
        Self {
            id: None,
            name: default_name(),
            server_ip: default_server_ip(),
            server_port: default_server_port(),
            username: default_username(),
            auth_type: default_auth_type(),
            version: None,
            master_name: String::new(),
            is_bedrock: None,
            is_auto_farm: false,
            is_auto_defense: false,
            is_auto_trade: false,
        }
    }
}

impl ProfileInput {
    /// Validate the input and turn it into a profile with the given id
    pub fn into_profile(self, id: u32) -> Result<Profile, ProfileError> {
        let server_ip = self.server_ip.trim().to_string();
        if server_ip.is_empty() {
            return Err(ProfileError::Invalid("serverIp must not be empty".to_string()));
        }

        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(ProfileError::Invalid("username must not be empty".to_string()));
        }

        if self.server_port == 0 {
            return Err(ProfileError::Invalid("serverPort must be between 1 and 65535".to_string()));
        }

        let auth_type: AuthMode = self.auth_type.parse().map_err(ProfileError::Invalid)?;

        Ok(Profile {
            id,
            name: self.name,
            server_ip,
            server_port: self.server_port,
            username,
            auth_type,
            version: self.version.filter(|v| !v.trim().is_empty()),
            master_name: self.master_name,
            is_bedrock: self.is_bedrock.unwrap_or(false),
            is_auto_farm: self.is_auto_farm,
            is_auto_defense: self.is_auto_defense,
            is_auto_trade: self.is_auto_trade,
        })
    }
}

/// Where the bot manager's session configuration comes from
pub trait ProfileStore: Send + Sync {
    /// Profile by id, or the default (first) profile when `id` is `None`
    fn get_config(&self, id: Option<u32>) -> Option<Profile>;

    fn list(&self) -> Vec<Profile>;

    /// Update the profile named by `input.id` (or the default profile) or
    /// create it when it does not exist yet
    fn upsert(&self, input: ProfileInput) -> Result<Profile, ProfileError>;

    /// Return the default profile, creating it when the store is empty
    fn ensure_default(&self) -> Result<Profile, ProfileError> {
        match self.get_config(None) {
            Some(profile) => Ok(profile),
            None => self.upsert(ProfileInput::default()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: Vec<Profile>,
}

/// TOML-file-backed profile store
pub struct FileProfileStore {
    path: Option<PathBuf>,
    profiles: RwLock<Vec<Profile>>,
}

impl FileProfileStore {
    /// Open the store at `path`, loading existing profiles if the file exists
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let profiles = if path.exists() {
            let contents = fs::read_to_string(&path).context("Failed to read profiles file")?;
            let file: ProfileFile = toml::from_str(&contents).context("Failed to parse profiles file")?;
            info!("Loaded {} profile(s) from {:?}", file.profiles.len(), path);
            file.profiles
        } else {
            Vec::new()
        };

        Ok(Self {
            path: Some(path),
            profiles: RwLock::new(profiles),
        })
    }

    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            profiles: RwLock::new(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    fn persist(&self, profiles: &[Profile]) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create profiles directory")?;
        }

        let file = ProfileFile {
            profiles: profiles.to_vec(),
        };
        let contents = toml::to_string_pretty(&file).context("Failed to serialize profiles")?;
        fs::write(path, contents).context("Failed to write profiles file")?;
        Ok(())
    }
}

impl ProfileStore for FileProfileStore {
    fn get_config(&self, id: Option<u32>) -> Option<Profile> {
        let profiles = self.profiles.read();
        match id {
            Some(id) => profiles.iter().find(|p| p.id == id).cloned(),
            None => profiles.iter().min_by_key(|p| p.id).cloned(),
        }
    }

    fn list(&self) -> Vec<Profile> {
        let mut profiles = self.profiles.read().clone();
        profiles.sort_by_key(|p| p.id);
        profiles
    }

    fn upsert(&self, input: ProfileInput) -> Result<Profile, ProfileError> {
        let mut profiles = self.profiles.write();

        let target_id = match input.id {
            Some(id) if profiles.iter().any(|p| p.id == id) => Some(id),
            Some(id) => return Err(ProfileError::NotFound(id)),
            None => profiles.iter().map(|p| p.id).min(),
        };

        // Written to disk first; memory only changes once the file is saved
        let mut next = profiles.clone();
        let (profile, created) = match target_id {
            Some(id) => {
                let updated = input.into_profile(id)?;
                if let Some(existing) = next.iter_mut().find(|p| p.id == id) {
                    *existing = updated.clone();
                }
                (updated, false)
            }
            None => {
                let id = next.iter().map(|p| p.id).max().unwrap_or(0) + 1;
                let new_profile = input.into_profile(id)?;
                next.push(new_profile.clone());
                (new_profile, true)
            }
        };

        self.persist(&next)?;
        *profiles = next;

        if created {
            info!("Created profile {} ({})", profile.id, profile.name);
        } else {
            info!("Updated profile {} ({})", profile.id, profile.name);
        }
        Ok(profile)
    }
}
