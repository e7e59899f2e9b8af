use super::codec::{PacketReader, PacketWriter, ProtocolError};

pub mod id {
    pub const LOGIN: u32 = 0x01;
    pub const PLAY_STATUS: u32 = 0x02;
    pub const SERVER_TO_CLIENT_HANDSHAKE: u32 = 0x03;
    pub const CLIENT_TO_SERVER_HANDSHAKE: u32 = 0x04;
    pub const DISCONNECT: u32 = 0x05;
    pub const RESOURCE_PACKS_INFO: u32 = 0x06;
    pub const RESOURCE_PACK_STACK: u32 = 0x07;
    pub const RESOURCE_PACK_CLIENT_RESPONSE: u32 = 0x08;
    pub const TEXT: u32 = 0x09;
    pub const START_GAME: u32 = 0x0B;
    pub const REQUEST_CHUNK_RADIUS: u32 = 0x45;
    pub const SET_LOCAL_PLAYER_AS_INITIALIZED: u32 = 0x71;
    pub const NETWORK_SETTINGS: u32 = 0x8F;
    pub const REQUEST_NETWORK_SETTINGS: u32 = 0xC1;
}

/// Protocol numbers at which packet layouts changed
pub mod since {
    pub const CHUNK_RADIUS_MAX: i32 = 582;
    pub const DISCONNECT_REASON: i32 = 622;
    pub const COMPRESSION_HEADER: i32 = 649;
    pub const TEXT_FILTERED_MESSAGE: i32 = 685;
    pub const CERTIFICATE_LOGIN: i32 = 818;
}

const VERSIONS: &[(&str, i32)] = &[
    ("1.19.50", 560),
    ("1.19.60", 567),
    ("1.19.70", 575),
    ("1.19.80", 582),
    ("1.20.0", 589),
    ("1.20.10", 594),
    ("1.20.30", 618),
    ("1.20.40", 622),
    ("1.20.50", 630),
    ("1.20.60", 649),
    ("1.20.70", 662),
    ("1.20.80", 671),
    ("1.21.0", 685),
    ("1.21.2", 686),
    ("1.21.20", 712),
    ("1.21.30", 729),
    ("1.21.40", 748),
    ("1.21.50", 766),
    ("1.21.60", 776),
    ("1.21.70", 786),
    ("1.21.80", 800),
    ("1.21.90", 818),
];

/// Protocol number for a game version string, if known
pub fn protocol_for_version(version: &str) -> Option<i32> {
    VERSIONS
        .iter()
        .find(|(name, _)| *name == version.trim())
        .map(|(_, protocol)| *protocol)
}

/// Newest version this client speaks
pub fn latest_version() -> (&'static str, i32) {
    VERSIONS[VERSIONS.len() - 1]
}

pub fn request_network_settings(protocol: i32) -> Vec<u8> {
    let mut w = PacketWriter::with_id(id::REQUEST_NETWORK_SETTINGS);
    w.write_i32_be(protocol);
    w.into_inner()
}

pub fn login(protocol: i32, chain: &str, client_data: &str) -> Vec<u8> {
    let mut request = PacketWriter::new();
    request.write_u32_le(chain.len() as u32);
    request.write_bytes(chain.as_bytes());
    request.write_u32_le(client_data.len() as u32);
    request.write_bytes(client_data.as_bytes());
    let request = request.into_inner();

    let mut w = PacketWriter::with_id(id::LOGIN);
    w.write_i32_be(protocol);
    w.write_var_u32(request.len() as u32);
    w.write_bytes(&request);
    w.into_inner()
}

pub fn client_to_server_handshake() -> Vec<u8> {
    PacketWriter::with_id(id::CLIENT_TO_SERVER_HANDSHAKE).into_inner()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePackResponse {
    HaveAllPacks = 3,
    Completed = 4,
}

pub fn resource_pack_client_response(response: ResourcePackResponse) -> Vec<u8> {
    let mut w = PacketWriter::with_id(id::RESOURCE_PACK_CLIENT_RESPONSE);
    w.write_u8(response as u8);
    w.write_u16_le(0);
    w.into_inner()
}

pub fn request_chunk_radius(protocol: i32, radius: i32) -> Vec<u8> {
    let mut w = PacketWriter::with_id(id::REQUEST_CHUNK_RADIUS);
    w.write_var_i32(radius);
    if protocol >= since::CHUNK_RADIUS_MAX {
        w.write_u8(radius.clamp(0, u8::MAX as i32) as u8);
    }
    w.into_inner()
}

pub fn set_local_player_as_initialized(runtime_id: u64) -> Vec<u8> {
    let mut w = PacketWriter::with_id(id::SET_LOCAL_PLAYER_AS_INITIALIZED);
    w.write_var_u64(runtime_id);
    w.into_inner()
}

/// Outgoing chat line
pub fn text_chat(protocol: i32, source: &str, message: &str, xuid: &str) -> Vec<u8> {
    let mut w = PacketWriter::with_id(id::TEXT);
    w.write_u8(TEXT_CHAT);
    w.write_bool(false);
    w.write_string(source);
    w.write_string(message);
    w.write_string(xuid);
    w.write_string("");
    if protocol >= since::TEXT_FILTERED_MESSAGE {
        w.write_string("");
    }
    w.into_inner()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSettings {
    pub threshold: u16,
    pub algorithm: u16,
}

impl NetworkSettings {
    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let threshold = r.read_u16_le()?;
        let algorithm = r.read_u16_le()?;
        Ok(Self { threshold, algorithm })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    LoginSuccess,
    PlayerSpawn,
    Failed(i32),
}

impl PlayStatus {
    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        Ok(match r.read_i32_be()? {
            0 => PlayStatus::LoginSuccess,
            3 => PlayStatus::PlayerSpawn,
            other => PlayStatus::Failed(other),
        })
    }

    pub fn describe(&self) -> String {
        match self {
            PlayStatus::LoginSuccess => "login success".to_string(),
            PlayStatus::PlayerSpawn => "player spawn".to_string(),
            PlayStatus::Failed(1) => "outdated client".to_string(),
            PlayStatus::Failed(2) => "outdated server".to_string(),
            PlayStatus::Failed(4) => "invalid tenant".to_string(),
            PlayStatus::Failed(5) => "edition mismatch (vanilla)".to_string(),
            PlayStatus::Failed(6) => "edition mismatch (education)".to_string(),
            PlayStatus::Failed(7) => "server full".to_string(),
            PlayStatus::Failed(code) => format!("login failed (status {code})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub hide_screen: bool,
    pub message: Option<String>,
}

impl Disconnect {
    pub fn decode(r: &mut PacketReader<'_>, protocol: i32) -> Result<Self, ProtocolError> {
        if protocol >= since::DISCONNECT_REASON {
            r.read_var_i32()?;
        }
        let hide_screen = r.read_bool()?;
        let message = if hide_screen || r.remaining() == 0 {
            None
        } else {
            Some(r.read_string()?)
        };
        Ok(Self { hide_screen, message })
    }
}

const TEXT_CHAT: u8 = 1;
const TEXT_TRANSLATION: u8 = 2;
const TEXT_POPUP: u8 = 3;
const TEXT_JUKEBOX_POPUP: u8 = 4;
const TEXT_WHISPER: u8 = 7;
const TEXT_ANNOUNCEMENT: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub kind: u8,
    pub source: Option<String>,
    pub message: String,
}

impl Text {
    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let kind = r.read_u8()?;
        r.read_bool()?;
        let (source, message) = match kind {
            TEXT_CHAT | TEXT_WHISPER | TEXT_ANNOUNCEMENT => {
                let source = r.read_string()?;
                (Some(source), r.read_string()?)
            }
            TEXT_TRANSLATION | TEXT_POPUP | TEXT_JUKEBOX_POPUP => {
                let message = r.read_string()?;
                let count = r.read_var_u32()?;
                for _ in 0..count {
                    r.read_string()?;
                }
                (None, message)
            }
            _ => (None, r.read_string()?),
        };
        Ok(Self {
            kind,
            source: source.filter(|s| !s.is_empty()),
            message,
        })
    }

    /// Player-authored lines keep their speaker; everything else is a
    /// system message
    pub fn speaker(&self) -> Option<&str> {
        match self.kind {
            TEXT_CHAT | TEXT_WHISPER | TEXT_ANNOUNCEMENT => self.source.as_deref(),
            _ => None,
        }
    }
}

/// Only the runtime entity id is needed from StartGame
pub fn decode_start_game_runtime_id(r: &mut PacketReader<'_>) -> Result<u64, ProtocolError> {
    r.read_var_i64()?;
    r.read_var_u64()
}

pub fn decode_handshake_token(r: &mut PacketReader<'_>) -> Result<String, ProtocolError> {
    r.read_string()
}
