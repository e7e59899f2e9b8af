use tracing::{debug, info, warn};

use super::codec::{
    decode_batch, encode_batch, split_packet, BatchConfig, CompressionAlgorithm, ProtocolError, FRAME_HEADER,
};
use super::crypto::{derive_key, HandshakeParams, PacketCipher};
use super::login::ClientIdentity;
use super::packets::{self, id, since, Disconnect, NetworkSettings, PlayStatus, ResourcePackResponse, Text};
use crate::bot::BotEvent;

const CHUNK_RADIUS: i32 = 8;

/// Outcome of handling one inbound packet
#[derive(Debug, Default)]
pub struct Step {
    pub replies: Vec<Vec<u8>>,
    pub events: Vec<BotEvent>,
}

impl Step {
    fn reply(packet: Vec<u8>) -> Self {
        Self {
            replies: vec![packet],
            events: Vec::new(),
        }
    }

    fn event(event: BotEvent) -> Self {
        Self {
            replies: Vec::new(),
            events: vec![event],
        }
    }
}

/// Client-side login state and framing for one Bedrock session
pub struct BedrockConnection {
    protocol: i32,
    version: String,
    host: String,
    port: u16,
    identity: ClientIdentity,
    batch: BatchConfig,
    cipher: Option<PacketCipher>,
    runtime_id: Option<u64>,
}

impl BedrockConnection {
    pub fn new(identity: ClientIdentity, host: &str, port: u16, version: &str) -> Self {
        let (version, protocol) = match packets::protocol_for_version(version) {
            Some(protocol) => (version.trim().to_string(), protocol),
            None => {
                let (latest, protocol) = packets::latest_version();
                warn!("Unknown Bedrock version {}, using {}", version, latest);
                (latest.to_string(), protocol)
            }
        };

        Self {
            protocol,
            version,
            host: host.to_string(),
            port,
            identity,
            batch: BatchConfig {
                algorithm_header: protocol >= since::COMPRESSION_HEADER,
                ..BatchConfig::default()
            },
            cipher: None,
            runtime_id: None,
        }
    }

    pub fn protocol(&self) -> i32 {
        self.protocol
    }

    /// First packet of every session
    pub fn hello(&self) -> Vec<u8> {
        packets::request_network_settings(self.protocol)
    }

    pub fn chat(&self, message: &str) -> Vec<u8> {
        packets::text_chat(self.protocol, "", message, "")
    }

    /// Frame packets for the wire
    pub fn encode(&mut self, packets: &[Vec<u8>]) -> Result<Vec<u8>, ProtocolError> {
        let mut body = encode_batch(packets, &self.batch)?;
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.encrypt(&mut body);
        }
        let mut frame = Vec::with_capacity(body.len() + 1);
        frame.push(FRAME_HEADER);
        frame.extend(body);
        Ok(frame)
    }

    /// Unframe a wire datagram into game packets
    pub fn decode(&mut self, frame: &[u8]) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let (&header, body) = frame.split_first().ok_or(ProtocolError::UnexpectedEof)?;
        if header != FRAME_HEADER {
            return Err(ProtocolError::BadFrame(header));
        }
        let mut body = body.to_vec();
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.decrypt(&mut body)?;
        }
        decode_batch(&body, &self.batch)
    }

    /// Advance the login sequence and translate gameplay packets.
    ///
    /// Replies must be sent in order; each one is encoded after the state
    /// change that produced it, so a handshake reply is already encrypted.
    pub fn handle(&mut self, packet: &[u8]) -> Result<Step, ProtocolError> {
        let (packet_id, mut r) = split_packet(packet)?;
        match packet_id {
            id::NETWORK_SETTINGS => {
                let settings = NetworkSettings::decode(&mut r)?;
                debug!(
                    "Network settings: threshold {}, algorithm {}",
                    settings.threshold, settings.algorithm
                );
                self.batch.compression_enabled = true;
                self.batch.threshold = settings.threshold as usize;
                self.batch.algorithm = CompressionAlgorithm::from_u16(settings.algorithm);

                let chain = self.identity.chain(self.protocol)?;
                let client_data = self.identity.client_data(&self.host, self.port, &self.version)?;
                Ok(Step::reply(packets::login(self.protocol, &chain, &client_data)))
            }
            id::SERVER_TO_CLIENT_HANDSHAKE => {
                let token = packets::decode_handshake_token(&mut r)?;
                let params = HandshakeParams::from_jwt(&token)?;
                self.cipher = Some(PacketCipher::new(derive_key(self.identity.secret(), &params)));
                debug!("Encryption enabled");
                Ok(Step::reply(packets::client_to_server_handshake()))
            }
            id::PLAY_STATUS => match PlayStatus::decode(&mut r)? {
                PlayStatus::LoginSuccess => {
                    info!("Bedrock login accepted for {}", self.identity.username());
                    Ok(Step::event(BotEvent::SessionEstablished))
                }
                PlayStatus::PlayerSpawn => match self.runtime_id {
                    Some(runtime_id) => Ok(Step::reply(packets::set_local_player_as_initialized(runtime_id))),
                    None => Ok(Step::default()),
                },
                failed => Ok(Step::event(BotEvent::SessionRejected {
                    reason: failed.describe(),
                })),
            },
            id::RESOURCE_PACKS_INFO => Ok(Step::reply(packets::resource_pack_client_response(
                ResourcePackResponse::HaveAllPacks,
            ))),
            id::RESOURCE_PACK_STACK => Ok(Step::reply(packets::resource_pack_client_response(
                ResourcePackResponse::Completed,
            ))),
            id::START_GAME => {
                self.runtime_id = Some(packets::decode_start_game_runtime_id(&mut r)?);
                Ok(Step::reply(packets::request_chunk_radius(self.protocol, CHUNK_RADIUS)))
            }
            id::TEXT => {
                let text = Text::decode(&mut r)?;
                Ok(Step::event(BotEvent::ChatReceived {
                    speaker: text.speaker().map(str::to_string),
                    text: text.message,
                }))
            }
            id::DISCONNECT => {
                let disconnect = Disconnect::decode(&mut r, self.protocol)?;
                Ok(Step::event(BotEvent::SessionRejected {
                    reason: disconnect.message.unwrap_or_else(|| "Disconnected by server".to_string()),
                }))
            }
            _ => Ok(Step::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bedrock::codec::PacketWriter;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;
    use p384::pkcs8::EncodePublicKey;
    use p384::SecretKey;
    use rand::rngs::OsRng;

    fn connection(version: &str) -> BedrockConnection {
        let identity = ClientIdentity::generate("Steve").unwrap();
        BedrockConnection::new(identity, "localhost", 19132, version)
    }

    fn network_settings(threshold: u16, algorithm: u16) -> Vec<u8> {
        let mut w = PacketWriter::with_id(id::NETWORK_SETTINGS);
        w.write_u16_le(threshold);
        w.write_u16_le(algorithm);
        w.write_bool(false);
        w.write_u8(0);
        w.into_inner()
    }

    fn first_id(packet: &[u8]) -> u32 {
        split_packet(packet).unwrap().0
    }

    #[test]
    fn test_unknown_version_uses_latest() {
        let conn = connection("9.9.9");
        assert_eq!(conn.protocol(), packets::latest_version().1);
    }

    #[test]
    fn test_network_settings_enables_compression_and_logs_in() {
        let mut conn = connection("1.19.50");
        let step = conn.handle(&network_settings(1, 0)).unwrap();
        assert_eq!(step.replies.len(), 1);
        assert_eq!(first_id(&step.replies[0]), id::LOGIN);

        let frame = conn.encode(&step.replies).unwrap();
        assert_eq!(frame[0], FRAME_HEADER);
        let server_view = BatchConfig {
            compression_enabled: true,
            algorithm: CompressionAlgorithm::Zlib,
            threshold: 1,
            algorithm_header: false,
        };
        let decoded = decode_batch(&frame[1..], &server_view).unwrap();
        assert_eq!(first_id(&decoded[0]), id::LOGIN);
    }

    #[test]
    fn test_resource_packs_are_accepted() {
        let mut conn = connection("1.20.0");
        let info = PacketWriter::with_id(id::RESOURCE_PACKS_INFO).into_inner();
        let step = conn.handle(&info).unwrap();
        let (_, mut r) = split_packet(&step.replies[0]).unwrap();
        assert_eq!(r.read_u8().unwrap(), 3);

        let stack = PacketWriter::with_id(id::RESOURCE_PACK_STACK).into_inner();
        let step = conn.handle(&stack).unwrap();
        let (_, mut r) = split_packet(&step.replies[0]).unwrap();
        assert_eq!(r.read_u8().unwrap(), 4);
    }

    #[test]
    fn test_play_status_events() {
        let mut conn = connection("1.20.0");
        let status = |code: i32| {
            let mut w = PacketWriter::with_id(id::PLAY_STATUS);
            w.write_i32_be(code);
            w.into_inner()
        };

        let step = conn.handle(&status(0)).unwrap();
        assert_eq!(step.events, vec![BotEvent::SessionEstablished]);

        let step = conn.handle(&status(7)).unwrap();
        assert_eq!(
            step.events,
            vec![BotEvent::SessionRejected {
                reason: "server full".to_string()
            }]
        );
    }

    #[test]
    fn test_spawn_initializes_local_player() {
        let mut conn = connection("1.20.0");
        let mut w = PacketWriter::with_id(id::START_GAME);
        w.write_var_u64(2); // zigzag unique id 1
        w.write_var_u64(42);
        let step = conn.handle(&w.into_inner()).unwrap();
        assert_eq!(first_id(&step.replies[0]), id::REQUEST_CHUNK_RADIUS);

        let mut w = PacketWriter::with_id(id::PLAY_STATUS);
        w.write_i32_be(3);
        let step = conn.handle(&w.into_inner()).unwrap();
        let (packet_id, mut r) = split_packet(&step.replies[0]).unwrap();
        assert_eq!(packet_id, id::SET_LOCAL_PLAYER_AS_INITIALIZED);
        assert_eq!(r.read_var_u64().unwrap(), 42);
    }

    #[test]
    fn test_text_becomes_chat_event() {
        let mut conn = connection("1.20.0");
        let mut w = PacketWriter::with_id(id::TEXT);
        w.write_u8(1);
        w.write_bool(false);
        w.write_string("Alex");
        w.write_string("hi bot");
        let step = conn.handle(&w.into_inner()).unwrap();
        assert_eq!(
            step.events,
            vec![BotEvent::ChatReceived {
                speaker: Some("Alex".to_string()),
                text: "hi bot".to_string()
            }]
        );
    }

    #[test]
    fn test_kick_becomes_rejection() {
        let mut conn = connection("1.20.50");
        let mut w = PacketWriter::with_id(id::DISCONNECT);
        w.write_var_i32(0);
        w.write_bool(false);
        w.write_string("You are banned");
        let step = conn.handle(&w.into_inner()).unwrap();
        assert_eq!(
            step.events,
            vec![BotEvent::SessionRejected {
                reason: "You are banned".to_string()
            }]
        );
    }

    #[test]
    fn test_handshake_switches_on_encryption() {
        let mut conn = connection("1.20.0");
        let server = SecretKey::random(&mut OsRng);
        let der = server.public_key().to_public_key_der().unwrap();
        let header = format!(r#"{{"alg":"ES384","x5u":"{}"}}"#, STANDARD.encode(der.as_bytes()));
        let claims = format!(r#"{{"salt":"{}"}}"#, STANDARD.encode(b"pepper"));
        let token = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );

        let mut w = PacketWriter::with_id(id::SERVER_TO_CLIENT_HANDSHAKE);
        w.write_string(&token);
        let step = conn.handle(&w.into_inner()).unwrap();
        assert_eq!(first_id(&step.replies[0]), id::CLIENT_TO_SERVER_HANDSHAKE);

        let frame = conn.encode(&step.replies).unwrap();
        let plain = encode_batch(&step.replies, &BatchConfig::default()).unwrap();
        assert_eq!(frame.len(), 1 + plain.len() + 8);
        assert_ne!(frame[1..1 + plain.len()], plain[..]);
    }

    #[test]
    fn test_bad_frame_header() {
        let mut conn = connection("1.20.0");
        assert!(matches!(conn.decode(&[0x00, 0x01]), Err(ProtocolError::BadFrame(0x00))));
    }

    #[test]
    fn test_unknown_packets_are_ignored() {
        let mut conn = connection("1.20.0");
        let step = conn.handle(&PacketWriter::with_id(0x3A).into_inner()).unwrap();
        assert!(step.replies.is_empty());
        assert!(step.events.is_empty());
    }
}
