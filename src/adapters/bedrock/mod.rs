//! Bedrock edition adapter
//!
//! Offline login over RakNet: network settings, self-signed login chain,
//! optional encryption handshake, resource pack negotiation, spawn.

pub mod codec;
pub mod connection;
pub mod crypto;
pub mod login;
pub mod packets;
pub mod transport;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{ProtocolAdapter, SessionHandle};
use crate::bot::events::EventSender;
use crate::bot::BotEvent;
use crate::types::{AuthMode, SessionConfig};

pub use codec::ProtocolError;
pub use connection::BedrockConnection;
use login::ClientIdentity;
use transport::{BedrockTransport, RaknetTransport};

#[derive(Debug, Default)]
pub struct BedrockAdapter;

impl BedrockAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProtocolAdapter for BedrockAdapter {
    async fn connect(&self, config: &SessionConfig, events: EventSender) -> Result<Box<dyn SessionHandle>> {
        if config.auth == AuthMode::Microsoft {
            bail!("Microsoft authentication is not supported for Bedrock sessions");
        }

        let identity = ClientIdentity::generate(&config.username)?;
        let connection = BedrockConnection::new(identity, &config.host, config.port, &config.version);
        let transport = RaknetTransport::connect(&config.host, config.port).await?;

        let session = BedrockSession::start(connection, Arc::new(transport), events).await?;
        Ok(Box::new(session))
    }
}

/// Live Bedrock session; a background task pumps inbound frames
pub struct BedrockSession {
    connection: Arc<Mutex<BedrockConnection>>,
    transport: Arc<dyn BedrockTransport>,
    closing: Arc<AtomicBool>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl BedrockSession {
    pub async fn start(
        connection: BedrockConnection,
        transport: Arc<dyn BedrockTransport>,
        events: EventSender,
    ) -> Result<Self> {
        let connection = Arc::new(Mutex::new(connection));
        {
            let mut conn = connection.lock().await;
            let hello = conn.hello();
            let frame = conn.encode(&[hello])?;
            transport.send(&frame).await?;
        }

        let closing = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            connection.clone(),
            transport.clone(),
            closing.clone(),
            events,
        ));

        Ok(Self {
            connection,
            transport,
            closing,
            reader: parking_lot::Mutex::new(Some(reader)),
        })
    }
}

#[async_trait]
impl SessionHandle for BedrockSession {
    async fn disconnect(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.transport.close().await;
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }

    async fn send_chat(&self, text: &str) -> Result<()> {
        // Held across the send so checksum counters follow wire order
        let mut conn = self.connection.lock().await;
        let packet = conn.chat(text);
        let frame = conn.encode(&[packet])?;
        self.transport.send(&frame).await
    }
}

async fn read_loop(
    connection: Arc<Mutex<BedrockConnection>>,
    transport: Arc<dyn BedrockTransport>,
    closing: Arc<AtomicBool>,
    events: EventSender,
) {
    loop {
        let frame = match transport.recv().await {
            Ok(frame) => frame,
            Err(e) => {
                if !closing.load(Ordering::SeqCst) {
                    debug!("Bedrock transport closed: {}", e);
                    let _ = events.send(BotEvent::SessionEnded { reason: e.to_string() });
                }
                break;
            }
        };

        if let Err(e) = process_frame(&connection, transport.as_ref(), &frame, &events).await {
            if !closing.load(Ordering::SeqCst) {
                error!("Bedrock session failed: {:#}", e);
                let _ = events.send(BotEvent::TransportError {
                    message: format!("{e:#}"),
                });
                transport.close().await;
            }
            break;
        }
    }
}

async fn process_frame(
    connection: &Mutex<BedrockConnection>,
    transport: &dyn BedrockTransport,
    frame: &[u8],
    events: &EventSender,
) -> Result<()> {
    let mut conn = connection.lock().await;
    for packet in conn.decode(frame)? {
        let step = conn.handle(&packet)?;
        for reply in step.replies {
            let out = conn.encode(&[reply])?;
            transport.send(&out).await?;
        }
        for event in step.events {
            if events.send(event).is_err() {
                warn!("Bedrock event dropped, no listener");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::codec::{encode_batch, split_packet, BatchConfig, PacketWriter, FRAME_HEADER};
    use super::packets::id;
    use super::*;
    use crate::bot::events::event_channel;
    use anyhow::anyhow;
    use tokio::sync::mpsc;

    /// In-memory transport driven by the test
    struct FakeTransport {
        inbound: Mutex<mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
        sent: parking_lot::Mutex<Vec<Vec<u8>>>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl BedrockTransport for FakeTransport {
        async fn send(&self, frame: &[u8]) -> Result<()> {
            self.sent.lock().push(frame.to_vec());
            Ok(())
        }

        async fn recv(&self) -> Result<Vec<u8>> {
            match self.inbound.lock().await.recv().await {
                Some(item) => item,
                None => Err(anyhow!("closed")),
            }
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn fake() -> (Arc<FakeTransport>, mpsc::UnboundedSender<Result<Vec<u8>>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport {
            inbound: Mutex::new(rx),
            sent: parking_lot::Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        (transport, tx)
    }

    fn connection() -> BedrockConnection {
        BedrockConnection::new(
            ClientIdentity::generate("Steve").unwrap(),
            "localhost",
            19132,
            "1.19.50",
        )
    }

    fn plain_frame(packet: Vec<u8>) -> Vec<u8> {
        let mut frame = vec![FRAME_HEADER];
        frame.extend(encode_batch(&[packet], &BatchConfig::default()).unwrap());
        frame
    }

    #[tokio::test]
    async fn test_start_sends_network_settings_request() {
        let (transport, _tx) = fake();
        let (events, _rx) = event_channel();
        let _session = BedrockSession::start(connection(), transport.clone(), events).await.unwrap();

        let sent = transport.sent.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0], FRAME_HEADER);
        let (packet_id, _) = split_packet(&sent[0][2..]).unwrap();
        assert_eq!(packet_id, id::REQUEST_NETWORK_SETTINGS);
    }

    #[tokio::test]
    async fn test_play_status_reaches_event_stream() {
        let (transport, tx) = fake();
        let (events, mut rx) = event_channel();
        let _session = BedrockSession::start(connection(), transport, events).await.unwrap();

        let mut w = PacketWriter::with_id(id::PLAY_STATUS);
        w.write_i32_be(0);
        tx.send(Ok(plain_frame(w.into_inner()))).unwrap();

        assert_eq!(rx.recv().await, Some(BotEvent::SessionEstablished));
    }

    #[tokio::test]
    async fn test_remote_close_ends_session() {
        let (transport, tx) = fake();
        let (events, mut rx) = event_channel();
        let _session = BedrockSession::start(connection(), transport, events).await.unwrap();

        tx.send(Err(anyhow!("connection lost"))).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(BotEvent::SessionEnded {
                reason: "connection lost".to_string()
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_garbage_frame_is_transport_error() {
        let (transport, tx) = fake();
        let (events, mut rx) = event_channel();
        let _session = BedrockSession::start(connection(), transport.clone(), events).await.unwrap();

        tx.send(Ok(vec![0x42, 0x00])).unwrap();
        match rx.recv().await {
            Some(BotEvent::TransportError { message }) => assert!(message.contains("0x42")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
        assert!(transport.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_manual_disconnect_is_silent() {
        let (transport, _tx) = fake();
        let (events, mut rx) = event_channel();
        let session = BedrockSession::start(connection(), transport.clone(), events).await.unwrap();

        session.disconnect().await;
        assert!(transport.closed.load(Ordering::SeqCst));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_microsoft_auth_is_refused() {
        let adapter = BedrockAdapter::new();
        let (events, _rx) = event_channel();
        let config = SessionConfig {
            host: "localhost".to_string(),
            port: 19132,
            username: "Steve".to_string(),
            version: "1.19.50".to_string(),
            auth: AuthMode::Microsoft,
            is_bedrock: true,
        };
        assert!(adapter.connect(&config, events).await.is_err());
    }
}
