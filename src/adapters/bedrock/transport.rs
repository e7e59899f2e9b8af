use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rust_raknet::{RaknetSocket, Reliability};
use tracing::debug;

/// Datagram transport carrying Bedrock game frames
#[async_trait]
pub trait BedrockTransport: Send + Sync {
    async fn send(&self, frame: &[u8]) -> Result<()>;

    async fn recv(&self) -> Result<Vec<u8>>;

    async fn close(&self);
}

pub struct RaknetTransport {
    socket: RaknetSocket,
}

impl RaknetTransport {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let address = tokio::net::lookup_host((host, port))
            .await
            .with_context(|| format!("Failed to resolve {host}:{port}"))?
            .next()
            .ok_or_else(|| anyhow!("No address found for {host}:{port}"))?;

        debug!("Opening RakNet connection to {}", address);
        let socket = RaknetSocket::connect(&address)
            .await
            .map_err(|e| anyhow!("RakNet connection to {address} failed: {e:?}"))?;

        Ok(Self { socket })
    }
}

#[async_trait]
impl BedrockTransport for RaknetTransport {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        self.socket
            .send(frame, Reliability::ReliableOrdered)
            .await
            .map_err(|e| anyhow!("RakNet send failed: {e:?}"))
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        self.socket
            .recv()
            .await
            .map_err(|e| anyhow!("RakNet connection closed: {e:?}"))
    }

    async fn close(&self) {
        if let Err(e) = self.socket.close().await {
            debug!("RakNet close returned {:?}", e);
        }
    }
}
