//! Outbound packet path.
//!
//! The listener and the request API only ever talk to a [`PacketSink`]; the
//! client plugs in a [`TransportSink`] bound to the live connection, tests
//! plug in a recorder.

use crate::client::ClientError;
use crate::transport::Transport;
use async_trait::async_trait;
use imcore::protocol::{OutboundPacket, encode_packet};
use log::trace;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn send_packet(&self, packet: &OutboundPacket) -> Result<(), ClientError>;
}

/// Encodes packets and writes them to whichever transport is attached.
#[derive(Default)]
pub struct TransportSink {
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl TransportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, transport: Arc<dyn Transport>) {
        *self.transport.lock().await = Some(transport);
    }

    pub async fn detach(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().await.take()
    }

    pub async fn is_attached(&self) -> bool {
        self.transport.lock().await.is_some()
    }
}

#[async_trait]
impl PacketSink for TransportSink {
    async fn send_packet(&self, packet: &OutboundPacket) -> Result<(), ClientError> {
        let transport = self
            .transport
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)?;
        let data = encode_packet(packet)?;
        trace!(target: "Client/Send", "--> {}", String::from_utf8_lossy(&data));
        transport
            .send_frame(&data)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
