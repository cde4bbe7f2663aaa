/// Tokio-based WebSocket transport implementation for imsession
///
/// This crate provides a concrete implementation of the Transport trait
/// using tokio-tungstenite. Each WebSocket message carries exactly one
/// encoded protocol frame, so no extra length framing is applied.
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// An event produced by the transport layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport has successfully connected.
    Connected,
    /// A frame has been received from the server.
    FrameReceived(Bytes),
    /// The connection was lost.
    Disconnected,
}

/// Represents an active network connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one encoded frame to the server.
    async fn send_frame(&self, frame: &[u8]) -> Result<(), anyhow::Error>;

    /// Closes the connection.
    async fn disconnect(&self);
}

/// A factory responsible for creating new transport instances.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Creates a new transport and returns it, along with a stream of events.
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error>;
}

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

const FRAME_MAX_SIZE: usize = 2 << 23;
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Tokio-based WebSocket transport
pub struct TokioWebSocketTransport {
    ws_sink: Mutex<Option<WsSink>>,
    is_connected: AtomicBool,
}

impl TokioWebSocketTransport {
    fn new(sink: WsSink) -> Self {
        Self {
            ws_sink: Mutex::new(Some(sink)),
            is_connected: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Transport for TokioWebSocketTransport {
    async fn send_frame(&self, frame: &[u8]) -> Result<(), anyhow::Error> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Socket is closed"))?;

        if frame.len() >= FRAME_MAX_SIZE {
            return Err(anyhow::anyhow!(
                "Frame is too large (max: {}, got: {})",
                FRAME_MAX_SIZE,
                frame.len()
            ));
        }

        debug!(target: "Transport", "--> Sending frame: {} bytes", frame.len());
        sink.send(Message::binary(frame.to_vec()))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send error: {}", e))?;
        Ok(())
    }

    async fn disconnect(&self) {
        if self.is_connected.swap(false, Ordering::SeqCst) {
            if let Some(mut sink) = self.ws_sink.lock().await.take() {
                if let Err(e) = sink.close().await {
                    debug!(target: "Transport", "Error while closing websocket: {e}");
                }
            }
        }
    }
}

/// Factory for creating Tokio WebSocket transports against a fixed URL.
pub struct TokioWebSocketTransportFactory {
    url: String,
}

impl TokioWebSocketTransportFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransportFactory for TokioWebSocketTransportFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        info!(target: "Transport", "Dialing {}", self.url);
        let (client, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect failed: {}", e))?;

        let (sink, stream) = client.split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let transport = Arc::new(TokioWebSocketTransport::new(sink));

        // Connected must be queued before the read pump can report anything.
        let _ = event_tx.send(TransportEvent::Connected).await;
        tokio::task::spawn(read_pump(stream, event_tx));

        Ok((transport, event_rx))
    }
}

async fn read_pump(mut stream: WsStream, event_tx: mpsc::Sender<TransportEvent>) {
    loop {
        match stream.next().await {
            Some(Ok(msg)) => {
                if msg.is_binary() || msg.is_text() {
                    let data = msg.into_data();
                    trace!(target: "Transport", "<-- Received frame: {} bytes", data.len());
                    if event_tx
                        .send(TransportEvent::FrameReceived(data))
                        .await
                        .is_err()
                    {
                        warn!(target: "Transport", "Event receiver dropped, closing read pump");
                        break;
                    }
                } else if msg.is_close() {
                    trace!(target: "Transport", "Received close frame");
                    break;
                }
            }
            Some(Err(e)) => {
                error!(target: "Transport", "Error reading from websocket: {e}");
                break;
            }
            None => {
                trace!(target: "Transport", "Websocket stream ended");
                break;
            }
        }
    }

    let _ = event_tx.send(TransportEvent::Disconnected).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_frames_flow_both_ways_and_close_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::binary(b"hello".to_vec())).await.unwrap();
            let echoed = ws.next().await.unwrap().unwrap();
            ws.close(None).await.unwrap();
            echoed.into_data()
        });

        let factory = TokioWebSocketTransportFactory::new(format!("ws://{addr}"));
        let (transport, mut events) = factory.create_transport().await.unwrap();

        assert!(matches!(events.recv().await, Some(TransportEvent::Connected)));
        match events.recv().await {
            Some(TransportEvent::FrameReceived(data)) => assert_eq!(&data[..], b"hello"),
            other => panic!("expected a frame, got {other:?}"),
        }

        transport.send_frame(b"world").await.unwrap();
        assert_eq!(&server.await.unwrap()[..], b"world");

        loop {
            match events.recv().await {
                Some(TransportEvent::Disconnected) | None => break,
                Some(_) => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_send_after_disconnect_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let factory = TokioWebSocketTransportFactory::new(format!("ws://{addr}"));
        let (transport, _events) = factory.create_transport().await.unwrap();
        transport.disconnect().await;
        assert!(transport.send_frame(b"late").await.is_err());
    }
}
