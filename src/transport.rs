pub use imsession_tokio_transport::{
    TokioWebSocketTransportFactory, Transport, TransportEvent, TransportFactory,
};

pub mod mock {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// A transport that records every frame it is asked to send.
    #[derive(Default)]
    pub struct MockTransport {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_frame(&self, frame: &[u8]) -> Result<(), anyhow::Error> {
            self.sent
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(frame.to_vec());
            Ok(())
        }

        async fn disconnect(&self) {}
    }

    /// A factory handing out one [`MockTransport`] per connect, plus the
    /// sender side of its event channel so tests can script the server.
    #[derive(Default)]
    pub struct MockTransportFactory {
        connections: Mutex<Vec<(Arc<MockTransport>, mpsc::Sender<TransportEvent>)>>,
    }

    impl MockTransportFactory {
        pub fn new() -> Self {
            Self::default()
        }

        /// The most recent connection made through this factory.
        pub fn last_connection(&self) -> Option<(Arc<MockTransport>, mpsc::Sender<TransportEvent>)> {
            self.connections
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .last()
                .cloned()
        }

        pub fn connection_count(&self) -> usize {
            self.connections.lock().unwrap_or_else(|e| e.into_inner()).len()
        }
    }

    /// Wraps an encoded frame for [`TransportEvent::FrameReceived`].
    pub fn frame_event(data: Vec<u8>) -> TransportEvent {
        TransportEvent::FrameReceived(Bytes::from(data))
    }

    #[async_trait]
    impl TransportFactory for MockTransportFactory {
        async fn create_transport(
            &self,
        ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
            let (tx, rx) = mpsc::channel(32);
            let transport = Arc::new(MockTransport::new());
            self.connections
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((transport.clone(), tx));
            Ok((transport, rx))
        }
    }
}
