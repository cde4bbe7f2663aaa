use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, mpsc};

use crate::client::ClientError;
use crate::conversation::ConversationRegistry;
use crate::depot::{DEFAULT_DEPOT_CAPACITY, StaleMessageDepot};
use crate::listener::SessionListener;
use crate::protocol::OutboundPacket;
use crate::receipt_cache::MessageReceiptCache;
use crate::send::PacketSink;
use crate::session::Session;
use crate::signature::{SignatureError, SignatureFactory};
use crate::store::memory::MemoryStore;
use crate::types::events::EventBus;
use crate::types::signature::Signature;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A packet sink that records every packet instead of sending it.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<OutboundPacket>,
    rx: Mutex<mpsc::UnboundedReceiver<OutboundPacket>>,
    fail_sends: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            fail_sends: AtomicBool::new(false),
        }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail as if the transport were gone.
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Waits for the next recorded packet.
    pub async fn next_packet(&self) -> Option<OutboundPacket> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.ok().flatten()
    }

    /// Packets recorded so far that nobody has taken yet.
    pub async fn drain(&self) -> Vec<OutboundPacket> {
        let mut rx = self.rx.lock().await;
        let mut packets = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            packets.push(packet);
        }
        packets
    }
}

#[async_trait]
impl PacketSink for RecordingSink {
    async fn send_packet(&self, packet: &OutboundPacket) -> Result<(), ClientError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        self.tx
            .send(packet.clone())
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

/// A signature factory that signs with a counter and records its calls.
#[derive(Default)]
pub struct CountingSignatureFactory {
    calls: AtomicUsize,
}

impl CountingSignatureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignatureFactory for CountingSignatureFactory {
    async fn create_signature(
        &self,
        peer_id: &str,
        watch_peer_ids: &[String],
    ) -> Result<Signature, SignatureError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Signature::new(
            format!("sig-{peer_id}-{n}"),
            n as i64,
            format!("nonce-{n}"),
            watch_peer_ids.to_vec(),
        ))
    }
}

/// A signature factory that always refuses.
pub struct RejectingSignatureFactory;

#[async_trait]
impl SignatureFactory for RejectingSignatureFactory {
    async fn create_signature(
        &self,
        _peer_id: &str,
        _watch_peer_ids: &[String],
    ) -> Result<Signature, SignatureError> {
        Err(SignatureError::Factory {
            code: 401,
            message: "signing refused".to_string(),
        })
    }
}

/// A listener wired to in-memory stores and a [`RecordingSink`].
pub struct TestHarness {
    pub listener: Arc<SessionListener>,
    pub session: Arc<Session>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<MemoryStore>,
    pub receipts: Arc<MessageReceiptCache>,
    pub events: Arc<EventBus>,
}

impl TestHarness {
    pub async fn new(peer_id: &str) -> Self {
        Self::with_factory(peer_id, Some(Arc::new(CountingSignatureFactory::new()))).await
    }

    pub async fn with_factory(
        peer_id: &str,
        factory: Option<Arc<dyn SignatureFactory>>,
    ) -> Self {
        Self::with_store(peer_id, factory, Arc::new(MemoryStore::new())).await
    }

    pub async fn with_store(
        peer_id: &str,
        factory: Option<Arc<dyn SignatureFactory>>,
        store: Arc<MemoryStore>,
    ) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let events = Arc::new(EventBus::new());
        let conversations = Arc::new(ConversationRegistry::new(events.clone()));
        let session = Arc::new(Session::new(peer_id, Some("test".to_string()), conversations));
        let depot = Arc::new(
            StaleMessageDepot::load(peer_id, store.clone(), DEFAULT_DEPOT_CAPACITY)
                .await
                .expect("in-memory depot should load"),
        );
        let sink = Arc::new(RecordingSink::new());
        let receipts = Arc::new(MessageReceiptCache::new());
        let listener = SessionListener::new(
            session.clone(),
            sink.clone(),
            store.clone(),
            depot,
            receipts.clone(),
            factory,
            events.clone(),
        );

        Self {
            listener,
            session,
            sink,
            store,
            receipts,
            events,
        }
    }
}

/// Waits for the next event on a bus channel.
pub async fn recv_event<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.ok()?.ok()
}

/// Takes every event already queued on a bus channel.
pub fn drain_events<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
