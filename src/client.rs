use crate::config::ClientConfig;
use crate::conversation::ConversationRegistry;
use crate::depot::StaleMessageDepot;
use crate::listener::SessionListener;
use crate::operation_cache::OperationCacheError;
use crate::receipt_cache::MessageReceiptCache;
use crate::send::TransportSink;
use crate::session::Session;
use crate::signature::SignatureFactory;
use crate::store::error::StoreError;
use crate::store::traits::Backend;
use crate::transport::{TransportEvent, TransportFactory};
use crate::types::events::EventBus;
use crate::types::operation::OperationKind;
use imcore::protocol::{ProtocolError, decode_frame};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,
    #[error("client is already connected")]
    AlreadyConnected,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("operation error: {0}")]
    Operation(#[from] OperationCacheError),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Drives one session over a reconnecting transport.
pub struct Client {
    config: ClientConfig,
    session: Arc<Session>,
    listener: Arc<SessionListener>,
    events: Arc<EventBus>,
    sink: Arc<TransportSink>,
    transport_factory: Arc<dyn TransportFactory>,
    transport_events: Mutex<Option<mpsc::Receiver<TransportEvent>>>,

    is_running: AtomicBool,
    is_connected: AtomicBool,
    is_connecting: AtomicBool,
    expected_disconnect: AtomicBool,
    pub enable_auto_reconnect: AtomicBool,
    pub auto_reconnect_errors: AtomicU32,
    shutdown_notifier: Notify,
}

impl Client {
    pub async fn new(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        receipts: Arc<MessageReceiptCache>,
        transport_factory: Arc<dyn TransportFactory>,
        signature_factory: Option<Arc<dyn SignatureFactory>>,
    ) -> Result<Arc<Self>, ClientError> {
        let events = Arc::new(EventBus::with_capacity(config.event_channel_capacity));
        let conversations = Arc::new(ConversationRegistry::new(events.clone()));
        let session = Arc::new(Session::new(
            config.peer_id.clone(),
            config.tag.clone(),
            conversations,
        ));
        let depot = Arc::new(
            StaleMessageDepot::load(&config.peer_id, backend.clone(), config.depot_capacity)
                .await?,
        );
        let sink = Arc::new(TransportSink::new());
        let listener = SessionListener::new(
            session.clone(),
            sink.clone(),
            backend,
            depot,
            receipts,
            signature_factory,
            events.clone(),
        );

        Ok(Arc::new(Self {
            enable_auto_reconnect: AtomicBool::new(config.enable_auto_reconnect),
            config,
            session,
            listener,
            events,
            sink,
            transport_factory,
            transport_events: Mutex::new(None),
            is_running: AtomicBool::new(false),
            is_connected: AtomicBool::new(false),
            is_connecting: AtomicBool::new(false),
            expected_disconnect: AtomicBool::new(false),
            auto_reconnect_errors: AtomicU32::new(0),
            shutdown_notifier: Notify::new(),
        }))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn listener(&self) -> &Arc<SessionListener> {
        &self.listener
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Logs the session in. Without a live connection the login happens as
    /// soon as the transport comes up.
    pub fn open(&self) -> Option<JoinHandle<()>> {
        if self.is_connected() {
            self.listener.open()
        } else {
            info!(target: "Client", "Not connected yet, {} will open on connect", self.session.peer_id());
            self.listener.prepare_open();
            None
        }
    }

    pub async fn close(&self) -> Result<i32, ClientError> {
        self.listener.close().await
    }

    pub async fn query_online(&self, peer_ids: Vec<String>) -> Result<i32, ClientError> {
        self.listener.query_online(peer_ids).await
    }

    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        receipt_requested: bool,
        transient: bool,
    ) -> Result<i32, ClientError> {
        self.listener
            .send_message(conversation_id, content, receipt_requested, transient)
            .await
    }

    pub async fn conversation_command(
        &self,
        kind: OperationKind,
        conversation_id: Option<String>,
        members: Vec<String>,
        attributes: Option<serde_json::Value>,
    ) -> Result<i32, ClientError> {
        self.listener
            .conversation_command(kind, conversation_id, members, attributes)
            .await
    }

    pub async fn query_messages(
        &self,
        conversation_id: &str,
        before_timestamp: Option<i64>,
        before_message_id: Option<String>,
        limit: Option<u32>,
    ) -> Result<i32, ClientError> {
        self.listener
            .query_messages(conversation_id, before_timestamp, before_message_id, limit)
            .await
    }

    pub async fn query_patch_time(&self) -> Result<i32, ClientError> {
        self.listener.query_patch_time().await
    }

    pub async fn run(self: &Arc<Self>) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!(target: "Client", "Client `run` method called while already running.");
            return;
        }
        while self.is_running.load(Ordering::Relaxed) {
            self.expected_disconnect.store(false, Ordering::Relaxed);

            if let Err(e) = self.connect().await {
                error!(target: "Client", "Failed to connect: {e}, will retry...");
            } else {
                self.auto_reconnect_errors.store(0, Ordering::Relaxed);
                if self.read_frames_loop().await.is_err() {
                    warn!(target: "Client", "Frame loop exited with an error. Will attempt to reconnect if enabled.");
                } else if self.expected_disconnect.load(Ordering::Relaxed) {
                    debug!(target: "Client", "Frame loop exited gracefully (expected disconnect).");
                } else {
                    info!(target: "Client", "Frame loop exited gracefully.");
                }
            }

            if !self.is_running.load(Ordering::Relaxed) {
                break;
            }
            if !self.enable_auto_reconnect.load(Ordering::Relaxed) {
                info!(target: "Client", "Auto-reconnect disabled, shutting down.");
                self.is_running.store(false, Ordering::Relaxed);
                break;
            }

            let error_count = self.auto_reconnect_errors.fetch_add(1, Ordering::SeqCst);
            let delay = Duration::from_secs(self.config.reconnect_delay_secs(error_count));
            info!(
                target: "Client",
                "Will attempt to reconnect in {:?} (attempt {})",
                delay,
                error_count + 1
            );
            sleep(delay).await;
        }
        info!(target: "Client", "Client run loop has shut down.");
    }

    pub async fn connect(self: &Arc<Self>) -> Result<(), anyhow::Error> {
        if self.is_connecting.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyConnected.into());
        }

        let _guard = scopeguard::guard((), |_| {
            self.is_connecting.store(false, Ordering::Relaxed);
        });

        if self.is_connected() {
            return Err(ClientError::AlreadyConnected.into());
        }

        let (transport, transport_events) = self.transport_factory.create_transport().await?;
        self.sink.attach(transport).await;
        *self.transport_events.lock().await = Some(transport_events);
        self.is_connected.store(true, Ordering::SeqCst);
        info!(target: "Client", "Transport established for {}", self.session.peer_id());
        Ok(())
    }

    pub async fn disconnect(&self) {
        info!(target: "Client", "Disconnecting client intentionally.");
        self.expected_disconnect.store(true, Ordering::Relaxed);
        self.is_running.store(false, Ordering::Relaxed);
        self.shutdown_notifier.notify_waiters();

        if let Some(transport) = self.sink.detach().await {
            transport.disconnect().await;
        }
        self.cleanup_connection_state().await;
    }

    async fn cleanup_connection_state(&self) {
        let was_connected = self.is_connected.swap(false, Ordering::SeqCst);
        self.sink.detach().await;
        *self.transport_events.lock().await = None;
        if was_connected {
            self.listener.on_transport_close();
        }
    }

    /// Feeds transport events to the listener, one at a time, until the
    /// connection ends.
    async fn read_frames_loop(self: &Arc<Self>) -> Result<(), anyhow::Error> {
        info!(target: "Client", "Starting frame processing loop...");

        let mut rx_guard = self.transport_events.lock().await;
        let mut transport_events = rx_guard
            .take()
            .ok_or_else(|| anyhow::anyhow!("Cannot start frame loop: not connected"))?;
        drop(rx_guard);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_notifier.notified() => {
                    info!(target: "Client", "Shutdown signaled in frame loop. Exiting frame loop.");
                    return Ok(());
                },
                event = transport_events.recv() => {
                    match event {
                        Some(TransportEvent::Connected) => {
                            debug!(target: "Client", "Transport connected event received");
                            self.listener.on_transport_open().await;
                        }
                        Some(TransportEvent::FrameReceived(data)) => match decode_frame(&data) {
                            Ok(frame) => self.listener.handle_frame(frame).await,
                            Err(e) => warn!(target: "Client", "Dropping undecodable frame: {e}"),
                        },
                        Some(TransportEvent::Disconnected) | None => {
                            self.cleanup_connection_state().await;
                            if self.expected_disconnect.load(Ordering::Relaxed) {
                                info!(target: "Client", "Transport disconnected as expected.");
                                return Ok(());
                            }
                            info!(target: "Client", "Transport disconnected unexpectedly.");
                            return Err(anyhow::anyhow!("Transport disconnected unexpectedly"));
                        }
                    }
                }
            }
            if !self.is_running.load(Ordering::Relaxed) {
                return Ok(());
            }
        }
    }
}
