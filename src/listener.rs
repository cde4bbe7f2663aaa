//! Protocol listener for one session.
//!
//! Inbound frames are handed to [`SessionListener::handle_frame`] serially, in
//! arrival order. The per-frame logic lives in `crate::handlers`; this file
//! holds the shared state, the transport lifecycle hooks and the small
//! helpers every handler uses to resolve operations and report failures.

use crate::depot::StaleMessageDepot;
use crate::receipt_cache::MessageReceiptCache;
use crate::send::PacketSink;
use crate::session::Session;
use crate::signature::{SignatureFactory, SignatureProvider};
use crate::store::traits::Backend;
use crate::types::events::{EventBus, OperationFailed, SessionPaused};
use crate::types::operation::{Operation, OperationKind};
use imcore::error::OperationError;
use imcore::protocol::{InboundFrame, OutboundPacket};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub struct SessionListener {
    pub(crate) session: Arc<Session>,
    pub(crate) sink: Arc<dyn PacketSink>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) depot: Arc<StaleMessageDepot>,
    pub(crate) receipts: Arc<MessageReceiptCache>,
    pub(crate) signatures: Arc<SignatureProvider>,
    pub(crate) events: Arc<EventBus>,
}

impl SessionListener {
    pub fn new(
        session: Arc<Session>,
        sink: Arc<dyn PacketSink>,
        backend: Arc<dyn Backend>,
        depot: Arc<StaleMessageDepot>,
        receipts: Arc<MessageReceiptCache>,
        signature_factory: Option<Arc<dyn SignatureFactory>>,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        let signatures = Arc::new(SignatureProvider::new(signature_factory, backend.clone()));
        Arc::new(Self {
            session,
            sink,
            backend,
            depot,
            receipts,
            signatures,
            events,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn peer_id(&self) -> &str {
        self.session.peer_id()
    }

    /// Dispatches one inbound frame to its handler.
    pub async fn handle_frame(self: &Arc<Self>, frame: InboundFrame) {
        debug!(target: "Session/Recv", "<-- {} frame for {}", frame.kind(), self.peer_id());
        match frame {
            InboundFrame::Session { op, i, body } => self.handle_session_command(op, i, body).await,
            InboundFrame::Direct(direct) => self.handle_direct(direct).await,
            InboundFrame::Ack { i, body } => self.handle_ack(i, body).await,
            InboundFrame::Error { i, body } => self.handle_error(i, body).await,
            InboundFrame::Rcp(receipt) => self.handle_delivery_receipt(receipt),
            InboundFrame::Read(receipt) => self.handle_read_receipt(receipt),
            InboundFrame::Unread(unread) => self.handle_unread(unread),
            InboundFrame::Patch { modify, i, body } => self.handle_patch(modify, i, body),
            InboundFrame::Conv { op, i, body } => self.handle_conversation_command(op, i, body),
            InboundFrame::Logs { i, logs } => self.handle_logs(i, logs),
        }
    }

    /// The transport came up. Re-authenticates a session that was, or wants
    /// to be, open.
    pub async fn on_transport_open(self: &Arc<Self>) {
        if !self.session.wants_open() {
            debug!(target: "Session/Open", "Transport open, {} not logged in", self.peer_id());
            return;
        }
        info!(target: "Session/Open", "Transport open, sending session open for {}", self.peer_id());
        self.authenticate().await;
    }

    /// The transport went away. Pauses the session and fails everything in
    /// flight with [`OperationError::ConnectionLost`].
    pub fn on_transport_close(&self) {
        if !self.session.mark_paused() {
            debug!(target: "Session", "{} already paused", self.peer_id());
            return;
        }
        info!(target: "Session", "Session {} paused", self.peer_id());
        let _ = self.events.session_paused.send(Arc::new(SessionPaused {
            peer_id: self.peer_id().to_string(),
        }));

        let mut reported = HashSet::new();
        for message in self.session.pending().drain() {
            reported.insert(message.request_id);
            if message.conversation_id.is_empty() {
                continue;
            }
            self.emit_failure(
                Some(message.conversation_id),
                Some(message.request_id),
                OperationKind::ConversationSendMessage,
                OperationError::ConnectionLost,
            );
        }

        // A send has both a pending message and an operation; it is reported once.
        for op in self.session.operations().drain() {
            if reported.contains(&op.request_id) {
                continue;
            }
            self.emit_failure(
                op.conversation_id,
                Some(op.request_id),
                op.kind,
                OperationError::ConnectionLost,
            );
        }
        self.session.replace_open_request(None);
    }

    /// Removes the operation for `request_id`, logging a desync if it is absent.
    pub(crate) fn resolve_operation(&self, request_id: i32) -> Option<Operation> {
        let op = self.session.operations().poll(request_id);
        if op.is_none() {
            warn!(
                target: "Session/Operations",
                "No in-flight operation for request id {request_id} on {}",
                self.peer_id()
            );
        }
        op
    }

    pub(crate) fn emit_failure(
        &self,
        conversation_id: Option<String>,
        request_id: Option<i32>,
        operation: OperationKind,
        error: OperationError,
    ) {
        // Session-scoped failures have no conversation observer.
        let conversation_id = conversation_id.filter(|_| operation.is_conversation_scoped());
        debug!(
            target: "Session/Operations",
            "{operation} (request {request_id:?}) failed for {}: {error}",
            self.peer_id()
        );
        let _ = self.events.operation_failed.send(Arc::new(OperationFailed {
            peer_id: self.peer_id().to_string(),
            conversation_id,
            request_id,
            operation,
            error,
        }));
    }

    /// Sends a packet the protocol does not correlate with a response.
    pub(crate) async fn send_unsolicited(&self, packet: OutboundPacket) {
        if let Err(e) = self.sink.send_packet(&packet).await {
            warn!(target: "Session/Send", "Failed to send packet for {}: {e}", self.peer_id());
        }
    }
}
