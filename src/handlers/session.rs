//! Session open/close handling and the two authentication paths.

use crate::listener::SessionListener;
use crate::signature::{SignatureError, SignaturePolicy};
use crate::types::events::{
    ClosedByServer, OnlineQueryResult, SessionClosed, SessionOpened, SessionResumed,
};
use crate::types::operation::{Operation, OperationKind};
use crate::types::signature::{SessionToken, Signature};
use imcore::error::OperationError;
use imcore::protocol::{OutboundPacket, SessionFrame, SessionOp};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

impl SessionListener {
    /// Automatic login after the transport comes up: the cached session
    /// token if there is a valid one, a freshly computed signature otherwise.
    pub(crate) async fn authenticate(self: &Arc<Self>) {
        if !self.session.try_begin_open() {
            return;
        }

        let token = match self.backend.get_session_token(self.peer_id()).await {
            Ok(token) => token,
            Err(e) => {
                warn!(target: "Session/Open", "Failed to read session token for {}: {e}", self.peer_id());
                None
            }
        };

        match token {
            Some(token) => {
                let session = self.session.clone();
                let _guard = scopeguard::guard((), move |_| session.end_open());
                self.open_with_token(token).await;
            }
            None => {
                // The guard moves into the spawned task.
                self.spawn_signature_open(SignaturePolicy::AUTO_LOGIN, true);
            }
        }
    }

    /// Explicit login requested by the application. Reads and refreshes the
    /// signature cache and does not flag the open as a reconnection.
    pub fn open(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.prepare_open();
        if !self.session.try_begin_open() {
            return None;
        }
        Some(self.spawn_signature_open(SignaturePolicy::CACHED, false))
    }

    /// Marks the session as wanting to be open, so the next transport open
    /// logs it in.
    pub fn prepare_open(&self) {
        self.session.clear_paused();
        self.session.set_resuming(true);
    }

    async fn open_with_token(&self, token: SessionToken) {
        debug!(target: "Session/Open", "Opening {} with cached session token", self.peer_id());
        let packet = OutboundPacket::Open {
            peer_id: self.peer_id().to_string(),
            st: Some(token.token),
            signature: None,
            tag: None,
            last_notify_time: self.session.last_notify_time(),
            last_patch_time: self.session.last_patch_time(),
            reconnect: true,
            i: None,
        };
        self.send_unsolicited(packet).await;
    }

    /// Computes the signature off the inbound context, then sends OPEN.
    /// The caller must hold the session's open guard; the task releases it.
    fn spawn_signature_open(self: &Arc<Self>, policy: SignaturePolicy, reconnect: bool) -> JoinHandle<()> {
        let fetch = self
            .signatures
            .spawn_fetch(self.peer_id().to_string(), policy);
        let listener = self.clone();
        tokio::spawn(async move {
            let session = listener.session.clone();
            let _guard = scopeguard::guard((), move |_| session.end_open());
            let result = match fetch.await {
                Ok(result) => result,
                Err(e) => Err(SignatureError::Task(e.to_string())),
            };
            match result {
                Ok(signature) => listener.open_with_signature(signature, reconnect).await,
                Err(e) => listener.on_signature_failure(e),
            }
        })
    }

    async fn open_with_signature(&self, signature: Option<Signature>, reconnect: bool) {
        let operations = self.session.operations();
        let request_id = self.session.next_request_id();
        if let Some(previous) = self.session.replace_open_request(Some(request_id)) {
            if operations.poll(previous).is_some() {
                debug!(target: "Session/Open", "Open request {previous} superseded by {request_id}");
            }
        }
        if let Err(e) = operations.offer(Operation::new(
            OperationKind::ClientOpen,
            self.peer_id(),
            None,
            request_id,
        )) {
            warn!(target: "Session/Open", "Could not track open request: {e}");
        }

        let tag = self.session.tag().map(str::to_string);
        if let Some(tag) = &tag {
            if let Err(e) = self.backend.put_session_tag(self.peer_id(), tag).await {
                warn!(target: "Session/Open", "Failed to cache session tag for {}: {e}", self.peer_id());
            }
        }

        debug!(target: "Session/Open", "Opening {} with signature, request {request_id}", self.peer_id());
        let packet = OutboundPacket::Open {
            peer_id: self.peer_id().to_string(),
            st: None,
            signature,
            tag,
            last_notify_time: self.session.last_notify_time(),
            last_patch_time: self.session.last_patch_time(),
            reconnect,
            i: Some(request_id),
        };
        if let Err(e) = self.sink.send_packet(&packet).await {
            warn!(target: "Session/Open", "Failed to send open for {}: {e}", self.peer_id());
            operations.poll(request_id);
            self.session.clear_open_request(request_id);
            self.emit_failure(
                None,
                Some(request_id),
                OperationKind::ClientOpen,
                OperationError::ConnectionLost,
            );
        }
    }

    fn on_signature_failure(&self, error: SignatureError) {
        warn!(target: "Session/Open", "Signature for {} failed, not opening: {error}", self.peer_id());
        self.session.set_opened(false);
        self.session.set_resuming(false);
        self.emit_failure(
            None,
            None,
            OperationKind::ClientOpen,
            OperationError::Signature(error.to_string()),
        );
    }

    pub(crate) async fn handle_session_command(
        &self,
        op: SessionOp,
        request_id: Option<i32>,
        frame: SessionFrame,
    ) {
        match op {
            SessionOp::Opened => self.on_session_opened(request_id, frame).await,
            SessionOp::Closed => self.on_session_closed(request_id, frame).await,
            SessionOp::QueryResult => {
                if let Some(id) = request_id {
                    self.resolve_operation(id);
                }
                let _ = self.events.online_query.send(Arc::new(OnlineQueryResult {
                    peer_id: self.peer_id().to_string(),
                    online_peer_ids: frame.online_peer_ids,
                    request_id,
                }));
            }
        }
    }

    async fn on_session_opened(&self, request_id: Option<i32>, frame: SessionFrame) {
        self.session.set_opened(true);
        self.session.set_resuming(false);

        if self.session.clear_paused() {
            info!(target: "Session/Open", "Session {} resumed", self.peer_id());
            let _ = self.events.session_resumed.send(Arc::new(SessionResumed {
                peer_id: self.peer_id().to_string(),
            }));
            return;
        }

        if let Some(id) = request_id {
            self.resolve_operation(id);
            self.session.clear_open_request(id);
        }
        info!(target: "Session/Open", "Session {} opened", self.peer_id());
        let _ = self.events.session_opened.send(Arc::new(SessionOpened {
            peer_id: self.peer_id().to_string(),
            request_id,
        }));

        if let (Some(st), Some(ttl)) = (frame.st, frame.st_ttl) {
            if let Err(e) = self
                .backend
                .put_session_token(self.peer_id(), SessionToken::with_ttl(st, ttl))
                .await
            {
                warn!(target: "Session/Open", "Failed to cache session token for {}: {e}", self.peer_id());
            }
        }
    }

    async fn on_session_closed(&self, request_id: Option<i32>, frame: SessionFrame) {
        self.session.set_opened(false);
        self.session.set_resuming(false);

        if let Some(code) = frame.code {
            info!(target: "Session", "Session {} closed by server with code {code}", self.peer_id());
            let _ = self.events.closed_by_server.send(Arc::new(ClosedByServer {
                peer_id: self.peer_id().to_string(),
                code,
            }));
            return;
        }

        if let Some(id) = request_id {
            self.resolve_operation(id);
        }
        // A logged out session must not log itself back in.
        if let Err(e) = self.backend.remove_session_token(self.peer_id()).await {
            warn!(target: "Session", "Failed to drop session token for {}: {e}", self.peer_id());
        }
        self.receipts.clear_peer(self.peer_id());
        info!(target: "Session", "Session {} closed", self.peer_id());
        let _ = self.events.session_closed.send(Arc::new(SessionClosed {
            peer_id: self.peer_id().to_string(),
            request_id,
        }));
    }
}
