use crate::listener::SessionListener;
use crate::types::events::ServerError;
use crate::types::operation::OperationKind;
use imcore::error::{CODE_SESSION_SIGNATURE_FAILURE, CODE_SESSION_TOKEN_FAILURE, OperationError};
use imcore::protocol::ErrorFrame;
use log::{info, warn};
use std::sync::Arc;

impl SessionListener {
    pub(crate) async fn handle_error(self: &Arc<Self>, request_id: Option<i32>, frame: ErrorFrame) {
        let error = OperationError::server(frame.code, frame.app_code, frame.reason.as_deref());
        match request_id {
            Some(request_id) => self.on_request_error(request_id, error),
            None => self.on_session_error(frame.code, error).await,
        }
    }

    fn on_request_error(&self, request_id: i32, error: OperationError) {
        let Some(op) = self.resolve_operation(request_id) else {
            return;
        };
        if op.kind == OperationKind::ClientOpen {
            self.session.set_opened(false);
            self.session.set_resuming(false);
            self.session.clear_open_request(request_id);
        }
        self.emit_failure(op.conversation_id, Some(request_id), op.kind, error);
    }

    /// Errors not tied to a request. Two codes are remediated locally; every
    /// code is surfaced as a server error.
    async fn on_session_error(self: &Arc<Self>, code: i32, error: OperationError) {
        warn!(target: "Session/Error", "Session error for {}: {error}", self.peer_id());
        let _ = self.events.server_error.send(Arc::new(ServerError {
            peer_id: self.peer_id().to_string(),
            error,
        }));

        match code {
            CODE_SESSION_SIGNATURE_FAILURE => {
                info!(target: "Session/Error", "Evicting cached tag and signature for {}", self.peer_id());
                if let Err(e) = self.backend.remove_session_tag(self.peer_id()).await {
                    warn!(target: "Session/Error", "Failed to evict session tag: {e}");
                }
                if let Err(e) = self.backend.remove_signature(self.peer_id()).await {
                    warn!(target: "Session/Error", "Failed to evict cached signature: {e}");
                }
            }
            CODE_SESSION_TOKEN_FAILURE => {
                info!(target: "Session/Error", "Session token for {} rejected, logging in again", self.peer_id());
                if let Err(e) = self.backend.remove_session_token(self.peer_id()).await {
                    warn!(target: "Session/Error", "Failed to evict session token: {e}");
                }
                self.on_transport_open().await;
            }
            _ => {}
        }
    }
}
