use crate::listener::SessionListener;
use crate::types::events::{QueryPayload, QueryResult};
use crate::types::message::Message;
use imcore::protocol::PatchFrame;
use log::warn;
use std::sync::Arc;

impl SessionListener {
    /// Pushed edits and recalls when `modify` is set, otherwise the answer to
    /// a last-patch-time query.
    pub(crate) fn handle_patch(&self, modify: bool, request_id: Option<i32>, frame: PatchFrame) {
        if modify {
            let latest = frame
                .patches
                .iter()
                .map(|item| item.patch_timestamp)
                .max()
                .unwrap_or_default();
            self.session.advance_patch_time(latest);

            for item in frame.patches {
                let message = Message::new(&item.cid, item.from, item.timestamp, 0)
                    .with_id(item.mid)
                    .with_content(item.data)
                    .with_updated_at(item.patch_timestamp);
                self.session
                    .conversations()
                    .get_or_create(&item.cid)
                    .on_message_updated(message, item.recall);
            }
            return;
        }

        self.session.advance_patch_time(frame.last_patch_time);
        let Some(request_id) = request_id else {
            warn!(target: "Session/Patch", "Patch time result without request id");
            return;
        };
        let Some(op) = self.resolve_operation(request_id) else {
            return;
        };
        let _ = self.events.query_result.send(Arc::new(QueryResult {
            peer_id: self.peer_id().to_string(),
            request_id,
            operation: op.kind,
            payload: QueryPayload::LastPatchTime(frame.last_patch_time),
        }));
    }
}
