use crate::listener::SessionListener;
use crate::types::message::Message;
use imcore::protocol::{DirectFrame, OutboundPacket};
use log::debug;

impl SessionListener {
    /// Acks an inbound chat message, then surfaces it unless the depot has
    /// already seen its id.
    pub(crate) async fn handle_direct(&self, frame: DirectFrame) {
        let conversation_id = frame.cid.filter(|cid| !cid.trim().is_empty());

        if !frame.transient {
            let ack = match &conversation_id {
                Some(cid) => OutboundPacket::ConvAck {
                    peer_id: self.peer_id().to_string(),
                    cid: cid.clone(),
                    mid: frame.id.clone(),
                },
                None => OutboundPacket::SessionAck {
                    peer_id: self.peer_id().to_string(),
                    mid: Some(frame.id.clone()).filter(|id| !id.is_empty()),
                },
            };
            self.send_unsolicited(ack).await;
        }

        let is_new = self.depot.put_if_absent(&frame.id).await;
        let Some(conversation_id) = conversation_id else {
            return;
        };
        if !is_new {
            debug!(target: "Session/Message", "Dropping duplicate message {} in {conversation_id}", frame.id);
            return;
        }

        let message = Message::new(&conversation_id, frame.from_peer_id, frame.timestamp, -1)
            .with_id(frame.id)
            .with_content(frame.msg)
            .with_updated_at(frame.patch_timestamp);
        self.session
            .conversations()
            .get_or_create(&conversation_id)
            .on_message(message, frame.has_more, frame.transient);
    }
}
