use crate::listener::SessionListener;
use crate::types::message::Message;
use imcore::protocol::UnreadFrame;

impl SessionListener {
    pub(crate) fn handle_unread(&self, frame: UnreadFrame) {
        self.session.advance_notify_time(frame.notif_time);

        for tuple in frame.convs {
            let message = Message::new(&tuple.cid, tuple.from, tuple.timestamp, -1)
                .with_id(tuple.mid)
                .with_content(tuple.data)
                .with_updated_at(tuple.patch_timestamp);
            self.session
                .conversations()
                .get_or_create(&tuple.cid)
                .on_unread(message, tuple.unread);
        }
    }
}
