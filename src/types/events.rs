use std::sync::Arc;
use tokio::sync::broadcast;
pub use imcore::types::events::*;

// Per-channel backlog before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

// One broadcast sender per (field, payload) pair.
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with one broadcast channel per event kind.
        ///
        /// Sends never block; a channel without subscribers drops the event.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
            }

            pub fn with_capacity(capacity: usize) -> Self {
                Self {
                    $(
                        $field: broadcast::channel(capacity.max(1)).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Session lifecycle
    (session_opened, Arc<SessionOpened>),
    (session_resumed, Arc<SessionResumed>),
    (session_paused, Arc<SessionPaused>),
    (session_closed, Arc<SessionClosed>),
    (closed_by_server, Arc<ClosedByServer>),

    // Request outcomes
    (online_query, Arc<OnlineQueryResult>),
    (query_result, Arc<QueryResult>),
    (operation_failed, Arc<OperationFailed>),
    (server_error, Arc<ServerError>),

    // Conversation callbacks
    (message, Arc<MessageReceived>),
    (message_sent, Arc<MessageSent>),
    (message_receipt, Arc<MessageReceipt>),
    (message_updated, Arc<MessageUpdated>),
    (unread, Arc<UnreadUpdate>),
    (watermark, Arc<WatermarkUpdate>),
    (conversation_command, Arc<ConversationCommandResult>),
    (history, Arc<HistoryResult>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
