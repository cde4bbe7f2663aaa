use imsession::error::OperationError;
use imsession::protocol::{
    AckFrame, DirectFrame, InboundFrame, OutboundPacket, PatchFrame, PatchItem, ReceiptFrame,
    SessionFrame, SessionOp, UnreadFrame, UnreadTuple,
};
use imsession::receipt_cache::ReceiptEntry;
use imsession::store::memory::MemoryStore;
use imsession::test_utils::{TestHarness, drain_events, recv_event};
use imsession::types::events::{QueryPayload, WatermarkKind};
use imsession::types::message::MessageStatus;
use imsession::types::operation::OperationKind;
use std::sync::Arc;

fn direct(id: &str, cid: Option<&str>, transient: bool) -> InboundFrame {
    InboundFrame::Direct(DirectFrame {
        id: id.to_string(),
        cid: cid.map(str::to_string),
        from_peer_id: "bob".to_string(),
        msg: format!("content of {id}"),
        timestamp: 1_000,
        transient,
        has_more: false,
        patch_timestamp: 0,
    })
}

fn patch_item(mid: &str, patch_timestamp: i64) -> PatchItem {
    PatchItem {
        cid: "c1".to_string(),
        mid: mid.to_string(),
        from: "bob".to_string(),
        data: "edited".to_string(),
        timestamp: 10,
        patch_timestamp,
        recall: false,
    }
}

#[tokio::test]
async fn test_duplicate_inbound_message_is_delivered_once() {
    let h = TestHarness::new("alice").await;
    let mut message_rx = h.events.message.subscribe();

    h.listener.handle_frame(direct("m1", Some("c1"), false)).await;
    h.listener.handle_frame(direct("m1", Some("c1"), false)).await;

    let delivered = drain_events(&mut message_rx);
    assert_eq!(delivered.len(), 1);
    let message = &delivered[0].message;
    assert_eq!(message.message_id.as_deref(), Some("m1"));
    assert_eq!(message.conversation_id, "c1");
    assert_eq!(message.from, "bob");
    assert_eq!(message.receipt_timestamp, -1);

    // Both copies are acknowledged, so the server stops replaying.
    let acks = h.sink.drain().await;
    assert_eq!(acks.len(), 2);
    assert!(acks.iter().all(|p| matches!(
        p,
        OutboundPacket::ConvAck { cid, mid, .. } if cid == "c1" && mid == "m1"
    )));
}

#[tokio::test]
async fn test_message_without_conversation_gets_session_ack_only() {
    let h = TestHarness::new("alice").await;
    let mut message_rx = h.events.message.subscribe();

    h.listener.handle_frame(direct("m9", None, false)).await;

    assert!(drain_events(&mut message_rx).is_empty());
    assert_eq!(
        h.sink.drain().await,
        vec![OutboundPacket::SessionAck {
            peer_id: "alice".into(),
            mid: Some("m9".into()),
        }]
    );
}

#[tokio::test]
async fn test_transient_message_is_not_acknowledged() {
    let h = TestHarness::new("alice").await;
    let mut message_rx = h.events.message.subscribe();

    h.listener.handle_frame(direct("t1", Some("c1"), true)).await;

    assert!(h.sink.drain().await.is_empty());
    let delivered = recv_event(&mut message_rx).await.unwrap();
    assert!(delivered.transient);
}

#[tokio::test]
async fn test_depot_survives_listener_restart() {
    let store = Arc::new(MemoryStore::new());
    {
        let h = TestHarness::with_store("alice", None, store.clone()).await;
        h.listener.handle_frame(direct("m1", Some("c1"), false)).await;
    }

    let h = TestHarness::with_store("alice", None, store).await;
    let mut message_rx = h.events.message.subscribe();
    h.listener.handle_frame(direct("m1", Some("c1"), false)).await;
    h.listener.handle_frame(direct("m2", Some("c1"), false)).await;

    let ids: Vec<_> = drain_events(&mut message_rx)
        .iter()
        .filter_map(|e| e.message.message_id.clone())
        .collect();
    assert_eq!(ids, vec!["m2".to_string()]);
}

#[tokio::test]
async fn test_ack_then_receipt_is_consumed_once() {
    let h = TestHarness::new("alice").await;
    let mut sent_rx = h.events.message_sent.subscribe();
    let mut receipt_rx = h.events.message_receipt.subscribe();
    let mut watermark_rx = h.events.watermark.subscribe();

    let request_id = h.listener.send_message("c1", "hello", true, false).await.unwrap();
    assert_eq!(h.session.pending().len(), 1);

    h.listener
        .handle_frame(InboundFrame::Ack {
            i: Some(request_id),
            body: AckFrame {
                uid: Some("srv-1".into()),
                t: 500,
                ..Default::default()
            },
        })
        .await;

    let sent = recv_event(&mut sent_rx).await.unwrap();
    assert_eq!(sent.request_id, request_id);
    assert_eq!(sent.message_id, "srv-1");
    assert_eq!(sent.timestamp, 500);
    assert!(h.session.pending().is_empty());
    assert!(h.session.operations().is_empty());
    assert!(h.session.server_ack_received() > 0);
    assert!(h.receipts.contains("alice", "srv-1"));

    let receipt = InboundFrame::Rcp(ReceiptFrame {
        id: "srv-1".into(),
        cid: Some("c1".into()),
        t: Some(600),
        read: None,
    });
    h.listener.handle_frame(receipt.clone()).await;
    h.listener.handle_frame(receipt).await;

    let receipts = drain_events(&mut receipt_rx);
    assert_eq!(receipts.len(), 1);
    let message = &receipts[0].message;
    assert_eq!(message.status, MessageStatus::Receipt);
    assert_eq!(message.content, "hello");
    assert_eq!(message.timestamp, 500);
    assert_eq!(message.receipt_timestamp, 600);
    assert!(!h.receipts.contains("alice", "srv-1"));

    let watermarks = drain_events(&mut watermark_rx);
    assert_eq!(watermarks.len(), 1);
    assert_eq!(watermarks[0].kind, WatermarkKind::DeliveredAt);
    assert_eq!(watermarks[0].timestamp, 600);
}

#[tokio::test]
async fn test_logout_forgets_outstanding_receipts() {
    let h = TestHarness::new("alice").await;
    h.receipts.add(
        "bob",
        ReceiptEntry {
            message_id: "bob-1".into(),
            timestamp: 1,
            content: "other session".into(),
            receipt_requested: true,
        },
    );

    for n in 0..5 {
        let request_id = h.listener.send_message("c1", "hello", true, false).await.unwrap();
        h.listener
            .handle_frame(InboundFrame::Ack {
                i: Some(request_id),
                body: AckFrame {
                    uid: Some(format!("srv-{n}")),
                    t: 500 + n,
                    ..Default::default()
                },
            })
            .await;
    }
    assert_eq!(h.receipts.len(), 6);

    let close_id = h.listener.close().await.unwrap();
    h.listener
        .handle_frame(InboundFrame::Session {
            op: SessionOp::Closed,
            i: Some(close_id),
            body: SessionFrame::default(),
        })
        .await;
    h.listener.on_transport_close();

    assert_eq!(h.receipts.len(), 1);
    assert!(h.receipts.contains("bob", "bob-1"));
}

#[tokio::test]
async fn test_receipt_for_unknown_message_is_a_no_op() {
    let h = TestHarness::new("alice").await;
    let mut receipt_rx = h.events.message_receipt.subscribe();

    h.listener
        .handle_frame(InboundFrame::Rcp(ReceiptFrame {
            id: "never-sent".into(),
            cid: Some("c1".into()),
            t: Some(700),
            read: None,
        }))
        .await;

    assert!(drain_events(&mut receipt_rx).is_empty());
    assert!(h.receipts.is_empty());
}

#[tokio::test]
async fn test_read_receipt_only_moves_read_watermark() {
    let h = TestHarness::new("alice").await;
    let mut watermark_rx = h.events.watermark.subscribe();

    h.listener
        .handle_frame(InboundFrame::Read(ReceiptFrame {
            id: String::new(),
            cid: Some("c1".into()),
            t: Some(800),
            read: Some(true),
        }))
        .await;
    h.listener
        .handle_frame(InboundFrame::Read(ReceiptFrame {
            id: String::new(),
            cid: Some("c1".into()),
            t: Some(900),
            read: None,
        }))
        .await;

    let watermarks = drain_events(&mut watermark_rx);
    assert_eq!(watermarks.len(), 1);
    assert_eq!(watermarks[0].kind, WatermarkKind::ReadAt);
    let conversation = h.session.conversations().get("c1").unwrap();
    assert_eq!(conversation.read_at(), 800);
    assert_eq!(conversation.delivered_at(), 0);
}

#[tokio::test]
async fn test_ack_error_fails_the_send() {
    let h = TestHarness::new("alice").await;
    let mut failed_rx = h.events.operation_failed.subscribe();
    let mut sent_rx = h.events.message_sent.subscribe();

    let request_id = h.listener.send_message("c1", "hello", true, false).await.unwrap();
    h.listener
        .handle_frame(InboundFrame::Ack {
            i: Some(request_id),
            body: AckFrame {
                code: Some(4401),
                app_code: Some(3),
                reason: Some("not a member".into()),
                ..Default::default()
            },
        })
        .await;

    let failure = recv_event(&mut failed_rx).await.unwrap();
    assert_eq!(failure.operation, OperationKind::ConversationSendMessage);
    assert_eq!(failure.conversation_id.as_deref(), Some("c1"));
    assert_eq!(failure.request_id, Some(request_id));
    assert_eq!(failure.error, OperationError::server(4401, Some(3), Some("not a member")));
    assert!(drain_events(&mut sent_rx).is_empty());
    assert!(h.session.pending().is_empty());
    assert!(h.receipts.is_empty());
}

#[tokio::test]
async fn test_failed_send_is_rolled_back() {
    let h = TestHarness::new("alice").await;
    h.sink.set_failing(true);

    assert!(h.listener.send_message("c1", "hello", false, false).await.is_err());
    assert!(h.session.pending().is_empty());
    assert!(h.session.operations().is_empty());
}

#[tokio::test]
async fn test_patch_batch_advances_to_latest_patch_time() {
    let h = TestHarness::new("alice").await;
    let mut updated_rx = h.events.message_updated.subscribe();

    h.listener
        .handle_frame(InboundFrame::Patch {
            modify: true,
            i: None,
            body: PatchFrame {
                patches: vec![patch_item("m1", 100), patch_item("m2", 50), patch_item("m3", 200)],
                last_patch_time: 0,
            },
        })
        .await;

    assert_eq!(h.session.last_patch_time(), 200);
    let updates = drain_events(&mut updated_rx);
    assert_eq!(updates.len(), 3);
    assert_eq!(updates[1].message.message_id.as_deref(), Some("m2"));
    assert_eq!(updates[1].message.updated_at, 50);
    assert!(!updates[1].recalled);
}

#[tokio::test]
async fn test_patch_time_query_reports_server_value() {
    let h = TestHarness::new("alice").await;
    let mut result_rx = h.events.query_result.subscribe();

    let request_id = h.listener.query_patch_time().await.unwrap();
    h.listener
        .handle_frame(InboundFrame::Patch {
            modify: false,
            i: Some(request_id),
            body: PatchFrame {
                patches: vec![],
                last_patch_time: 1234,
            },
        })
        .await;

    let result = recv_event(&mut result_rx).await.unwrap();
    assert_eq!(result.request_id, request_id);
    assert_eq!(result.operation, OperationKind::ConversationPatchTimeQuery);
    assert_eq!(result.payload, QueryPayload::LastPatchTime(1234));
    assert_eq!(h.session.last_patch_time(), 1234);
    assert!(h.session.operations().is_empty());
}

#[tokio::test]
async fn test_unread_summary_notifies_each_conversation() {
    let h = TestHarness::new("alice").await;
    let mut unread_rx = h.events.unread.subscribe();

    h.listener
        .handle_frame(InboundFrame::Unread(UnreadFrame {
            notif_time: 4242,
            convs: vec![
                UnreadTuple {
                    cid: "c1".into(),
                    unread: 3,
                    mid: "m7".into(),
                    timestamp: 40,
                    from: "bob".into(),
                    data: "latest".into(),
                    patch_timestamp: 0,
                },
                UnreadTuple {
                    cid: "c2".into(),
                    unread: 1,
                    ..Default::default()
                },
            ],
        }))
        .await;

    assert_eq!(h.session.last_notify_time(), 4242);
    let events = drain_events(&mut unread_rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].unread, 3);
    assert_eq!(events[0].message.content, "latest");
    assert_eq!(events[0].message.message_id.as_deref(), Some("m7"));
    assert_eq!(h.session.conversations().get("c2").unwrap().unread_count(), 1);
}
