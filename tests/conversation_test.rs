use imsession::ClientError;
use imsession::depot::StaleMessageDepot;
use imsession::protocol::{
    ConversationFrame, ConversationOp, ConversationRequestOp, InboundFrame, LogItem,
    OutboundPacket,
};
use imsession::store::FileStore;
use imsession::test_utils::{TestHarness, drain_events, recv_event};
use imsession::types::events::QueryPayload;
use imsession::types::operation::OperationKind;
use std::sync::Arc;

fn conv_frame(op: ConversationOp, i: Option<i32>, cid: Option<&str>) -> InboundFrame {
    InboundFrame::Conv {
        op,
        i,
        body: ConversationFrame {
            cid: cid.map(str::to_string),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_created_conversation_reports_new_id() {
    let h = TestHarness::new("alice").await;
    let mut command_rx = h.events.conversation_command.subscribe();

    let request_id = h
        .listener
        .conversation_command(
            OperationKind::ConversationCreation,
            None,
            vec!["bob".into(), "carol".into()],
            Some(serde_json::json!({ "name": "weekend" })),
        )
        .await
        .unwrap();

    match h.sink.next_packet().await.unwrap() {
        OutboundPacket::Conv {
            op, cid, members, i, ..
        } => {
            assert_eq!(op, ConversationRequestOp::Start);
            assert_eq!(cid, None);
            assert_eq!(members, vec!["bob".to_string(), "carol".to_string()]);
            assert_eq!(i, request_id);
        }
        other => panic!("unexpected packet {other:?}"),
    }

    h.listener
        .handle_frame(conv_frame(ConversationOp::Started, Some(request_id), Some("c-new")))
        .await;

    let result = recv_event(&mut command_rx).await.unwrap();
    assert_eq!(result.conversation_id, "c-new");
    assert_eq!(result.origin, Some(OperationKind::ConversationCreation));
    assert_eq!(result.request_id, Some(request_id));
    assert!(h.session.operations().is_empty());
    assert!(h.session.conversations().get("c-new").is_some());
}

#[tokio::test]
async fn test_member_change_answer_uses_requested_conversation() {
    let h = TestHarness::new("alice").await;
    let mut command_rx = h.events.conversation_command.subscribe();

    let request_id = h
        .listener
        .conversation_command(
            OperationKind::ConversationAddMembers,
            Some("c1".into()),
            vec!["dave".into()],
            None,
        )
        .await
        .unwrap();

    // The server echoes no conversation id on this answer.
    h.listener
        .handle_frame(conv_frame(ConversationOp::Added, Some(request_id), None))
        .await;

    let result = recv_event(&mut command_rx).await.unwrap();
    assert_eq!(result.conversation_id, "c1");
    assert_eq!(result.op, ConversationOp::Added);
    assert_eq!(result.origin, Some(OperationKind::ConversationAddMembers));
    assert!(h.session.operations().is_empty());
}

#[tokio::test]
async fn test_server_initiated_member_change() {
    let h = TestHarness::new("alice").await;
    let mut command_rx = h.events.conversation_command.subscribe();

    h.listener
        .handle_frame(InboundFrame::Conv {
            op: ConversationOp::MembersJoined,
            i: None,
            body: ConversationFrame {
                cid: Some("c7".into()),
                init_by: Some("bob".into()),
                members: vec!["erin".into()],
                ..Default::default()
            },
        })
        .await;
    // Nothing to attribute this one to.
    h.listener
        .handle_frame(conv_frame(ConversationOp::MembersLeft, None, None))
        .await;

    let results = drain_events(&mut command_rx);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].conversation_id, "c7");
    assert_eq!(results[0].origin, None);
    assert_eq!(results[0].frame.init_by.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_conversation_query_returns_raw_results() {
    let h = TestHarness::new("alice").await;
    let mut result_rx = h.events.query_result.subscribe();

    let request_id = h
        .listener
        .conversation_command(OperationKind::ConversationQuery, None, vec![], None)
        .await
        .unwrap();
    h.listener
        .handle_frame(InboundFrame::Conv {
            op: ConversationOp::QueryResult,
            i: Some(request_id),
            body: ConversationFrame {
                results: Some(r#"[{"objectId":"c1"}]"#.into()),
                ..Default::default()
            },
        })
        .await;

    let result = recv_event(&mut result_rx).await.unwrap();
    assert_eq!(result.request_id, request_id);
    assert_eq!(result.operation, OperationKind::ConversationQuery);
    assert_eq!(
        result.payload,
        QueryPayload::Conversations(r#"[{"objectId":"c1"}]"#.into())
    );
}

#[tokio::test]
async fn test_history_is_delivered_to_the_queried_conversation() {
    let h = TestHarness::new("alice").await;
    let mut history_rx = h.events.history.subscribe();

    let request_id = h
        .listener
        .query_messages("c1", Some(5_000), Some("m50".into()), None)
        .await
        .unwrap();
    match h.sink.next_packet().await.unwrap() {
        OutboundPacket::Logs { cid, t, mid, limit, .. } => {
            assert_eq!(cid, "c1");
            assert_eq!(t, Some(5_000));
            assert_eq!(mid.as_deref(), Some("m50"));
            assert_eq!(limit, imsession::request::DEFAULT_HISTORY_LIMIT);
        }
        other => panic!("unexpected packet {other:?}"),
    }

    h.listener
        .handle_frame(InboundFrame::Logs {
            i: Some(request_id),
            logs: vec![
                LogItem {
                    msg_id: "m48".into(),
                    from: "bob".into(),
                    data: "older".into(),
                    timestamp: 4_800,
                    ack_at: 4_801,
                    ..Default::default()
                },
                LogItem {
                    msg_id: "m49".into(),
                    from: "alice".into(),
                    data: "old".into(),
                    timestamp: 4_900,
                    ..Default::default()
                },
            ],
        })
        .await;

    let history = recv_event(&mut history_rx).await.unwrap();
    assert_eq!(history.conversation_id, "c1");
    assert_eq!(history.request_id, request_id);
    assert_eq!(history.messages.len(), 2);
    assert_eq!(history.messages[0].receipt_timestamp, 4_801);
    assert_eq!(history.messages[1].content, "old");
    assert!(h.session.operations().is_empty());
}

#[tokio::test]
async fn test_invalid_conversation_commands_are_rejected() {
    let h = TestHarness::new("alice").await;

    let not_conversation = h
        .listener
        .conversation_command(OperationKind::ClientOpen, Some("c1".into()), vec![], None)
        .await;
    assert!(matches!(not_conversation, Err(ClientError::InvalidOperation(_))));

    let missing_id = h
        .listener
        .conversation_command(OperationKind::ConversationJoin, None, vec![], None)
        .await;
    assert!(matches!(missing_id, Err(ClientError::InvalidOperation(_))));

    let empty_message = h.listener.send_message("  ", "hi", false, false).await;
    assert!(matches!(empty_message, Err(ClientError::InvalidOperation(_))));

    assert!(h.sink.drain().await.is_empty());
    assert!(h.session.operations().is_empty());
}

#[tokio::test]
async fn test_file_backed_depot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()).await.unwrap());

    let depot = StaleMessageDepot::load("alice", store.clone(), 2).await.unwrap();
    assert!(depot.put_if_absent("m1").await);
    assert!(depot.put_if_absent("m2").await);
    assert!(depot.put_if_absent("m3").await);
    drop(depot);

    let reopened = Arc::new(FileStore::new(dir.path()).await.unwrap());
    let depot = StaleMessageDepot::load("alice", reopened, 2).await.unwrap();
    assert_eq!(depot.len().await, 2);
    assert!(!depot.contains("m1").await);
    assert!(!depot.put_if_absent("m3").await);
    assert!(depot.put_if_absent("m1").await);
}
