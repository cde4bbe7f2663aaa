use imsession::error::{CODE_SESSION_SIGNATURE_FAILURE, CODE_SESSION_TOKEN_FAILURE, OperationError};
use imsession::protocol::{ErrorFrame, InboundFrame, OutboundPacket, SessionFrame, SessionOp};
use imsession::store::traits::{SignatureStore, TagStore, TokenStore};
use imsession::test_utils::{RejectingSignatureFactory, TestHarness, drain_events, recv_event};
use imsession::types::operation::{Operation, OperationKind};
use imsession::types::signature::{SessionToken, Signature};
use std::sync::Arc;

fn opened(i: Option<i32>) -> InboundFrame {
    InboundFrame::Session {
        op: SessionOp::Opened,
        i,
        body: SessionFrame::default(),
    }
}

fn session_error(code: i32) -> InboundFrame {
    InboundFrame::Error {
        i: None,
        body: ErrorFrame {
            code,
            app_code: None,
            reason: Some("rejected".to_string()),
        },
    }
}

/// Opens the session through the explicit signature path and returns the
/// request id of the OPEN packet.
async fn open_with_signature(h: &TestHarness) -> i32 {
    h.listener.open().expect("no open in flight").await.unwrap();
    match h.sink.next_packet().await {
        Some(OutboundPacket::Open { i: Some(i), .. }) => i,
        other => panic!("expected signature open, got {other:?}"),
    }
}

#[tokio::test]
async fn test_opened_with_request_id_seven_emits_one_open_event() {
    let h = TestHarness::new("alice").await;
    let mut opened_rx = h.events.session_opened.subscribe();
    let mut resumed_rx = h.events.session_resumed.subscribe();

    for _ in 0..6 {
        h.session.next_request_id();
    }
    h.listener.open().unwrap().await.unwrap();
    let packet = h.sink.next_packet().await.unwrap();
    match &packet {
        OutboundPacket::Open {
            peer_id,
            st,
            signature,
            tag,
            reconnect,
            i,
            ..
        } => {
            assert_eq!(peer_id, "alice");
            assert!(st.is_none());
            assert!(signature.is_some());
            assert_eq!(tag.as_deref(), Some("test"));
            assert!(!reconnect);
            assert_eq!(*i, Some(7));
        }
        other => panic!("expected open, got {other:?}"),
    }
    assert!(h.session.operations().contains(7));

    h.listener.handle_frame(opened(Some(7))).await;

    let events = drain_events(&mut opened_rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, Some(7));
    assert!(drain_events(&mut resumed_rx).is_empty());
    assert!(!h.session.operations().contains(7));
    assert!(h.session.is_opened());
    assert!(!h.session.is_resuming());
}

#[tokio::test]
async fn test_opened_caches_advertised_session_token() {
    let h = TestHarness::new("alice").await;
    let request_id = open_with_signature(&h).await;

    h.listener
        .handle_frame(InboundFrame::Session {
            op: SessionOp::Opened,
            i: Some(request_id),
            body: SessionFrame {
                st: Some("st-1".to_string()),
                st_ttl: Some(3600),
                ..Default::default()
            },
        })
        .await;

    let token = h.store.get_session_token("alice").await.unwrap().unwrap();
    assert_eq!(token.token, "st-1");
}

#[tokio::test]
async fn test_opened_with_out_of_range_token_ttl_keeps_listener_alive() {
    let h = TestHarness::new("alice").await;
    let mut opened_rx = h.events.session_opened.subscribe();
    let request_id = open_with_signature(&h).await;

    let raw = format!(
        r#"{{"cmd":"session","op":"opened","i":{request_id},"st":"tok","st_ttl":10000000000000}}"#
    );
    let frame = imsession::protocol::decode_frame(raw.as_bytes()).unwrap();
    h.listener.handle_frame(frame).await;

    assert_eq!(recv_event(&mut opened_rx).await.unwrap().request_id, Some(request_id));
    let token = h.store.get_session_token("alice").await.unwrap().unwrap();
    assert_eq!(token.token, "tok");

    h.listener
        .handle_frame(InboundFrame::Session {
            op: SessionOp::Opened,
            i: None,
            body: SessionFrame {
                st: Some("tok-2".to_string()),
                st_ttl: Some(i64::MIN),
                ..Default::default()
            },
        })
        .await;
    assert!(h.store.get_session_token("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_token_triggers_signature_reopen() {
    let h = TestHarness::new("alice").await;
    h.store
        .put_session_token("alice", SessionToken::with_ttl("st-old", 600))
        .await
        .unwrap();
    h.listener.prepare_open();

    h.listener.on_transport_open().await;
    match h.sink.next_packet().await {
        Some(OutboundPacket::Open {
            st, signature, reconnect, i, ..
        }) => {
            assert_eq!(st.as_deref(), Some("st-old"));
            assert!(signature.is_none());
            assert!(reconnect);
            assert!(i.is_none());
        }
        other => panic!("expected token open, got {other:?}"),
    }

    h.listener.handle_frame(session_error(CODE_SESSION_TOKEN_FAILURE)).await;

    assert!(h.store.get_session_token("alice").await.unwrap().is_none());
    match h.sink.next_packet().await {
        Some(OutboundPacket::Open {
            st, signature, reconnect, i, ..
        }) => {
            assert!(st.is_none());
            assert!(signature.is_some());
            assert!(reconnect);
            assert!(i.is_some());
        }
        other => panic!("expected signature open, got {other:?}"),
    }
}

#[tokio::test]
async fn test_signature_failure_code_evicts_tag_and_signature() {
    let h = TestHarness::new("alice").await;
    let mut errors_rx = h.events.server_error.subscribe();
    h.store.put_session_tag("alice", "mobile").await.unwrap();
    h.store
        .put_signature("alice", Signature::new("sig", 1, "nonce", vec![]))
        .await
        .unwrap();

    h.listener
        .handle_frame(session_error(CODE_SESSION_SIGNATURE_FAILURE))
        .await;

    assert!(h.store.get_session_tag("alice").await.unwrap().is_none());
    assert!(h.store.get_signature("alice").await.unwrap().is_none());
    let event = recv_event(&mut errors_rx).await.unwrap();
    assert_eq!(event.error.code(), Some(CODE_SESSION_SIGNATURE_FAILURE));
    assert!(h.sink.drain().await.is_empty(), "signature failure is not retried");
}

#[tokio::test]
async fn test_resume_does_not_touch_operation_cache() {
    let h = TestHarness::new("alice").await;
    let mut opened_rx = h.events.session_opened.subscribe();
    let mut resumed_rx = h.events.session_resumed.subscribe();
    let mut paused_rx = h.events.session_paused.subscribe();

    let first = open_with_signature(&h).await;
    h.listener.handle_frame(opened(Some(first))).await;
    assert_eq!(drain_events(&mut opened_rx).len(), 1);

    h.listener.on_transport_close();
    assert_eq!(drain_events(&mut paused_rx).len(), 1);
    assert!(h.session.is_paused());

    // Reconnect: no token was cached, so the auto-login signs again.
    h.listener.on_transport_open().await;
    let reopen = match h.sink.next_packet().await {
        Some(OutboundPacket::Open { i: Some(i), reconnect, .. }) => {
            assert!(reconnect);
            i
        }
        other => panic!("expected reconnect open, got {other:?}"),
    };
    assert!(h.session.operations().contains(reopen));

    h.listener.handle_frame(opened(Some(reopen))).await;

    assert_eq!(drain_events(&mut resumed_rx).len(), 1);
    assert!(drain_events(&mut opened_rx).is_empty());
    assert!(h.session.operations().contains(reopen));
    assert!(!h.session.is_paused());
    assert!(h.session.is_opened());
}

#[tokio::test]
async fn test_close_fails_everything_in_flight_exactly_once() {
    let h = TestHarness::new("alice").await;
    let mut paused_rx = h.events.session_paused.subscribe();
    let mut failed_rx = h.events.operation_failed.subscribe();

    let m1 = h.listener.send_message("c1", "one", false, false).await.unwrap();
    let m2 = h.listener.send_message("c2", "two", true, false).await.unwrap();
    let q = h.listener.query_online(vec!["bob".into()]).await.unwrap();
    let u = h
        .listener
        .conversation_command(OperationKind::ConversationUpdate, Some("c1".into()), vec![], None)
        .await
        .unwrap();

    h.listener.on_transport_close();
    h.listener.on_transport_close();

    assert!(h.session.pending().is_empty());
    assert!(h.session.operations().is_empty());
    assert_eq!(drain_events(&mut paused_rx).len(), 1);

    let failures = drain_events(&mut failed_rx);
    let mut ids: Vec<i32> = failures.iter().filter_map(|f| f.request_id).collect();
    ids.sort();
    let mut expected = vec![m1, m2, q, u];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(
        failures
            .iter()
            .all(|f| f.error == OperationError::ConnectionLost)
    );
    let send_failure = failures.iter().find(|f| f.request_id == Some(m2)).unwrap();
    assert_eq!(send_failure.operation, OperationKind::ConversationSendMessage);
    assert_eq!(send_failure.conversation_id.as_deref(), Some("c2"));
    let query_failure = failures.iter().find(|f| f.request_id == Some(q)).unwrap();
    assert_eq!(query_failure.operation, OperationKind::ClientOnlineQuery);
}

#[tokio::test]
async fn test_open_error_resets_session_flags() {
    let h = TestHarness::new("alice").await;
    let mut failed_rx = h.events.operation_failed.subscribe();
    let request_id = open_with_signature(&h).await;
    assert!(h.session.is_resuming());

    h.listener
        .handle_frame(InboundFrame::Error {
            i: Some(request_id),
            body: ErrorFrame {
                code: 4103,
                app_code: Some(2),
                reason: Some("bad signature".into()),
            },
        })
        .await;

    assert!(!h.session.is_opened());
    assert!(!h.session.is_resuming());
    assert!(h.session.operations().is_empty());
    let failure = recv_event(&mut failed_rx).await.unwrap();
    assert_eq!(failure.operation, OperationKind::ClientOpen);
    assert_eq!(failure.request_id, Some(request_id));
    assert_eq!(
        failure.error,
        OperationError::server(4103, Some(2), Some("bad signature"))
    );
}

#[tokio::test]
async fn test_error_for_unknown_request_is_a_no_op() {
    let h = TestHarness::new("alice").await;
    let mut failed_rx = h.events.operation_failed.subscribe();

    h.listener
        .handle_frame(InboundFrame::Error {
            i: Some(42),
            body: ErrorFrame {
                code: 4301,
                app_code: None,
                reason: None,
            },
        })
        .await;

    assert!(drain_events(&mut failed_rx).is_empty());
}

#[tokio::test]
async fn test_signature_factory_failure_sends_no_open() {
    let h = TestHarness::with_factory("alice", Some(Arc::new(RejectingSignatureFactory))).await;
    let mut failed_rx = h.events.operation_failed.subscribe();

    h.listener.open().unwrap().await.unwrap();

    assert!(h.sink.drain().await.is_empty());
    assert!(!h.session.is_resuming());
    assert!(!h.session.is_opening());
    assert!(h.session.operations().is_empty());
    let failure = recv_event(&mut failed_rx).await.unwrap();
    assert_eq!(failure.operation, OperationKind::ClientOpen);
    assert!(matches!(failure.error, OperationError::Signature(_)));
}

#[tokio::test]
async fn test_new_signature_open_supersedes_previous_open_operation() {
    let h = TestHarness::new("alice").await;
    let first = open_with_signature(&h).await;
    let second = open_with_signature(&h).await;

    assert_ne!(first, second);
    assert!(!h.session.operations().contains(first));
    assert!(h.session.operations().contains(second));
    assert_eq!(h.session.operations().len(), 1);
}

#[tokio::test]
async fn test_concurrent_open_is_single_flight() {
    let h = TestHarness::new("alice").await;

    let first = h.listener.open();
    let second = h.listener.open();
    assert!(first.is_some());
    assert!(second.is_none());
    first.unwrap().await.unwrap();

    let opens: Vec<_> = h
        .sink
        .drain()
        .await
        .into_iter()
        .filter(|p| matches!(p, OutboundPacket::Open { .. }))
        .collect();
    assert_eq!(opens.len(), 1);
}

#[tokio::test]
async fn test_client_close_and_server_close() {
    let h = TestHarness::new("alice").await;
    let mut closed_rx = h.events.session_closed.subscribe();
    let mut kicked_rx = h.events.closed_by_server.subscribe();
    let request_id = open_with_signature(&h).await;
    h.listener.handle_frame(opened(Some(request_id))).await;

    let close_id = h.listener.close().await.unwrap();
    assert!(matches!(
        h.sink.next_packet().await,
        Some(OutboundPacket::Close { i, .. }) if i == close_id
    ));
    h.listener
        .handle_frame(InboundFrame::Session {
            op: SessionOp::Closed,
            i: Some(close_id),
            body: SessionFrame::default(),
        })
        .await;
    let closed = recv_event(&mut closed_rx).await.unwrap();
    assert_eq!(closed.request_id, Some(close_id));
    assert!(h.session.operations().is_empty());
    assert!(!h.session.is_opened());

    h.listener
        .handle_frame(InboundFrame::Session {
            op: SessionOp::Closed,
            i: None,
            body: SessionFrame {
                code: Some(4111),
                ..Default::default()
            },
        })
        .await;
    assert_eq!(recv_event(&mut kicked_rx).await.unwrap().code, 4111);
}

#[tokio::test]
async fn test_online_query_result_resolves_operation() {
    let h = TestHarness::new("alice").await;
    let mut online_rx = h.events.online_query.subscribe();
    let request_id = h
        .listener
        .query_online(vec!["bob".into(), "carol".into()])
        .await
        .unwrap();

    h.listener
        .handle_frame(InboundFrame::Session {
            op: SessionOp::QueryResult,
            i: Some(request_id),
            body: SessionFrame {
                online_peer_ids: vec!["bob".into()],
                ..Default::default()
            },
        })
        .await;

    let result = recv_event(&mut online_rx).await.unwrap();
    assert_eq!(result.online_peer_ids, vec!["bob".to_string()]);
    assert_eq!(result.request_id, Some(request_id));
    assert!(h.session.operations().is_empty());
}

#[tokio::test]
async fn test_session_scoped_failure_is_not_routed_to_a_conversation() {
    let h = TestHarness::new("alice").await;
    let mut failed_rx = h.events.operation_failed.subscribe();

    h.session
        .operations()
        .offer(Operation::new(OperationKind::ClientOnlineQuery, "alice", Some("c1".into()), 900))
        .unwrap();
    h.session
        .operations()
        .offer(Operation::new(OperationKind::ConversationMute, "alice", Some("c1".into()), 901))
        .unwrap();

    for i in [900, 901] {
        h.listener
            .handle_frame(InboundFrame::Error {
                i: Some(i),
                body: ErrorFrame {
                    code: 4301,
                    app_code: None,
                    reason: None,
                },
            })
            .await;
    }

    let failures = drain_events(&mut failed_rx);
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].operation, OperationKind::ClientOnlineQuery);
    assert_eq!(failures[0].conversation_id, None);
    assert_eq!(failures[1].operation, OperationKind::ConversationMute);
    assert_eq!(failures[1].conversation_id.as_deref(), Some("c1"));
}
