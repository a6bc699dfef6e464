use std::{pin::pin, time::Duration};

use ctp_settle::{
    Credentials,
    config::{ConfirmPolicy, SessionConfig},
    error::{HandshakeError, HandshakeStage, SessionError, TransportError},
    report::ReportParser,
    session::{Session, SessionState},
    testing::{MockBroker, MockBrokerHandle},
    types::{Request, RequestId, TradingDay},
};
use futures::StreamExt;
use tokio_test::{assert_err, assert_ok, assert_pending, assert_ready};

fn credentials() -> Credentials {
    Credentials::new("9999", "203199", "s3cret", "simnow_client_test", "0000000000000000")
}

fn session(broker: MockBroker) -> (Session, MockBrokerHandle) {
    session_with(broker, SessionConfig::default())
}

fn session_with(broker: MockBroker, config: SessionConfig) -> (Session, MockBrokerHandle) {
    let handle = broker.handle();
    (Session::new(credentials(), broker, config), handle)
}

/// Lets the session task catch up with everything sent to it.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Waits until the broker receives a settlement query other than `prev`.
async fn next_query_id(handle: &MockBrokerHandle, prev: Option<RequestId>) -> RequestId {
    loop {
        match handle.last_query_id() {
            Some(id) if Some(id) != prev => return id,
            _ => tokio::task::yield_now().await,
        }
    }
}

#[tokio::test]
async fn test_handshake_reaches_ready() {
    let (session, handle) = session(MockBroker::new().with_trading_day("20230215"));
    assert_eq!(session.state(), SessionState::Disconnected);

    let mut updates = pin!(session.status_stream());
    assert_ok!(session.connect().await);

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.trading_day(), TradingDay::parse("20230215"));
    assert_eq!(
        handle.request_names(),
        vec!["authenticate", "login", "settlement_confirm"]
    );

    let requests = handle.requests();
    assert_eq!(requests.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(matches!(
        &requests[1].1,
        Request::Login { product_info, .. } if product_info == "openctp"
    ));

    let mut seen = vec![];
    while let Some(status) = updates.next().await {
        seen.push(status.state);
        if status.state.is_ready() {
            break;
        }
    }
    assert_eq!(seen.last(), Some(&SessionState::Ready));
    assert!(!seen.contains(&SessionState::Failed));
}

#[tokio::test]
async fn test_skip_confirm_policy() {
    let config = SessionConfig::default().with_confirm_policy(ConfirmPolicy::Skip);
    let (session, handle) = session_with(MockBroker::new(), config);

    assert_ok!(session.connect().await);
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(handle.request_names(), vec!["authenticate", "login"]);
}

#[tokio::test]
async fn test_handshake_rejections() {
    let cases = [
        (MockBroker::new().with_auth_error(63, "bad auth code"), HandshakeStage::Authenticate, 1),
        (MockBroker::new().with_login_error(3, "bad password"), HandshakeStage::Login, 2),
        (MockBroker::new().with_confirm_error(1, "not now"), HandshakeStage::SettlementConfirm, 3),
    ];
    for (broker, stage, sent) in cases {
        let (session, handle) = session(broker);

        let err = assert_err!(session.connect().await);
        let SessionError::Handshake(HandshakeError { stage: got, code, .. }) = err else {
            panic!("expected handshake error, got {err:?}");
        };
        assert_eq!(got, stage);
        assert_ne!(code, 0);
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.status().error.is_some());
        assert_eq!(handle.requests().len(), sent);

        // A failed session does not serve queries
        assert!(matches!(
            session.query_settlement(None).await,
            Err(SessionError::NotReady(SessionState::Failed))
        ));
    }
}

#[tokio::test]
async fn test_transport_init_error() {
    let broker = MockBroker::new().with_init_error(TransportError::Other("no front".into()));
    let (session, _) = session(broker);
    assert!(matches!(
        session.connect().await,
        Err(SessionError::Transport(TransportError::Other(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_connect_times_out_without_front() {
    let config = SessionConfig::default().with_connect_timeout(Duration::from_secs(2));
    let (session, _) = session_with(MockBroker::new().with_connect_on_init(false), config);

    let err = assert_err!(session.connect().await);
    assert!(matches!(err, SessionError::Timeout("connect", d) if d == Duration::from_secs(2)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_handshake_does_not_unblock_connect() {
    let config = SessionConfig::default().with_connect_timeout(Duration::from_secs(5));
    let (session, handle) = session_with(MockBroker::new().silent_on_handshake(), config);

    let (result, _) = tokio::join!(session.connect(), async {
        settle().await;
        assert_eq!(session.state(), SessionState::Authenticating);
        assert!(handle.disconnect(4097));
        settle().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        // Reconnect of the front does not restart the handshake
        assert!(handle.connect());
    });

    assert!(matches!(result, Err(SessionError::Timeout("connect", _))));
    assert_eq!(session.status().disconnect_reason, Some(4097));
    assert_eq!(handle.request_names(), vec!["authenticate"]);
}

#[tokio::test]
async fn test_query_before_connect() {
    let (session, handle) = session(MockBroker::new());
    assert!(matches!(
        session.query_settlement(None).await,
        Err(SessionError::NotReady(SessionState::Disconnected))
    ));
    assert!(handle.requests().is_empty());
}

#[tokio::test]
async fn test_chunked_query() {
    let broker = MockBroker::new().with_settlement(["AA", "BB", ""]);
    let (session, handle) = session(broker);
    assert_ok!(session.connect().await);

    let day = TradingDay::parse("20230215");
    let content = assert_ok!(session.query_settlement(day.clone()).await);
    assert_eq!(content.text, "AABB");
    assert_eq!(content.error, None);
    assert_eq!(Some(content.request_id), handle.last_query_id());

    let (_, last) = handle.requests().pop().unwrap();
    assert_eq!(
        last,
        Request::QuerySettlement {
            broker_id: "9999".into(),
            investor_id: "203199".into(),
            trading_day: day,
        }
    );
}

#[tokio::test]
async fn test_query_blocks_until_last_chunk() {
    let (session, handle) = session(MockBroker::new().silent_on_queries());
    assert_ok!(session.connect().await);

    let mut query = tokio_test::task::spawn(session.query_settlement(None));
    assert_pending!(query.poll());
    let id = next_query_id(&handle, None).await;

    handle.settlement_chunk(id, "first ", false);
    handle.settlement_chunk(id, "", false);
    settle().await;
    assert_pending!(query.poll());

    handle.settlement_chunk(id, "second", true);
    settle().await;
    let content = assert_ok!(assert_ready!(query.poll()));
    assert_eq!(content.text, "first second");
}

#[tokio::test]
async fn test_query_error_keeps_partial_content() {
    let broker = MockBroker::new()
        .with_settlement(["partial ", "statement"])
        .with_settlement_error(90, "query too frequent");
    let (session, _) = session(broker);
    assert_ok!(session.connect().await);

    let content = assert_ok!(session.query_settlement(None).await);
    assert_eq!(content.text, "partial statement");
    let err = content.error.unwrap();
    assert_eq!(err.error_id, 90);
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_rejected_query_keeps_session() {
    let (session, _) = session(MockBroker::new().with_rejected_queries(-2));
    assert_ok!(session.connect().await);
    assert!(matches!(
        session.query_settlement(None).await,
        Err(SessionError::Transport(TransportError::Rejected(-2)))
    ));
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_query_timeout_discards_late_chunks() {
    let config = SessionConfig::default().with_query_timeout(Duration::from_secs(5));
    let (session, handle) = session_with(MockBroker::new().silent_on_queries(), config);
    assert_ok!(session.connect().await);

    let err = assert_err!(session.query_settlement(None).await);
    assert!(matches!(err, SessionError::Timeout("settlement query", _)));
    let timed_out = handle.last_query_id();

    // Late answer to the abandoned query, then a fresh query answered in time
    let (result, _) = tokio::join!(session.query_settlement(None), async {
        let id = next_query_id(&handle, timed_out).await;
        handle.settlement_chunk(timed_out.unwrap(), "stale", true);
        handle.settlement_chunk(id, "fresh", true);
    });
    let content = assert_ok!(result);
    assert_eq!(content.text, "fresh");
    assert_ne!(Some(content.request_id), timed_out);
}

#[tokio::test]
async fn test_disconnect_fails_pending_query() {
    let (session, handle) = session(MockBroker::new().silent_on_queries());
    assert_ok!(session.connect().await);

    let (result, _) = tokio::join!(session.query_settlement(None), async {
        next_query_id(&handle, None).await;
        handle.disconnect(4097);
    });

    assert!(matches!(result, Err(SessionError::Disconnected { reason: 4097 })));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.query_settlement(None).await,
        Err(SessionError::NotReady(SessionState::Disconnected))
    ));
}

#[tokio::test]
async fn test_concurrent_queries_are_serialized() {
    let (session, handle) = session(MockBroker::new().with_settlement(["AA", "BB"]));
    assert_ok!(session.connect().await);

    let (a, b) = tokio::join!(session.query_settlement(None), session.query_settlement(None));
    let (a, b) = (assert_ok!(a), assert_ok!(b));
    assert_eq!(a.text, "AABB");
    assert_eq!(b.text, "AABB");
    assert_ne!(a.request_id, b.request_id);
    assert_eq!(
        handle.request_names(),
        vec!["authenticate", "login", "settlement_confirm", "query_settlement", "query_settlement"]
    );
}

#[tokio::test]
async fn test_fetch_report() {
    let statement = "交易结算单\r\n\
        Client ID：203199\r\n\
        Date：20230215\r\n\
        风险度 Risk Degree：95.20%\r\n\
        成交记录\r\n\
        ----\r\n\
        |Date|...|\r\n\
        ----\r\n\
        | 20230215 | U1 | SHFE | T01 | cu | cu2305 | B | S | O | 70000.0 | 1 | 70000.0 | 10.0 | 100.0 | 0.0 | TX1 | A001 |\r\n\
        ----\r\n";
    // Chunk boundaries fall anywhere, including inside a line
    let (head, tail) = statement.split_at(statement.find("成交").unwrap() + 3);
    let (session, _) = session(MockBroker::new().with_settlement([head, tail, ""]));
    assert_ok!(session.connect().await);

    let report = assert_ok!(session.fetch_report(None, &ReportParser::new()).await);
    let header = report.header.unwrap();
    assert_eq!(header.client_id, "203199");
    assert_eq!(header.details["风险度RiskDegree"], 95.2);
    assert_eq!(report.transactions.len(), 1);
    assert_eq!(report.transactions[0].lots, 1);
}
