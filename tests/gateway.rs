use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{Json, Router, routing::get};
use futures::{SinkExt, StreamExt};
use ruka::{
    common::errors::GatewayError,
    gateway::{ConnectReason, GatewayOptions, GatewaySession, Intents, Phase},
    rest::RestClient,
};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    WebSocketStream, accept_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

type Socket = WebSocketStream<TcpStream>;

const TOKEN: &str = "test-token";
const UNREACHABLE_HTTP: &str = "http://127.0.0.1:9";
const WAIT: Duration = Duration::from_secs(5);
/// Long enough to cover the 2.5-5s reconnect jitter.
const JITTER_WAIT: Duration = Duration::from_secs(10);

async fn fake_gateway() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://127.0.0.1:{}", listener.local_addr().unwrap().port());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> Socket {
    accept_within(listener, WAIT).await
}

async fn accept_within(listener: &TcpListener, limit: Duration) -> Socket {
    let (stream, _) = tokio::time::timeout(limit, listener.accept())
        .await
        .expect("client never connected")
        .unwrap();
    accept_async(stream).await.unwrap()
}

async fn send(ws: &mut Socket, payload: Value) {
    ws.send(Message::Text(payload.to_string().into()))
        .await
        .unwrap();
}

/// Next frame that is either text (parsed) or a close frame.
async fn next_frame(ws: &mut Socket) -> Result<Value, Option<u16>> {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("client went quiet")
            .expect("socket ended")
            .unwrap();
        match msg {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str()).unwrap()),
            Message::Close(frame) => return Err(frame.map(|f| f.code.into())),
            _ => continue,
        }
    }
}

async fn next_json(ws: &mut Socket) -> Value {
    next_frame(ws).await.expect("expected a payload, got a close")
}

fn hello(interval_ms: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": interval_ms}, "s": null, "t": null})
}

fn ready(session_id: &str, seq: u64) -> Value {
    json!({
        "op": 0,
        "t": "READY",
        "s": seq,
        "d": {"session_id": session_id, "user": {"id": "1234", "username": "ruka"}}
    })
}

fn session(api_base: &str, default_url: &str) -> GatewaySession {
    GatewaySession::new(GatewayOptions {
        token: TOKEN.to_string(),
        intents: Intents::default(),
        presence: None,
        rest: RestClient::new(reqwest::Client::new(), api_base, TOKEN),
        default_url: default_url.to_string(),
    })
}

/// Accepts the first connection and walks it through identify and ready.
async fn established(
    listener: &TcpListener,
    gateway: &GatewaySession,
    session_id: &str,
    seq: u64,
) -> Socket {
    let mut ws = accept(listener).await;
    send(&mut ws, hello(45_000)).await;
    assert_eq!(next_json(&mut ws).await["op"], 2);
    send(&mut ws, ready(session_id, seq)).await;
    wait_until(|| gateway.phase() == Phase::Connected).await;
    ws
}

async fn close_with(ws: &mut Socket, code: u16) {
    ws.close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: "bye".into(),
    }))
    .await
    .unwrap();
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn test_identify_then_ready_establishes_session() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);

    let readies = Arc::new(AtomicUsize::new(0));
    let seen = readies.clone();
    gateway.on("READY", move |d| {
        let seen = seen.clone();
        async move {
            assert_eq!(d["session_id"], "abc");
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    let task = gateway.connect(ConnectReason::Identify);
    let mut ws = accept(&listener).await;

    send(&mut ws, hello(45_000)).await;
    let identify = next_json(&mut ws).await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TOKEN);
    assert_eq!(identify["d"]["intents"], Intents::default().bits());

    send(&mut ws, ready("abc", 1)).await;
    wait_until(|| readies.load(Ordering::SeqCst) == 1).await;
    assert_eq!(gateway.session_id().as_deref(), Some("abc"));
    assert_eq!(gateway.sequence(), Some(1));
    assert_eq!(gateway.phase(), Phase::Connected);
    assert_eq!(gateway.user_id().map(|u| u.0), Some(1234));

    gateway.shutdown();
    assert_eq!(next_frame(&mut ws).await, Err(Some(1000)));
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_gateway_url_comes_from_rest_lookup() {
    let (listener, url) = fake_gateway().await;

    let app = Router::new().route(
        "/gateway/bot",
        get(move || {
            let url = url.clone();
            async move { Json(json!({"url": url, "shards": 1})) }
        }),
    );
    let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let api_base = format!("http://127.0.0.1:{}", http.local_addr().unwrap().port());
    tokio::spawn(async move {
        axum::serve(http, app).await.unwrap();
    });

    // The default points nowhere, so connecting proves the lookup was used.
    let gateway = session(&api_base, "ws://127.0.0.1:9");
    let task = gateway.connect(ConnectReason::Identify);
    let mut ws = accept(&listener).await;

    send(&mut ws, hello(45_000)).await;
    assert_eq!(next_json(&mut ws).await["op"], 2);

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_reconnect_request_resumes_with_last_sequence() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(45_000)).await;
    assert_eq!(next_json(&mut ws).await["op"], 2);
    send(&mut ws, ready("abc", 5)).await;
    wait_until(|| gateway.phase() == Phase::Connected).await;

    send(&mut ws, json!({"op": 7, "d": null})).await;
    assert_eq!(next_frame(&mut ws).await, Err(Some(3001)));

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(45_000)).await;
    let resume = next_json(&mut ws).await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 5);
    assert_eq!(resume["d"]["token"], TOKEN);

    send(
        &mut ws,
        json!({"op": 0, "t": "RESUMED", "s": 6, "d": {}}),
    )
    .await;
    wait_until(|| gateway.phase() == Phase::Connected && gateway.sequence() == Some(6)).await;

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_normal_close_identifies_from_scratch() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = established(&listener, &gateway, "abc", 3).await;
    close_with(&mut ws, 1000).await;

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(45_000)).await;
    let identify = next_json(&mut ws).await;
    assert_eq!(identify["op"], 2);
    assert_eq!(gateway.session_id(), None);
    assert_eq!(gateway.sequence(), None);

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_4xxx_close_resumes() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = established(&listener, &gateway, "abc", 3).await;
    close_with(&mut ws, 4000).await;

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(45_000)).await;
    let resume = next_json(&mut ws).await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 3);

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_dropped_socket_resumes() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let ws = established(&listener, &gateway, "abc", 8).await;
    drop(ws);

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(45_000)).await;
    let resume = next_json(&mut ws).await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 8);

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_resumable_invalid_session_waits_then_resumes() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = established(&listener, &gateway, "abc", 4).await;
    let sent_at = tokio::time::Instant::now();
    send(&mut ws, json!({"op": 9, "d": true})).await;
    assert_eq!(next_frame(&mut ws).await, Err(Some(3002)));

    let mut ws = accept_within(&listener, JITTER_WAIT).await;
    let waited = sent_at.elapsed();
    assert!(waited >= Duration::from_millis(2_500), "reconnected after {:?}", waited);
    assert!(waited < JITTER_WAIT);

    send(&mut ws, hello(45_000)).await;
    let resume = next_json(&mut ws).await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 4);

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_unresumable_invalid_session_waits_then_identifies() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = established(&listener, &gateway, "abc", 4).await;
    let sent_at = tokio::time::Instant::now();
    send(&mut ws, json!({"op": 9, "d": false})).await;
    assert_eq!(next_frame(&mut ws).await, Err(Some(3002)));
    assert_eq!(gateway.session_id(), None);

    let mut ws = accept_within(&listener, JITTER_WAIT).await;
    assert!(sent_at.elapsed() >= Duration::from_millis(2_500));

    send(&mut ws, hello(45_000)).await;
    let identify = next_json(&mut ws).await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TOKEN);

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_missing_ack_closes_once_and_resumes() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(100)).await;
    assert_eq!(next_json(&mut ws).await["op"], 2);
    send(&mut ws, ready("zzz", 2)).await;

    // Never ack: exactly one beat, then the zombie close.
    let mut beats = 0;
    let code = loop {
        match next_frame(&mut ws).await {
            Ok(payload) => {
                assert_eq!(payload["op"], 1);
                assert!(payload["d"].is_null() || payload["d"] == 2);
                beats += 1;
            }
            Err(code) => break code,
        }
    };
    assert_eq!(beats, 1);
    assert_eq!(code, Some(3000));

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(45_000)).await;
    let resume = next_json(&mut ws).await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "zzz");

    gateway.shutdown();
    let _ = task.await;
}

#[tokio::test]
async fn test_acked_heartbeats_keep_the_connection() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(50)).await;
    assert_eq!(next_json(&mut ws).await["op"], 2);

    for _ in 0..3 {
        let beat = next_json(&mut ws).await;
        assert_eq!(beat["op"], 1);
        assert!(beat["d"].is_null());
        send(&mut ws, json!({"op": 11, "d": null})).await;
    }

    gateway.shutdown();
    assert_eq!(next_frame(&mut ws).await, Err(Some(1000)));
    let _ = task.await;
}

#[tokio::test]
async fn test_unknown_close_class_is_terminal() {
    let (listener, url) = fake_gateway().await;
    let gateway = session(UNREACHABLE_HTTP, &url);
    let task = gateway.connect(ConnectReason::Identify);

    let mut ws = accept(&listener).await;
    send(&mut ws, hello(45_000)).await;
    assert_eq!(next_json(&mut ws).await["op"], 2);

    ws.close(Some(CloseFrame {
        code: CloseCode::from(3500),
        reason: "go away".into(),
    }))
    .await
    .unwrap();

    let result = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert!(matches!(
        result,
        Err(GatewayError::Terminal { code: 3500, .. })
    ));
}
