//! End-to-end relay tests against a mock inference service.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use chat_gateway::GatewayConfig;

mod common;
use common::Reply;

fn gateway_config(upstream: std::net::SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = format!("http://{}", upstream);
    config.upstream.connect_timeout_ms = 500;
    config.upstream.response_timeout_secs = 5;
    config.upstream.stream_timeout_secs = 10;
    config
}

fn chat_request(
    client: &reqwest::Client,
    gateway: std::net::SocketAddr,
    role: &str,
) -> reqwest::RequestBuilder {
    client
        .post(format!("http://{}/api/chat/message", gateway))
        .header("x-auth-subject", "user-1")
        .header("x-auth-role", role)
}

#[tokio::test]
async fn test_forwards_exact_body_and_path() {
    let (upstream, recorder) = common::start_mock_backend(|_| Reply::Chunked {
        chunks: vec!["data: hi\n\n".into()],
        interval: Duration::ZERO,
        complete: true,
    })
    .await;
    let (gateway, shutdown) = common::start_gateway(gateway_config(upstream)).await;

    let res = chat_request(&common::client(), gateway, "user")
        .header("x-request-id", "req-abc")
        .json(&serde_json::json!({ "id": "conv-42", "message": "hello there" }))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/event-stream");
    assert_eq!(res.headers()["x-request-id"], "req-abc");
    assert_eq!(res.text().await.unwrap(), "data: hi\n\n");

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    let captured = &requests[0];
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.path, "/chat/conv-42/message");
    assert_eq!(captured.header("x-request-id"), Some("req-abc"));
    let body: serde_json::Value = serde_json::from_slice(&captured.body).unwrap();
    assert_eq!(body, serde_json::json!({ "message": "hello there" }));

    shutdown.trigger();
}

#[tokio::test]
async fn test_response_streams_incrementally() {
    let chunk_count = 4;
    let interval = Duration::from_millis(300);
    let (upstream, _) = common::start_mock_backend(move |_| Reply::Chunked {
        chunks: (0..chunk_count).map(|i| format!("chunk-{i};")).collect(),
        interval,
        complete: true,
    })
    .await;
    let (gateway, shutdown) = common::start_gateway(gateway_config(upstream)).await;

    let start = Instant::now();
    let mut res = chat_request(&common::client(), gateway, "user")
        .json(&serde_json::json!({ "id": "c1", "message": "stream please" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let first = res.chunk().await.unwrap().expect("first chunk");
    let time_to_first_byte = start.elapsed();
    assert!(first.starts_with(b"chunk-0;"));

    let mut body = first.to_vec();
    while let Some(chunk) = res.chunk().await.unwrap() {
        body.extend_from_slice(&chunk);
    }
    let total = start.elapsed();

    assert_eq!(body, b"chunk-0;chunk-1;chunk-2;chunk-3;");
    // The last chunk is only sent after (K-1) intervals.
    assert!(total >= interval * (chunk_count - 1));
    assert!(
        time_to_first_byte < interval,
        "first byte after {:?}, total {:?}",
        time_to_first_byte,
        total
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_interrupted_upstream_terminates_stream_abnormally() {
    let (upstream, _) = common::start_mock_backend(|_| Reply::Chunked {
        chunks: vec!["part-1;".into(), "part-2;".into()],
        interval: Duration::from_millis(50),
        complete: false,
    })
    .await;
    let (gateway, shutdown) = common::start_gateway(gateway_config(upstream)).await;

    let mut res = chat_request(&common::client(), gateway, "user")
        .json(&serde_json::json!({ "id": "c1", "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let mut received = Vec::new();
    let outcome = loop {
        match res.chunk().await {
            Ok(Some(chunk)) => received.extend_from_slice(&chunk),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    assert!(outcome.is_err(), "stream must not end cleanly");
    assert!(b"part-1;part-2;".starts_with(&received));

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_error_status_forwarded_as_is() {
    let (upstream, _) = common::start_mock_backend(|_| Reply::Full {
        status: 429,
        content_type: "text/plain",
        body: "slow down".into(),
        delay: Duration::ZERO,
    })
    .await;
    let (gateway, shutdown) = common::start_gateway(gateway_config(upstream)).await;

    let res = chat_request(&common::client(), gateway, "user")
        .json(&serde_json::json!({ "id": "c1", "message": "hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.text().await.unwrap(), "slow down");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = closed.local_addr().unwrap();
    drop(closed);

    let (gateway, shutdown) = common::start_gateway(gateway_config(upstream)).await;

    let res = chat_request(&common::client(), gateway, "user")
        .json(&serde_json::json!({ "id": "c1", "message": "hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "upstream_unreachable");

    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_upstream_head_times_out() {
    let (upstream, _) = common::start_mock_backend(|_| Reply::Full {
        status: 200,
        content_type: "text/plain",
        body: "too late".into(),
        delay: Duration::from_secs(3),
    })
    .await;
    let mut config = gateway_config(upstream);
    config.upstream.response_timeout_secs = 1;
    let (gateway, shutdown) = common::start_gateway(config).await;

    let res = chat_request(&common::client(), gateway, "user")
        .json(&serde_json::json!({ "id": "c1", "message": "hi" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);

    shutdown.trigger();
}

#[tokio::test]
async fn test_dot_segment_ids_never_relayed() {
    let (upstream, recorder) = common::start_mock_backend(|_| Reply::Full {
        status: 200,
        content_type: "text/plain",
        body: "reply".into(),
        delay: Duration::ZERO,
    })
    .await;
    let (gateway, shutdown) = common::start_gateway(gateway_config(upstream)).await;

    for id in [".", "..", ""] {
        let res = chat_request(&common::client(), gateway, "user")
            .json(&serde_json::json!({ "id": id, "message": "hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "id {id:?}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_request");
    }
    assert_eq!(recorder.calls(), 0);

    let res = chat_request(&common::client(), gateway, "user")
        .json(&serde_json::json!({ "id": "..a", "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(recorder.requests()[0].path, "/chat/..a/message");

    shutdown.trigger();
}
