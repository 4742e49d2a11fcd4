//! S3: repeated failures open the breaker, and it recovers through
//! half-open after the reset timeout elapses.

mod harness;

use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_upstream::MockUpstream;
use harness::server::TestServer;
use nexus_engine::ProviderKind;

#[tokio::test]
async fn opens_after_threshold_failures_and_recovers_through_half_open() {
    let mock = MockUpstream::start_failing(3).await.unwrap();
    let (config, discovered) = ConfigBuilder::new()
        .with_breaker(3, 200)
        .with_upstream(ProviderKind::Groq, "1", &mock.base_url())
        .build();
    let server = TestServer::start(config, discovered).await.unwrap();

    for _ in 0..3 {
        let resp = server
            .client()
            .post(server.url("/v1/chat/completions"))
            .json(&serde_json::json!({"model": "test-model", "messages": [{"role": "user", "content": "hi"}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.text().await.unwrap();
        assert!(body.contains("\"type\":\"gateway_error\""), "expected an error frame: {body}");
    }

    let health: serde_json::Value = server.client().get(server.url("/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["upstreams"][0]["circuit"], "open");
    assert_eq!(health["upstreams"][0]["fail_count"], 3);

    tokio::time::sleep(Duration::from_millis(250)).await;

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&serde_json::json!({"model": "test-model", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("recovered"), "expected the half-open probe to succeed: {body}");

    let health: serde_json::Value = server.client().get(server.url("/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["upstreams"][0]["circuit"], "closed");
    assert_eq!(health["upstreams"][0]["success_count"], 1);
}
