//! S5: shutdown quiescence — new requests are rejected immediately, and
//! the process exits within its configured grace period even if an
//! in-flight upstream is still producing chunks.

mod harness;

use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_upstream::MockUpstream;
use harness::server::TestServer;
use nexus_engine::ProviderKind;

#[tokio::test]
async fn rejects_new_requests_once_shutdown_has_begun() {
    let mock = MockUpstream::start_normal("irrelevant").await.unwrap();
    let (config, discovered) = ConfigBuilder::new()
        .with_upstream(ProviderKind::Groq, "1", &mock.base_url())
        .build();
    let server = TestServer::start(config, discovered).await.unwrap();

    server.begin_shutdown();
    // The lifecycle controller's shutting_down flag flips synchronously
    // inside the graceful-shutdown future; give the task a moment to run.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&serde_json::json!({"model": "test-model", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    assert_eq!(resp.headers().get("Retry-After").unwrap(), "30");
}

#[tokio::test]
async fn exits_within_the_grace_period_despite_a_slow_upstream() {
    let mock = MockUpstream::start_slow(Duration::from_secs(5)).await.unwrap();
    let (config, discovered) = ConfigBuilder::new()
        .with_shutdown_timeout_ms(300)
        .with_upstream(ProviderKind::Groq, "1", &mock.base_url())
        .build();
    let server = TestServer::start(config, discovered).await.unwrap();

    let client = server.client().clone();
    let url = server.url("/v1/chat/completions");
    let request = tokio::spawn(async move {
        client
            .post(url)
            .json(&serde_json::json!({"model": "test-model", "messages": [{"role": "user", "content": "hi"}]}))
            .send()
            .await
    });

    // Let the request commit to the upstream before shutdown begins.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let elapsed = server.shutdown_and_join().await.unwrap();
    assert!(
        elapsed < Duration::from_secs(2),
        "shutdown took {elapsed:?}, expected it bounded near the 300ms grace period"
    );

    let _ = request.await;
}
