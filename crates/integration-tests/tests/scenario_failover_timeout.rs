//! S2: failover when the first candidate misses the first-token deadline.

mod harness;

use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_upstream::MockUpstream;
use harness::server::TestServer;
use nexus_engine::ProviderKind;

#[tokio::test]
async fn falls_over_to_the_next_upstream_after_first_token_timeout() {
    let slow = MockUpstream::start_hanging(Duration::from_millis(300)).await.unwrap();
    let fast = MockUpstream::start_normal("recovered here").await.unwrap();

    // Cerebras outranks groq in the default priority table, so with a
    // fresh pool and `round-robin` mode the first round-robin ticket (0)
    // lands on index 0 — the sorted-first, highest-priority entry.
    let (config, discovered) = ConfigBuilder::new()
        .with_first_token_timeout_ms(50)
        .with_backoff_initial_ms(5)
        .with_upstream(ProviderKind::Cerebras, "1", &slow.base_url())
        .with_upstream(ProviderKind::Groq, "1", &fast.base_url())
        .build();
    let server = TestServer::start(config, discovered).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("X-Routing-Mode", "round-robin")
        .json(&serde_json::json!({"model": "test-model", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("\"provider\":\"groq-1\""), "expected failover to groq-1: {body}");
    assert!(body.contains("recovered"));

    let health: serde_json::Value = server.client().get(server.url("/health")).send().await.unwrap().json().await.unwrap();
    let upstreams = health["upstreams"].as_array().unwrap();
    let cerebras = upstreams.iter().find(|u| u["name"] == "cerebras-1").unwrap();
    let groq = upstreams.iter().find(|u| u["name"] == "groq-1").unwrap();
    assert_eq!(cerebras["fail_count"], 1);
    assert_eq!(groq["success_count"], 1);
}
