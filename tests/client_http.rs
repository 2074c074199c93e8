//! Client-level tests against a mock HTTP server: caching, dedup, retry,
//! invalidation and the interceptor wiring.

use cachefetch::telemetry::InMemoryMetrics;
use cachefetch::{
    BatchRequest, Error, RequestClient, RequestClientBuilder, RequestOptions, ResponseBody,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn client_for(server: &mockito::ServerGuard) -> RequestClient {
    init_tracing();
    RequestClientBuilder::new()
        .base_url(format!("{}/api", server.url()))
        .retry_delay(Duration::from_millis(10))
        .without_sweepers()
        .build()
        .expect("client should build")
}

fn json_body(resp: &cachefetch::ApiResponse) -> &serde_json::Value {
    resp.data.as_json().expect("expected a JSON body")
}

#[tokio::test]
async fn repeated_gets_are_served_from_cache() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/projects")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 1, "name": "alpha"}]"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);

    let first = client.get("/projects", RequestOptions::new()).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(json_body(&first)[0]["name"], "alpha");

    let second = client.get("/projects", RequestOptions::new()).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(json_body(&second), json_body(&first));

    mock.assert_async().await;

    let stats = client.cache_stats();
    assert_eq!(stats.short_term.hits, 1);
    assert_eq!(stats.short_term.total_items, 1);
}

#[tokio::test]
async fn cache_entries_expire_after_their_ttl() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/projects")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": true}"#)
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server);
    let options = || RequestOptions::new().cache_ttl(Duration::from_millis(60));

    let first = client.get("/projects", options()).await.unwrap();
    assert!(!first.from_cache);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = client.get("/projects", options()).await.unwrap();
    assert!(!second.from_cache);

    mock.assert_async().await;
}

#[tokio::test]
async fn no_cache_option_always_hits_the_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/live")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server);
    client
        .get("/live", RequestOptions::new().no_cache())
        .await
        .unwrap();
    client
        .get("/live", RequestOptions::new().no_cache())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn concurrent_identical_gets_share_one_network_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tasks")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 9}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let (a, b) = tokio::join!(
        client.get("/tasks", RequestOptions::new()),
        client.get("/tasks", RequestOptions::new()),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(json_body(&a), json_body(&b));
    mock.assert_async().await;
}

#[tokio::test]
async fn successful_mutations_invalidate_cached_reads() {
    let mut server = mockito::Server::new_async().await;
    let get_mock = server
        .mock("GET", "/api/projects")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[]"#)
        .expect(2)
        .create_async()
        .await;
    let post_mock = server
        .mock("POST", "/api/projects")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 1}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);

    // populate the cache
    client.get("/projects", RequestOptions::new()).await.unwrap();

    let created = client
        .post("/projects", Some(json!({"name": "beta"})), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(created.status, 201);

    // the cached read is gone, so this goes back to the network
    let after = client.get("/projects", RequestOptions::new()).await.unwrap();
    assert!(!after.from_cache);

    get_mock.assert_async().await;
    post_mock.assert_async().await;
}

#[tokio::test]
async fn long_term_tier_is_selected_per_call() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/settings")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;

    let client = client_for(&server);
    client
        .get("/settings", RequestOptions::new().long_term())
        .await
        .unwrap();

    let stats = client.cache_stats();
    assert_eq!(stats.long_term.total_items, 1);
    assert_eq!(stats.short_term.total_items, 0);
}

#[tokio::test]
async fn http_404_is_surfaced_without_any_retry() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/missing")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .get("/missing", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_up_to_the_budget() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/flaky")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let metrics = Arc::new(InMemoryMetrics::new());
    let client = RequestClientBuilder::new()
        .base_url(format!("{}/api", server.url()))
        .retries(2)
        .retry_delay(Duration::from_millis(5))
        .metrics_sink(Arc::clone(&metrics) as Arc<dyn cachefetch::telemetry::MetricsSink>)
        .without_sweepers()
        .build()
        .unwrap();

    let err = client.get("/flaky", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    mock.assert_async().await;

    // every attempt was reported to the metrics sink as a failure
    let calls = metrics.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|call| !call.success));
}

#[tokio::test]
async fn failed_requests_are_never_cached() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/broken")
        .with_status(500)
        .create_async()
        .await;

    let client = RequestClientBuilder::new()
        .base_url(format!("{}/api", server.url()))
        .retries(0)
        .without_sweepers()
        .build()
        .unwrap();

    assert!(client.get("/broken", RequestOptions::new()).await.is_err());
    let stats = client.cache_stats();
    assert_eq!(stats.short_term.total_items, 0);
    assert_eq!(stats.long_term.total_items, 0);
}

#[tokio::test]
async fn a_failure_does_not_block_future_identical_requests() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/recovering")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let client = RequestClientBuilder::new()
        .base_url(format!("{}/api", server.url()))
        .retries(0)
        .without_sweepers()
        .build()
        .unwrap();

    // first call fails before reaching the mock (cancelled up front), which
    // must still unregister the pending entry
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = client
        .get(
            "/recovering",
            RequestOptions::new().cancel_token(cancelled),
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::Cancelled);

    let ok = client
        .get("/recovering", RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(ok.status, 200);
    mock.assert_async().await;
}

#[tokio::test]
async fn text_bodies_are_decoded_by_content_type() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("ok")
        .create_async()
        .await;

    let client = client_for(&server);
    let resp = client.get("/health", RequestOptions::new()).await.unwrap();
    assert_eq!(resp.data, ResponseBody::Text("ok".into()));
}

#[tokio::test]
async fn bearer_token_is_attached_by_the_credential_interceptor() {
    use cachefetch::credentials::{CredentialStore, MemoryCredentials};

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/me")
        .match_header("authorization", "Bearer tok-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;

    let credentials = Arc::new(MemoryCredentials::new());
    credentials.store("tok-123");
    let client = RequestClientBuilder::new()
        .base_url(format!("{}/api", server.url()))
        .credentials(credentials as Arc<dyn CredentialStore>)
        .without_sweepers()
        .build()
        .unwrap();

    client.get("/me", RequestOptions::new()).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn a_401_clears_the_credential_and_fires_the_hook() {
    use cachefetch::credentials::{CredentialStore, MemoryCredentials};
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/me")
        .with_status(401)
        .create_async()
        .await;

    let credentials = Arc::new(MemoryCredentials::new());
    credentials.store("stale");
    let expired = Arc::new(AtomicBool::new(false));
    let hook_flag = Arc::clone(&expired);

    let client = RequestClientBuilder::new()
        .base_url(format!("{}/api", server.url()))
        .credentials(Arc::clone(&credentials) as Arc<dyn CredentialStore>)
        .on_session_expired(Box::new(move || hook_flag.store(true, Ordering::SeqCst)))
        .without_sweepers()
        .build()
        .unwrap();

    let err = client.get("/me", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(credentials.token(), None);
    assert!(expired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn batch_returns_per_slot_results_in_input_order() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/a")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"slot": "a"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/b")
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/api/c")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"slot": "c"}"#)
        .create_async()
        .await;

    let client = RequestClientBuilder::new()
        .base_url(format!("{}/api", server.url()))
        .retries(0)
        .without_sweepers()
        .build()
        .unwrap();

    let results = client
        .batch(vec![
            BatchRequest::get("/a"),
            BatchRequest::get("/b"),
            BatchRequest::get("/c"),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(json_body(results[0].as_ref().unwrap())["slot"], "a");
    assert_eq!(results[1].as_ref().unwrap_err().status(), Some(500));
    assert_eq!(json_body(results[2].as_ref().unwrap())["slot"], "c");
}

#[tokio::test]
async fn batch_with_limit_processes_every_chunk() {
    let mut server = mockito::Server::new_async().await;
    for i in 0..5 {
        server
            .mock("GET", format!("/api/item/{}", i).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"i": {}}}"#, i))
            .create_async()
            .await;
    }

    let client = client_for(&server);
    let requests = (0..5)
        .map(|i| BatchRequest::get(format!("/item/{}", i)))
        .collect();
    let results = client.batch_with_limit(requests, 2).await;

    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(json_body(result.as_ref().unwrap())["i"], i);
    }
}
