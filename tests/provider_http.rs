use std::time::Duration;

use httpmock::{Method::POST, MockServer};
use serde_json::json;
use ticker_news::ai::{Completion, Invocation, Provider, ProviderSettings, ResilientInvoker, RetryPolicy};
use ticker_news::ProviderError;

fn settings(server: &MockServer, path: &str, key: Option<&str>) -> ProviderSettings {
    ProviderSettings {
        api_key: key.map(str::to_string),
        model: None,
        endpoint: Some(format!("{}{}", server.base_url(), path)),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn openai_reads_first_choice() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer test-key")
            .json_body(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "user", "content": "prompt" }],
                "temperature": 0.1,
                "max_tokens": 1000,
                "stream": false,
            }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"choices":[{"message":{"role":"assistant","content":"{\"tickers\":[\"AAPL\"]}"}}]}"#);
    });

    let provider = Provider::new("openai", settings(&server, "/v1/chat/completions", Some("test-key"))).unwrap();
    let text = provider.complete("prompt").await.unwrap();

    mock.assert();
    assert_eq!(text, r#"{"tickers":["AAPL"]}"#);
}

#[tokio::test]
async fn model_override_lands_in_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/generate")
            .json_body_includes(r#"{"model":"mistral"}"#);
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"response":"ok"}"#);
    });

    let provider = Provider::new(
        "ollama",
        ProviderSettings {
            model: Some("mistral".to_string()),
            ..settings(&server, "/api/generate", None)
        },
    )
    .unwrap();
    let text = provider.complete("prompt").await.unwrap();

    mock.assert();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn anthropic_sends_key_and_version_headers() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/messages")
            .header("x-api-key", "test-key")
            .header("anthropic-version", "2023-06-01")
            .json_body(json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 1000,
                "temperature": 0.1,
                "messages": [{ "role": "user", "content": "prompt" }],
                "stream": false,
            }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"content":[{"type":"text","text":"hello"}]}"#);
    });

    let provider = Provider::new("anthropic", settings(&server, "/v1/messages", Some("test-key"))).unwrap();
    let text = provider.complete("prompt").await.unwrap();

    mock.assert();
    assert_eq!(text, "hello");
}

#[tokio::test]
async fn ollama_needs_no_key() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/generate").json_body(json!({
            "model": "llama2",
            "prompt": "prompt",
            "stream": false,
            "options": { "temperature": 0.1 },
        }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"model":"llama2","response":"{}","done":true}"#);
    });

    let provider = Provider::new("ollama", settings(&server, "/api/generate", None)).unwrap();
    let text = provider.complete("prompt").await.unwrap();

    mock.assert();
    assert_eq!(text, "{}");
}

#[tokio::test]
async fn huggingface_reads_generated_text() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gpt2")
            .header("authorization", "Bearer hf-token")
            .json_body(json!({
                "inputs": "prompt",
                "parameters": { "max_new_tokens": 1000, "temperature": 0.1 },
            }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"generated_text":"done"}]"#);
    });

    let provider = Provider::new("huggingface", settings(&server, "/models/gpt2", Some("hf-token"))).unwrap();
    let text = provider.complete("prompt").await.unwrap();

    mock.assert();
    assert_eq!(text, "done");
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(429).body("rate limited");
    });

    let provider = Provider::new("openai", settings(&server, "/v1/chat/completions", Some("k"))).unwrap();
    let err = provider.complete("prompt").await.unwrap_err();

    match err {
        ProviderError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn success_without_completion_is_malformed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"choices":[]}"#);
    });

    let provider = Provider::new("openai", settings(&server, "/v1/chat/completions", Some("k"))).unwrap();
    let err = provider.complete("prompt").await.unwrap_err();

    assert!(matches!(err, ProviderError::MalformedBody(_)));
}

#[tokio::test]
async fn invoker_retries_a_failing_backend() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(500).body("boom");
    });

    let provider = Provider::new("openai", settings(&server, "/v1/chat/completions", Some("k"))).unwrap();
    let invoker = ResilientInvoker::new(
        provider,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
    );

    let outcome = invoker.invoke("prompt").await;

    mock.assert_hits(3);
    assert!(matches!(outcome, Invocation::Exhausted { attempts: 3, .. }));
}
