//! End-to-end generation tests against a mock completions endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cyoa::config::CyoaConfig;
use cyoa::engine::generate::generate_options;
use cyoa::engine::{Engine, OptionsSink};
use cyoa::error::CyoaError;
use cyoa::types::{ChatSnapshot, ConversationTurn, EngineOutput, HostEvent};

fn test_config(endpoint: &str) -> CyoaConfig {
    let mut config = CyoaConfig::default();
    config.enabled = true;
    config.api_endpoint = endpoint.to_string();
    config.api_key = "sk-test".into();
    config
}

fn test_snapshot() -> ChatSnapshot {
    ChatSnapshot {
        history: vec![
            ConversationTurn {
                is_user: true,
                text: "I open the door.".into(),
            },
            ConversationTurn {
                is_user: false,
                text: "The hallway beyond is dark.".into(),
            },
        ],
        character_name: "Narrator".into(),
        user_name: "Ana".into(),
        ..Default::default()
    }
}

fn options_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"content": content}}]
    }))
}

#[tokio::test]
async fn generates_options_from_a_mock_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "temperature": 0.8,
            "max_tokens": 500
        })))
        .respond_with(options_response(r#"["I light a torch.", "I listen first.", "I turn back."]"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let set = generate_options(&config, 7, &test_snapshot()).await.unwrap();

    assert_eq!(set.message_id, 7);
    assert_eq!(
        set.options,
        vec!["I light a torch.", "I listen first.", "I turn back."]
    );
}

#[tokio::test]
async fn prose_wrapped_arrays_still_parse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(options_response(r#"Sure! Here you go: ["a","b"] Hope that helps."#))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let set = generate_options(&config, 1, &test_snapshot()).await.unwrap();
    assert_eq!(set.options, vec!["a", "b"]);
}

#[tokio::test]
async fn http_errors_become_network_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let err = generate_options(&config, 1, &test_snapshot()).await.unwrap_err();
    assert!(matches!(err, CyoaError::Network(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn unparseable_content_becomes_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(options_response("I cannot produce options right now."))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let err = generate_options(&config, 1, &test_snapshot()).await.unwrap_err();
    assert!(matches!(err, CyoaError::Parse(_)));
}

#[tokio::test]
async fn missing_content_is_fatal_for_the_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let err = generate_options(&config, 1, &test_snapshot()).await.unwrap_err();
    assert!(err.to_string().contains("empty response"));
}

// -- Engine-level behavior --------------------------------------------------

#[derive(Default)]
struct CollectingSink {
    outputs: Mutex<Vec<EngineOutput>>,
}

#[async_trait]
impl OptionsSink for CollectingSink {
    async fn emit(&self, output: EngineOutput) -> anyhow::Result<()> {
        self.outputs.lock().await.push(output);
        Ok(())
    }
}

async fn wait_for_outputs(sink: &CollectingSink, count: usize) -> Vec<EngineOutput> {
    for _ in 0..100 {
        {
            let outputs = sink.outputs.lock().await;
            if outputs.len() >= count {
                return outputs.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {count} engine outputs");
}

#[tokio::test]
async fn engine_emits_options_then_clears_on_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(options_response(r#"["a","b","c"]"#))
        .mount(&server)
        .await;

    let sink = Arc::new(CollectingSink::default());
    let dyn_sink: Arc<dyn OptionsSink> = sink.clone();
    let engine = Engine::new(test_config(&server.uri()), dyn_sink);

    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(engine.run(rx, cancel));

    tx.send(HostEvent::CharacterMessageRendered {
        message_id: 42,
        snapshot: test_snapshot(),
    })
    .await
    .unwrap();

    let outputs = wait_for_outputs(&sink, 1).await;
    assert!(matches!(
        &outputs[0],
        EngineOutput::Options { message_id: 42, options, .. } if options.len() == 3
    ));

    tx.send(HostEvent::UserMessageRendered).await.unwrap();
    let outputs = wait_for_outputs(&sink, 2).await;
    assert!(matches!(outputs[1], EngineOutput::ClearOptions));

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn retrigger_for_the_same_message_supersedes_the_pending_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(options_response(r#"["x"]"#))
        .mount(&server)
        .await;

    let sink = Arc::new(CollectingSink::default());
    let dyn_sink: Arc<dyn OptionsSink> = sink.clone();
    let engine = Engine::new(test_config(&server.uri()), dyn_sink);

    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(engine.run(rx, CancellationToken::new()));

    // Two triggers for the same message id, well inside the settle delay.
    for _ in 0..2 {
        tx.send(HostEvent::CharacterMessageRendered {
            message_id: 9,
            snapshot: test_snapshot(),
        })
        .await
        .unwrap();
    }

    let outputs = wait_for_outputs(&sink, 1).await;
    // The first generation was superseded before it emitted anything.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sink.outputs.lock().await.len(), outputs.len());
    assert!(matches!(outputs[0], EngineOutput::Options { message_id: 9, .. }));

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn disabled_engine_ignores_render_events() {
    let sink = Arc::new(CollectingSink::default());
    let dyn_sink: Arc<dyn OptionsSink> = sink.clone();

    let mut config = test_config("http://127.0.0.1:1");
    config.enabled = false;
    let engine = Engine::new(config, dyn_sink);

    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(engine.run(rx, CancellationToken::new()));

    tx.send(HostEvent::CharacterMessageRendered {
        message_id: 1,
        snapshot: test_snapshot(),
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(sink.outputs.lock().await.is_empty());

    drop(tx);
    handle.await.unwrap().unwrap();
}
