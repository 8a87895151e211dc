mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{chunk, drain, next_event, relayed, request, server_error, ScriptedClient};
use pretty_assertions::assert_eq;
use rewrite_core::{LinkState, ModelsReply, PageRequest, Reply, StatusReply};
use rewrite_engine::{
    BackgroundHandle, BackgroundSettings, ClientSettings, Endpoint, LocalHub, OllamaClient,
};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn spawn(client: &Arc<ScriptedClient>, hub: &Arc<LocalHub>) -> (BackgroundHandle, JoinHandle<()>) {
    BackgroundHandle::spawn(client.clone(), hub.clone(), BackgroundSettings::default())
}

fn stream_request(model: &str) -> PageRequest {
    let request = request(model);
    PageRequest::StreamChat {
        model: request.model,
        messages: request.messages,
    }
}

/// Every command sent before this one has been handled once it returns.
async fn barrier(background: &BackgroundHandle) {
    background.query(PageRequest::GetModels).await;
}

async fn wait_for_status(
    background: &BackgroundHandle,
    wanted: impl Fn(&StatusReply) -> bool,
) -> StatusReply {
    for _ in 0..100 {
        if let Some(Reply::Status(reply)) = background.query(PageRequest::GetStatus).await {
            if wanted(&reply) {
                return reply;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status never settled");
}

#[tokio::test]
async fn models_are_listed() {
    let client = ScriptedClient::new();
    client.set_models(Ok(vec!["llama3.2:latest".into(), "qwen2.5:7b".into()]));
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);

    let reply = background.query(PageRequest::GetModels).await;
    assert_eq!(
        reply,
        Some(Reply::Models(ModelsReply::Models {
            models: vec!["llama3.2:latest".into(), "qwen2.5:7b".into()]
        }))
    );

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn model_listing_failure_is_a_reply_not_a_crash() {
    let client = ScriptedClient::new();
    client.set_models(Err(server_error("ollama is loading")));
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);

    let reply = background.query(PageRequest::GetModels).await;
    assert_eq!(
        reply,
        Some(Reply::Models(ModelsReply::Error {
            error: "ollama is loading".into()
        }))
    );

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn status_reflects_reachability() {
    let client = ScriptedClient::new();
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);

    let reply = wait_for_status(&background, |reply| reply.status == LinkState::Connected).await;
    assert_eq!(reply.error, None);

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn unreachable_server_reports_an_error_status() {
    let client = ScriptedClient::new();
    client.set_models(Err(server_error("connection refused")));
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);

    let reply = wait_for_status(&background, |reply| {
        reply.error.as_deref() == Some("connection refused")
    })
    .await;
    assert_eq!(reply.status, LinkState::Error);

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn config_updates_reach_the_client_and_bad_ones_are_ignored() {
    let client = ScriptedClient::new();
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);

    background.post(
        Some(1),
        PageRequest::UpdateConfig {
            host: "localhost".into(),
            port: "not-a-port".into(),
        },
    );
    background.post(
        Some(1),
        PageRequest::UpdateConfig {
            host: "gpu-box".into(),
            port: "11500".into(),
        },
    );
    barrier(&background).await;

    assert_eq!(
        client.endpoints(),
        vec![Endpoint::from_parts("gpu-box", 11500).unwrap()]
    );

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn stream_without_sender_tab_is_dropped() {
    let client = ScriptedClient::new();
    let _feed = client.feed("m");
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);

    background.post(None, stream_request("m"));
    barrier(&background).await;

    assert!(client.requests().is_empty());

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn events_go_only_to_the_requesting_tab() {
    let client = ScriptedClient::new();
    let feed = client.feed("m");
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);
    let mut tab_1 = hub.open_tab(1);
    let mut tab_2 = hub.open_tab(2);

    background.post(Some(2), stream_request("m"));
    feed.send(chunk("hi", false)).unwrap();
    feed.send(chunk("", true)).unwrap();

    assert_eq!(next_event(&mut tab_2).await, relayed("hi", false));
    assert_eq!(next_event(&mut tab_2).await, relayed("", true));
    assert_eq!(drain(&mut tab_1), Vec::new());

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn stop_and_tab_removal_cut_the_stream() {
    let client = ScriptedClient::new();
    let feed_1 = client.feed("one");
    let feed_2 = client.feed("two");
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);
    let mut tab_1 = hub.open_tab(1);
    let mut tab_2 = hub.open_tab(2);

    background.post(Some(1), stream_request("one"));
    background.post(Some(2), stream_request("two"));
    feed_1.send(chunk("a", false)).unwrap();
    feed_2.send(chunk("b", false)).unwrap();
    assert_eq!(next_event(&mut tab_1).await, relayed("a", false));
    assert_eq!(next_event(&mut tab_2).await, relayed("b", false));

    background.post(Some(1), PageRequest::StopStream);
    background.tab_removed(2);
    hub.close_tab(2);
    barrier(&background).await;

    let _ = feed_1.send(chunk("late", true));
    let _ = feed_2.send(chunk("late", true));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(drain(&mut tab_1), Vec::new());

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn queries_after_shutdown_get_no_reply() {
    let client = ScriptedClient::new();
    let hub = Arc::new(LocalHub::new());
    let (background, task) = spawn(&client, &hub);

    background.shutdown();
    task.await.unwrap();

    assert_eq!(background.query(PageRequest::GetStatus).await, None);
}

async fn tags_server(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

fn spawn_against(server: &MockServer) -> (BackgroundHandle, JoinHandle<()>) {
    let addr = server.address();
    let settings = ClientSettings {
        endpoint: Endpoint::from_parts(&addr.ip().to_string(), addr.port()).unwrap(),
        ..ClientSettings::default()
    };
    let client = Arc::new(OllamaClient::new(settings).unwrap());
    BackgroundHandle::spawn(client, Arc::new(LocalHub::new()), BackgroundSettings::default())
}

#[tokio::test]
async fn late_status_from_a_replaced_server_is_discarded() {
    let old = tags_server(
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({"models": []}))
            .set_delay(Duration::from_millis(800)),
    )
    .await;
    let new = tags_server(
        ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "new server is down"})),
    )
    .await;
    let (background, task) = spawn_against(&old);

    // The first check against the old server is still waiting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let addr = new.address();
    background.post(
        Some(1),
        PageRequest::UpdateConfig {
            host: addr.ip().to_string(),
            port: addr.port().to_string(),
        },
    );
    let is_new_failure = |reply: &StatusReply| {
        reply.status == LinkState::Error
            && reply
                .error
                .as_deref()
                .is_some_and(|error| error.contains("new server is down"))
    };
    wait_for_status(&background, is_new_failure).await;

    // Long enough for the old server to have answered.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    match background.query(PageRequest::GetStatus).await {
        Some(Reply::Status(reply)) => assert!(is_new_failure(&reply), "got {reply:?}"),
        other => panic!("unexpected reply {other:?}"),
    }

    background.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn shutdown_does_not_wait_for_a_hanging_status_check() {
    let server = tags_server(
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({"models": []}))
            .set_delay(Duration::from_secs(60)),
    )
    .await;
    let (background, task) = spawn_against(&server);

    tokio::time::sleep(Duration::from_millis(200)).await;
    background.shutdown();

    let stopped = tokio::time::timeout(Duration::from_secs(3), task).await;
    assert!(stopped.is_ok(), "background kept running after shutdown");
}
