#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use rewrite_core::{BackgroundEvent, ChatMessage, TabId};
use rewrite_engine::{
    ChatChunk, ChatRequest, ChunkStream, Endpoint, FailureKind, ModelClient, ModelError,
    TabTransport,
};
use tokio::sync::mpsc;

pub type Feed = mpsc::UnboundedSender<Result<ChatChunk, ModelError>>;

enum Script {
    Feed(mpsc::UnboundedReceiver<Result<ChatChunk, ModelError>>),
    Fail(ModelError),
}

/// Model client whose chat streams are driven by the test, keyed by the
/// requested model name.
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, Script>>,
    models: Mutex<Result<Vec<String>, ModelError>>,
    endpoints: Mutex<Vec<Endpoint>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            models: Mutex::new(Ok(vec!["llama3.2:latest".to_string()])),
            endpoints: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// The next chat for `model` streams whatever is sent on the returned
    /// feed. Dropping the feed ends the stream.
    pub fn feed(&self, model: &str) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), Script::Feed(rx));
        tx
    }

    /// The next chat for `model` fails before streaming anything.
    pub fn fail(&self, model: &str, err: ModelError) {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), Script::Fail(err));
    }

    pub fn set_models(&self, models: Result<Vec<String>, ModelError>) {
        *self.models.lock().unwrap() = models;
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChunkStream, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().remove(&request.model);
        match script {
            Some(Script::Feed(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(Script::Fail(err)) => Err(err),
            None => Err(server_error(&format!("no script for {}", request.model))),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        self.models.lock().unwrap().clone()
    }

    fn reconfigure(&self, endpoint: Endpoint) {
        self.endpoints.lock().unwrap().push(endpoint);
    }
}

/// Transport that forwards every relayed event to the test.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<(TabId, BackgroundEvent)>,
}

impl ChannelTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(TabId, BackgroundEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl TabTransport for ChannelTransport {
    fn send(&self, tab_id: TabId, event: BackgroundEvent) {
        let _ = self.tx.send((tab_id, event));
    }
}

pub fn request(model: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::user("rewrite this")],
    }
}

pub fn chunk(content: &str, done: bool) -> Result<ChatChunk, ModelError> {
    Ok(ChatChunk {
        content: content.to_string(),
        done,
    })
}

pub fn relayed(content: &str, done: bool) -> BackgroundEvent {
    BackgroundEvent::Chunk {
        content: content.to_string(),
        done,
    }
}

pub fn server_error(message: &str) -> ModelError {
    ModelError {
        kind: FailureKind::Server,
        message: message.to_string(),
    }
}

pub async fn next_event<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within 5s")
        .expect("channel open")
}

pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}
