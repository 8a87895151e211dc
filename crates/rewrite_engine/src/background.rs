use std::sync::Arc;
use std::time::Duration;

use rewrite_core::{ModelsReply, PageRequest, Reply, TabId};
use rewrite_logging::{rewrite_debug, rewrite_error, rewrite_info, rewrite_warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ChatRequest, Endpoint, ModelClient, SessionController, StatusMonitor, TabTransport};

#[derive(Debug, Clone)]
pub struct BackgroundSettings {
    pub status_refresh_interval: Duration,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            status_refresh_interval: Duration::from_secs(30),
        }
    }
}

enum BackgroundCommand {
    Request {
        sender: Option<TabId>,
        request: PageRequest,
        reply: Option<oneshot::Sender<Reply>>,
    },
    TabRemoved(TabId),
}

/// Cloneable handle to the background context. Commands are handled one at
/// a time, in the order they were sent.
#[derive(Clone)]
pub struct BackgroundHandle {
    cmd_tx: mpsc::UnboundedSender<BackgroundCommand>,
    shutdown: CancellationToken,
}

impl BackgroundHandle {
    /// Starts the background loop and its status refresher on the current
    /// Tokio runtime.
    pub fn spawn(
        client: Arc<dyn ModelClient>,
        transport: Arc<dyn TabTransport>,
        settings: BackgroundSettings,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let background = Background {
            sessions: SessionController::new(Arc::clone(&client), transport),
            status: StatusMonitor::new(Arc::clone(&client)),
            client,
        };
        let refresher = background
            .status
            .spawn_periodic(settings.status_refresh_interval, shutdown.child_token());

        let loop_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            rewrite_info!("background listening for page requests");
            loop {
                let command = tokio::select! {
                    biased;
                    _ = loop_shutdown.cancelled() => break,
                    command = cmd_rx.recv() => command,
                };
                let Some(command) = command else {
                    break;
                };
                background.handle(command);
            }
            background.sessions.stop_all();
            loop_shutdown.cancel();
            let _ = refresher.await;
            rewrite_info!("background stopped");
        });

        (Self { cmd_tx, shutdown }, task)
    }

    /// Fire-and-forget request from `sender`.
    pub fn post(&self, sender: Option<TabId>, request: PageRequest) {
        self.send(BackgroundCommand::Request {
            sender,
            request,
            reply: None,
        });
    }

    /// Sends a request and waits for its reply. Requests that have no reply
    /// are posted without a sender and yield `None`.
    pub async fn query(&self, request: PageRequest) -> Option<Reply> {
        if !request.expects_reply() {
            self.post(None, request);
            return None;
        }
        let (tx, rx) = oneshot::channel();
        self.send(BackgroundCommand::Request {
            sender: None,
            request,
            reply: Some(tx),
        });
        rx.await.ok()
    }

    /// Host notification that a tab was closed.
    pub fn tab_removed(&self, tab_id: TabId) {
        self.send(BackgroundCommand::TabRemoved(tab_id));
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, command: BackgroundCommand) {
        if self.cmd_tx.send(command).is_err() {
            rewrite_warn!("background is not running; command dropped");
        }
    }
}

struct Background {
    client: Arc<dyn ModelClient>,
    sessions: SessionController,
    status: StatusMonitor,
}

impl Background {
    fn handle(&self, command: BackgroundCommand) {
        match command {
            BackgroundCommand::Request {
                sender,
                request,
                reply,
            } => self.handle_request(sender, request, reply),
            BackgroundCommand::TabRemoved(tab_id) => self.sessions.tab_removed(tab_id),
        }
    }

    fn handle_request(
        &self,
        sender: Option<TabId>,
        request: PageRequest,
        reply: Option<oneshot::Sender<Reply>>,
    ) {
        rewrite_debug!("request {} from tab {:?}", request.kind(), sender);
        match request {
            PageRequest::StreamChat { model, messages } => {
                let Some(tab_id) = sender else {
                    rewrite_error!("stream-ollama-chat received without a sender tab");
                    return;
                };
                // Detached: the session table tracks the task from here on.
                drop(
                    self.sessions
                        .start_stream(tab_id, ChatRequest { model, messages }),
                );
            }
            PageRequest::StopStream => {
                let Some(tab_id) = sender else {
                    rewrite_error!("stop-ollama-stream received without a sender tab");
                    return;
                };
                self.sessions.stop_stream(tab_id);
            }
            PageRequest::GetStatus => {
                let status = self.status.current();
                if status == crate::ConnectionStatus::Unknown {
                    self.refresh_status();
                }
                respond(reply, Reply::Status(status.to_reply()));
            }
            PageRequest::GetModels => {
                let client = Arc::clone(&self.client);
                tokio::spawn(async move {
                    let answer = match client.list_models().await {
                        Ok(models) => ModelsReply::Models { models },
                        Err(err) => {
                            rewrite_warn!("listing models failed: {}", err);
                            ModelsReply::Error {
                                error: err.to_string(),
                            }
                        }
                    };
                    respond(reply, Reply::Models(answer));
                });
            }
            PageRequest::UpdateConfig { host, port } => match Endpoint::parse(&host, &port) {
                Ok(endpoint) => {
                    self.client.reconfigure(endpoint);
                    self.status.invalidate();
                    self.refresh_status();
                }
                Err(err) => {
                    rewrite_warn!("ignoring model server config {}:{}: {}", host, port, err);
                }
            },
        }
    }

    fn refresh_status(&self) {
        let status = self.status.clone();
        tokio::spawn(async move {
            status.refresh().await;
        });
    }
}

fn respond(reply: Option<oneshot::Sender<Reply>>, answer: Reply) {
    if let Some(reply) = reply {
        if reply.send(answer).is_err() {
            rewrite_debug!("requester went away before the reply");
        }
    }
}
