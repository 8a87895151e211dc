//! Per-tab streaming sessions.
//!
//! A tab has at most one live session. Starting a new one cancels the old
//! one first, and every session removes its own table entry when its task
//! ends, however it ends.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use rewrite_core::{BackgroundEvent, TabId};
use rewrite_logging::{excerpt, rewrite_debug, rewrite_info, rewrite_trace, rewrite_warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ChatRequest, FailureKind, ModelClient, ModelError};

/// Delivers background events to one tab's page.
pub trait TabTransport: Send + Sync {
    fn send(&self, tab_id: TabId, event: BackgroundEvent);
}

type SessionId = u64;
type SessionTable = Arc<Mutex<HashMap<TabId, LiveSession>>>;

#[derive(Debug)]
struct LiveSession {
    session_id: SessionId,
    token: CancellationToken,
}

pub struct SessionController {
    client: Arc<dyn ModelClient>,
    transport: Arc<dyn TabTransport>,
    sessions: SessionTable,
    next_session_id: AtomicU64,
}

impl SessionController {
    pub fn new(client: Arc<dyn ModelClient>, transport: Arc<dyn TabTransport>) -> Self {
        Self {
            client,
            transport,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Starts streaming `request` to `tab_id`, superseding any session the
    /// tab already has. The old session is cancelled before this returns, so
    /// it cannot relay anything once the new one starts.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_stream(&self, tab_id: TabId, request: ChatRequest) -> JoinHandle<()> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let previous = lock(&self.sessions).insert(
            tab_id,
            LiveSession {
                session_id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            rewrite_info!(
                "tab={} session {} superseded by {}",
                tab_id,
                previous.session_id,
                session_id
            );
        }
        rewrite_info!(
            "tab={} session {} started model={}",
            tab_id,
            session_id,
            request.model
        );

        let guard = SessionGuard {
            sessions: Arc::clone(&self.sessions),
            tab_id,
            session_id,
        };
        let relay = Relay {
            transport: Arc::clone(&self.transport),
            tab_id,
            session_id,
            token,
        };
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            let _guard = guard;
            relay.run(client.as_ref(), request).await;
        })
    }

    /// Cancels the tab's session, if any. Returns whether one was live.
    pub fn stop_stream(&self, tab_id: TabId) -> bool {
        match lock(&self.sessions).remove(&tab_id) {
            Some(session) => {
                session.token.cancel();
                rewrite_info!("tab={} session {} stopped", tab_id, session.session_id);
                true
            }
            None => {
                rewrite_trace!("tab={} stop ignored: no live session", tab_id);
                false
            }
        }
    }

    /// The host closed the tab; nothing may be relayed to it any more.
    pub fn tab_removed(&self, tab_id: TabId) {
        if self.stop_stream(tab_id) {
            rewrite_debug!("tab={} closed with a live session", tab_id);
        }
    }

    /// Cancels every live session.
    pub fn stop_all(&self) {
        let drained: Vec<_> = lock(&self.sessions).drain().collect();
        for (tab_id, session) in drained {
            session.token.cancel();
            rewrite_info!("tab={} session {} stopped on shutdown", tab_id, session.session_id);
        }
    }

    pub fn is_streaming(&self, tab_id: TabId) -> bool {
        lock(&self.sessions).contains_key(&tab_id)
    }

    pub fn live_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn lock(sessions: &SessionTable) -> MutexGuard<'_, HashMap<TabId, LiveSession>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the session's table entry when its task finishes, unless a newer
/// session has already taken the slot.
struct SessionGuard {
    sessions: SessionTable,
    tab_id: TabId,
    session_id: SessionId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut table = lock(&self.sessions);
        let owns_slot = table
            .get(&self.tab_id)
            .is_some_and(|live| live.session_id == self.session_id);
        if owns_slot {
            table.remove(&self.tab_id);
        }
        rewrite_debug!(
            "tab={} session {} released",
            self.tab_id,
            self.session_id
        );
    }
}

struct Relay {
    transport: Arc<dyn TabTransport>,
    tab_id: TabId,
    session_id: SessionId,
    token: CancellationToken,
}

impl Relay {
    async fn run(&self, client: &dyn ModelClient, request: ChatRequest) {
        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => return self.log_cancelled(),
            opened = client.chat(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => return self.fail(&err),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return self.log_cancelled(),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    let done = chunk.done;
                    rewrite_trace!(
                        "tab={} session {} chunk {:?} done={}",
                        self.tab_id,
                        self.session_id,
                        excerpt(&chunk.content),
                        done
                    );
                    let relayed = self.emit(BackgroundEvent::Chunk {
                        content: chunk.content,
                        done,
                    });
                    if !relayed {
                        return self.log_cancelled();
                    }
                    if done {
                        rewrite_info!(
                            "tab={} session {} completed",
                            self.tab_id,
                            self.session_id
                        );
                        return;
                    }
                }
                Some(Err(err)) => return self.fail(&err),
                None => {
                    let err = ModelError::new(
                        FailureKind::Malformed,
                        "stream ended before the model finished",
                    );
                    return self.fail(&err);
                }
            }
        }
    }

    /// Relays `event` unless the session was cancelled. Returns false when
    /// the event was dropped.
    fn emit(&self, event: BackgroundEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.transport.send(self.tab_id, event);
        true
    }

    fn fail(&self, err: &ModelError) {
        rewrite_warn!(
            "tab={} session {} failed: {}",
            self.tab_id,
            self.session_id,
            err
        );
        if !self.emit(BackgroundEvent::Error {
            message: err.to_string(),
        }) {
            self.log_cancelled();
        }
    }

    fn log_cancelled(&self) {
        rewrite_debug!(
            "tab={} session {} cancelled; relay stopped",
            self.tab_id,
            self.session_id
        );
    }
}
