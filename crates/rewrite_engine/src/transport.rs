use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rewrite_core::{BackgroundEvent, PageRequest, TabId};
use rewrite_logging::rewrite_debug;
use tokio::sync::mpsc;

use crate::{BackgroundHandle, BackgroundPort, TabTransport};

/// In-process message routing between the background and its pages.
#[derive(Debug, Default)]
pub struct LocalHub {
    tabs: Mutex<HashMap<TabId, mpsc::UnboundedSender<BackgroundEvent>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a page and returns the receiving end of its event channel.
    /// Re-opening a tab replaces its previous channel.
    pub fn open_tab(&self, tab_id: TabId) -> mpsc::UnboundedReceiver<BackgroundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tabs().insert(tab_id, tx);
        rx
    }

    pub fn close_tab(&self, tab_id: TabId) -> bool {
        self.tabs().remove(&tab_id).is_some()
    }

    pub fn is_open(&self, tab_id: TabId) -> bool {
        self.tabs().contains_key(&tab_id)
    }

    fn tabs(&self) -> MutexGuard<'_, HashMap<TabId, mpsc::UnboundedSender<BackgroundEvent>>> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TabTransport for LocalHub {
    fn send(&self, tab_id: TabId, event: BackgroundEvent) {
        let mut tabs = self.tabs();
        let Some(tx) = tabs.get(&tab_id) else {
            rewrite_debug!("tab={} not open; event dropped", tab_id);
            return;
        };
        if tx.send(event).is_err() {
            rewrite_debug!("tab={} receiver gone; closing", tab_id);
            tabs.remove(&tab_id);
        }
    }
}

/// A page's sending side: every request is stamped with its tab id.
#[derive(Clone)]
pub struct TabPort {
    tab_id: TabId,
    background: BackgroundHandle,
}

impl TabPort {
    pub fn new(tab_id: TabId, background: BackgroundHandle) -> Self {
        Self { tab_id, background }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }
}

impl BackgroundPort for TabPort {
    fn post(&self, request: PageRequest) {
        self.background.post(Some(self.tab_id), request);
    }
}
