//! The page side: owns the host document and the UI state, feeds messages
//! through `update`, and carries out the effects it returns.
use std::collections::VecDeque;

use rewrite_core::{
    is_blacklisted, update, Anchor, BackgroundEvent, Effect, Msg, PageRequest, UiState,
    UiViewModel,
};
use rewrite_logging::{excerpt, rewrite_debug, rewrite_info, rewrite_warn};

use crate::{capture, restore, EditorHost};

/// The page's channel to the background context.
pub trait BackgroundPort {
    fn post(&self, request: PageRequest);
}

pub struct PageRuntime<H, P> {
    host: H,
    port: P,
    state: UiState,
    enabled: bool,
}

impl<H: EditorHost, P: BackgroundPort> PageRuntime<H, P> {
    pub fn new(host: H, port: P, model: impl Into<String>) -> Self {
        Self {
            host,
            port,
            state: UiState::with_model(model),
            enabled: true,
        }
    }

    /// Like `new`, but stays inert when `page_url` is blacklisted.
    pub fn for_page(
        host: H,
        port: P,
        model: impl Into<String>,
        page_url: &str,
        blacklist: &[String],
    ) -> Self {
        let mut runtime = Self::new(host, port, model);
        if is_blacklisted(page_url, blacklist) {
            rewrite_info!("{} is blacklisted; rewrite action disabled", page_url);
            runtime.enabled = false;
        }
        runtime
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The user clicked the rewrite action with `anchor` as its position.
    pub fn trigger_action(&mut self, anchor: Option<Anchor>) {
        if !self.enabled {
            return;
        }
        let captured = capture(&self.host, anchor);
        match &captured {
            Some(c) => rewrite_debug!("captured selection {}", excerpt(&c.selected_text)),
            None => rewrite_debug!("rewrite triggered without a selection"),
        }
        self.dispatch(Msg::ActionTriggered(captured));
    }

    /// Applies `msg` and everything that follows from it.
    pub fn dispatch(&mut self, msg: Msg) {
        let mut inbox = VecDeque::from([msg]);
        while let Some(msg) = inbox.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                if let Some(follow_up) = self.run_effect(effect) {
                    inbox.push_back(follow_up);
                }
            }
        }
    }

    /// An event relayed from the background for this tab.
    pub fn handle_event(&mut self, event: BackgroundEvent) {
        let msg = match event {
            BackgroundEvent::Chunk { content, done } => Msg::ChunkReceived { content, done },
            BackgroundEvent::Error { message } => Msg::StreamFailed { message },
        };
        self.dispatch(msg);
    }

    pub fn view(&self) -> UiViewModel {
        self.state.view()
    }

    /// The view, if anything changed since the last call.
    pub fn take_render(&mut self) -> Option<UiViewModel> {
        let view = self.state.view();
        self.state.consume_dirty().then_some(view)
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    fn run_effect(&mut self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::StartStream { model, messages } => {
                self.port.post(PageRequest::StreamChat { model, messages });
                None
            }
            Effect::StopStream => {
                self.port.post(PageRequest::StopStream);
                None
            }
            Effect::Restore { text, snapshot } => {
                match restore(&mut self.host, &text, &snapshot) {
                    Ok(()) => {
                        rewrite_info!("inserted rewritten text {}", excerpt(&text));
                        None
                    }
                    Err(err) => {
                        rewrite_warn!("restore failed: {}", err);
                        Some(Msg::RestoreFailed {
                            message: err.to_string(),
                        })
                    }
                }
            }
        }
    }
}
