use crate::state::Surface;
use crate::{build_messages, Effect, Msg, UiState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: UiState, msg: Msg) -> (UiState, Vec<Effect>) {
    let effects = match msg {
        Msg::ActionTriggered(capture) => {
            let Some(capture) = capture.filter(|c| !c.selected_text.trim().is_empty()) else {
                return (state, Vec::new());
            };
            // A new surface always replaces the old one; never stack them.
            let effects = teardown(state.take_surface());
            state.set_notice(None);
            state.open_prompt(capture);
            effects
        }
        Msg::InstructionChanged(text) => {
            if let Surface::Prompt { instruction, .. } = &mut state.surface {
                if *instruction != text {
                    *instruction = text;
                    state.mark_dirty();
                }
            }
            Vec::new()
        }
        Msg::InstructionSubmitted => {
            let ready = matches!(
                &state.surface,
                Surface::Prompt { instruction, .. } if !instruction.trim().is_empty()
            );
            if !ready {
                return (state, Vec::new());
            }
            let Surface::Prompt {
                capture,
                instruction,
            } = state.take_surface()
            else {
                return (state, Vec::new());
            };
            let messages = build_messages(&capture.selected_text, &instruction);
            state.open_stream(capture);
            vec![Effect::StartStream {
                model: state.model().to_string(),
                messages,
            }]
        }
        Msg::ChunkReceived { content, done } => {
            if let Some(stream) = state.stream_mut().filter(|stream| stream.receiving) {
                stream.text.push_str(&content);
                if done {
                    stream.receiving = false;
                }
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::StreamFailed { message } => {
            if let Some(stream) = state.stream_mut().filter(|stream| stream.receiving) {
                stream.receiving = false;
                stream.error = Some(message);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::StopClicked => match state.stream_mut().filter(|stream| stream.receiving) {
            Some(stream) => {
                stream.receiving = false;
                state.mark_dirty();
                vec![Effect::StopStream]
            }
            None => Vec::new(),
        },
        Msg::InsertClicked => {
            let has_text = state.response().is_some_and(|text| !text.is_empty());
            if !has_text {
                return (state, Vec::new());
            }
            let Surface::Streaming { capture, stream } = state.take_surface() else {
                return (state, Vec::new());
            };
            let mut effects = Vec::with_capacity(2);
            if stream.receiving {
                effects.push(Effect::StopStream);
            }
            effects.push(Effect::Restore {
                text: stream.text,
                snapshot: capture.snapshot,
            });
            effects
        }
        Msg::CloseClicked => teardown(state.take_surface()),
        Msg::RestoreFailed { message } => {
            state.set_notice(Some(format!(
                "Could not insert the rewritten text: {message}"
            )));
            Vec::new()
        }
        Msg::ModelSelected(model) => {
            let model = model.trim();
            if !model.is_empty() && model != state.model() {
                state.set_model(model.to_string());
            }
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// Effects needed to discard a surface without restoring its snapshot.
fn teardown(surface: Surface) -> Vec<Effect> {
    match surface {
        Surface::Streaming { stream, .. } if stream.receiving => vec![Effect::StopStream],
        _ => Vec::new(),
    }
}
