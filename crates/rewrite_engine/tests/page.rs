mod common;

use std::sync::{Arc, Mutex};

use common::{next_event, ScriptedClient};
use pretty_assertions::assert_eq;
use rewrite_core::{
    build_messages, Anchor, BackgroundEvent, ElementId, Msg, PageRequest, UiPhase, DEFAULT_MODEL,
};
use rewrite_engine::{
    BackgroundHandle, BackgroundPort, BackgroundSettings, LocalHub, MemoryDocument, PageRuntime,
    TabPort,
};

#[derive(Clone, Default)]
struct RecordingPort {
    posted: Arc<Mutex<Vec<PageRequest>>>,
}

impl RecordingPort {
    fn kinds(&self) -> Vec<&'static str> {
        self.posted.lock().unwrap().iter().map(PageRequest::kind).collect()
    }
}

impl BackgroundPort for RecordingPort {
    fn post(&self, request: PageRequest) {
        self.posted.lock().unwrap().push(request);
    }
}

type TestPage = PageRuntime<MemoryDocument, RecordingPort>;

fn page_with_selection(text: &str) -> (TestPage, RecordingPort, ElementId) {
    let mut doc = MemoryDocument::new();
    let field = doc.add_textarea(text);
    doc.select_field(field, 0, text.encode_utf16().count() as u32)
        .unwrap();
    let port = RecordingPort::default();
    (PageRuntime::new(doc, port.clone(), DEFAULT_MODEL), port, field)
}

fn submit(page: &mut TestPage, instruction: &str) {
    page.trigger_action(None);
    page.dispatch(Msg::InstructionChanged(instruction.to_string()));
    page.dispatch(Msg::InstructionSubmitted);
}

fn chunk(content: &str, done: bool) -> BackgroundEvent {
    BackgroundEvent::Chunk {
        content: content.to_string(),
        done,
    }
}

#[tokio::test]
async fn textarea_rewrite_end_to_end() {
    rewrite_logging::initialize_for_tests();
    let client = ScriptedClient::new();
    let feed = client.feed(DEFAULT_MODEL);
    let hub = Arc::new(LocalHub::new());
    let (background, task) =
        BackgroundHandle::spawn(client.clone(), hub.clone(), BackgroundSettings::default());
    let mut events = hub.open_tab(1);

    let mut doc = MemoryDocument::new();
    let field = doc.add_textarea("this is bad grammar");
    doc.select_field(field, 0, 19).unwrap();
    let mut page = PageRuntime::new(doc, TabPort::new(1, background.clone()), DEFAULT_MODEL);

    page.trigger_action(Some(Anchor { x: 10, y: 20 }));
    assert_eq!(page.view().phase, UiPhase::PromptOpen);
    assert_eq!(page.view().selection_preview.as_deref(), Some("this is bad grammar"));

    page.dispatch(Msg::InstructionChanged("fix grammar".into()));
    page.dispatch(Msg::InstructionSubmitted);
    assert_eq!(page.view().phase, UiPhase::Streaming);

    for (content, done) in [("This ", false), ("is ", false), ("better.", false), ("", true)] {
        feed.send(common::chunk(content, done)).unwrap();
    }
    loop {
        let event = next_event(&mut events).await;
        let done = matches!(event, BackgroundEvent::Chunk { done: true, .. });
        page.handle_event(event);
        if done {
            break;
        }
    }

    let view = page.view();
    assert_eq!(view.response, "This is better.");
    assert!(!view.receiving);
    assert!(view.can_insert);

    page.dispatch(Msg::InsertClicked);

    assert_eq!(page.view().phase, UiPhase::Hidden);
    assert_eq!(page.host().text(field).unwrap(), "This is better.");
    assert_eq!(page.host().caret(field), Some(15));

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, DEFAULT_MODEL);
    assert_eq!(
        requests[0].messages,
        build_messages("this is bad grammar", "fix grammar")
    );

    background.shutdown();
    task.await.unwrap();
}

#[test]
fn trigger_without_selection_stays_hidden() {
    let mut doc = MemoryDocument::new();
    doc.add_textarea("nothing selected");
    let port = RecordingPort::default();
    let mut page = PageRuntime::new(doc, port.clone(), DEFAULT_MODEL);

    page.trigger_action(None);

    assert_eq!(page.view().phase, UiPhase::Hidden);
    assert!(port.kinds().is_empty());
}

#[test]
fn whitespace_selection_stays_hidden() {
    let (mut page, port, _) = page_with_selection("   \n ");
    page.trigger_action(None);
    assert_eq!(page.view().phase, UiPhase::Hidden);
    assert!(port.kinds().is_empty());
}

#[test]
fn blacklisted_page_ignores_the_action() {
    let mut doc = MemoryDocument::new();
    let field = doc.add_textarea("secret");
    doc.select_field(field, 0, 6).unwrap();
    let blacklist = vec!["bank.example".to_string()];
    let mut page = PageRuntime::for_page(
        doc,
        RecordingPort::default(),
        DEFAULT_MODEL,
        "https://login.bank.example/account",
        &blacklist,
    );

    assert!(!page.is_enabled());
    page.trigger_action(None);
    assert_eq!(page.view().phase, UiPhase::Hidden);
}

#[test]
fn submit_posts_one_stream_request() {
    let (mut page, port, _) = page_with_selection("draft");
    submit(&mut page, "make it formal");

    let posted = port.posted.lock().unwrap().clone();
    assert_eq!(
        posted,
        vec![PageRequest::StreamChat {
            model: DEFAULT_MODEL.to_string(),
            messages: build_messages("draft", "make it formal"),
        }]
    );
}

#[test]
fn close_while_streaming_stops_and_leaves_text_alone() {
    let (mut page, port, field) = page_with_selection("draft");
    submit(&mut page, "shorter");
    page.handle_event(chunk("Dr", false));

    page.dispatch(Msg::CloseClicked);

    assert_eq!(port.kinds(), vec!["stream-ollama-chat", "stop-ollama-stream"]);
    assert_eq!(page.view().phase, UiPhase::Hidden);
    assert_eq!(page.host().text(field).unwrap(), "draft");
}

#[test]
fn insert_while_receiving_stops_first() {
    let (mut page, port, field) = page_with_selection("draft");
    submit(&mut page, "shorter");
    page.handle_event(chunk("Dr.", false));

    page.dispatch(Msg::InsertClicked);

    assert_eq!(port.kinds(), vec!["stream-ollama-chat", "stop-ollama-stream"]);
    assert_eq!(page.host().text(field).unwrap(), "Dr.");
}

#[test]
fn stream_error_is_shown_on_the_surface() {
    let (mut page, _port, _) = page_with_selection("draft");
    submit(&mut page, "shorter");

    page.handle_event(BackgroundEvent::Error {
        message: "network error: connection refused".into(),
    });

    let view = page.view();
    assert_eq!(view.phase, UiPhase::Streaming);
    assert!(!view.receiving);
    assert_eq!(
        view.error.as_deref(),
        Some("Ollama Error: network error: connection refused. Is Ollama running and the model available?")
    );
}

#[test]
fn failed_restore_leaves_a_notice() {
    let mut doc = MemoryDocument::new();
    let field = doc.add_textarea("draft");
    doc.select_field(field, 0, 5).unwrap();
    let mut page = PageRuntime::new(doc, RecordingPort::default(), DEFAULT_MODEL);
    submit(&mut page, "shorter");
    page.handle_event(chunk("Dr.", true));

    page.host_mut().detach(field);
    page.dispatch(Msg::InsertClicked);

    let view = page.view();
    assert_eq!(view.phase, UiPhase::Hidden);
    assert_eq!(
        view.notice.as_deref(),
        Some("Could not insert the rewritten text: the selected element is no longer on the page")
    );
}

#[test]
fn renders_are_coalesced_until_taken() {
    let (mut page, _port, _) = page_with_selection("draft");
    assert_eq!(page.take_render(), None);

    page.trigger_action(None);
    page.dispatch(Msg::InstructionChanged("a".into()));
    let view = page.take_render().expect("a render is pending");
    assert_eq!(view.instruction, "a");
    assert_eq!(page.take_render(), None);
}
