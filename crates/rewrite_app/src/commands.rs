use std::io::Read;
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;

use anyhow::{bail, Context};
use rewrite_core::{
    BackgroundEvent, Boundary, ElementId, ModelsReply, Msg, PageRequest, Reply, TabId, TextRange,
    UiPhase,
};
use rewrite_engine::{
    BackgroundHandle, BackgroundPort, BackgroundSettings, ClientSettings, ConnectionStatus,
    Endpoint, LocalHub, MemoryDocument, OllamaClient, PageRuntime, StatusMonitor, TabPort,
};
use rewrite_logging::{rewrite_debug, rewrite_info};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cli::{Cli, Command, ConfigAction};
use crate::settings::{self, Settings};

/// The command line acts as a single page.
const TAB: TabId = 1;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        settings: settings_path,
        host,
        port,
        command,
        ..
    } = cli;
    let settings_path = settings_path.unwrap_or_else(settings::default_path);
    let settings = settings::load(&settings_path);

    match command {
        Command::Config { action } => {
            configure(&settings_path, settings, action.unwrap_or(ConfigAction::Show))
        }
        Command::Status => status(connect(&settings, host, port)?).await,
        Command::Models => models(connect(&settings, host, port)?).await,
        Command::Rewrite {
            instruction,
            text,
            span,
            model,
            rich,
            url,
        } => {
            let text = match text {
                Some(text) => text,
                None => read_stdin()?,
            };
            let client = connect(&settings, host, port)?;
            let (doc, element) = open_document(&text, span, rich)?;
            let job = RewriteJob {
                instruction,
                model,
                url: url.unwrap_or_default(),
            };
            let doc = rewrite(client, &settings, doc, job).await?;
            let rewritten = doc
                .text(element)
                .context("the edited element disappeared")?;
            println!("{rewritten}");
            Ok(())
        }
    }
}

fn connect(
    settings: &Settings,
    host: Option<String>,
    port: Option<String>,
) -> anyhow::Result<Arc<OllamaClient>> {
    let mut target = settings.clone();
    if let Some(host) = host {
        target.host = host;
    }
    if let Some(port) = port {
        target.port = port;
    }
    let endpoint = target.endpoint().context("invalid model server address")?;
    rewrite_debug!("using model server {}", endpoint);
    let client = OllamaClient::new(ClientSettings {
        endpoint,
        ..ClientSettings::default()
    })?;
    Ok(Arc::new(client))
}

async fn status(client: Arc<OllamaClient>) -> anyhow::Result<()> {
    let endpoint = client.endpoint();
    let monitor = StatusMonitor::new(client);
    match monitor.refresh().await {
        ConnectionStatus::Connected => {
            println!("connected to {endpoint}");
            Ok(())
        }
        other => {
            let reason = other.to_reply().error.unwrap_or_default();
            bail!("{endpoint} is not reachable: {reason}")
        }
    }
}

async fn models(client: Arc<OllamaClient>) -> anyhow::Result<()> {
    let hub = Arc::new(LocalHub::new());
    let (background, task) = BackgroundHandle::spawn(client, hub, BackgroundSettings::default());
    let reply = background.query(PageRequest::GetModels).await;
    background.shutdown();
    task.await?;

    match reply {
        Some(Reply::Models(ModelsReply::Models { models })) => {
            for model in models {
                println!("{model}");
            }
            Ok(())
        }
        Some(Reply::Models(ModelsReply::Error { error })) => {
            bail!("could not list models: {error}")
        }
        _ => bail!("no answer from the background"),
    }
}

fn configure(path: &Path, mut settings: Settings, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("settings file: {}", path.display());
            println!("server:        {}:{}", settings.host, settings.port);
            println!("model:         {}", settings.model);
            if settings.blacklist.is_empty() {
                println!("blacklist:     (empty)");
            }
            for entry in &settings.blacklist {
                println!("blacklist:     {entry}");
            }
            return Ok(());
        }
        ConfigAction::Server { host, port } => {
            let endpoint = Endpoint::parse(&host, &port).context("invalid model server address")?;
            settings.host = endpoint.host().to_string();
            settings.port = endpoint.port().to_string();
        }
        ConfigAction::Model { name } => {
            let name = name.trim();
            if name.is_empty() {
                bail!("model name is empty");
            }
            settings.model = name.to_string();
        }
        ConfigAction::Block { entry } => {
            if !settings.block(&entry) {
                println!("{} is already blocked", entry.trim());
                return Ok(());
            }
        }
        ConfigAction::Unblock { entry } => {
            if !settings.unblock(&entry) {
                bail!("{} is not blocked", entry.trim());
            }
        }
    }
    settings::save(path, &settings)?;
    Ok(())
}

fn read_stdin() -> anyhow::Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("could not read text from stdin")?;
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    Ok(text)
}

/// A document holding `text` with `span` (or everything) selected.
fn open_document(
    text: &str,
    span: Option<(u32, u32)>,
    rich: bool,
) -> anyhow::Result<(MemoryDocument, ElementId)> {
    let len = text.encode_utf16().count() as u32;
    let (start, end) = span.unwrap_or((0, len));
    if end > len {
        bail!("span ends at {end} but the text is only {len} UTF-16 units long");
    }

    let mut doc = MemoryDocument::new();
    let element = if rich {
        let root = doc.add_contenteditable(&[text]);
        let node = doc
            .text_nodes(root)
            .first()
            .copied()
            .context("rich document has no text node")?;
        doc.select_text(TextRange::new(
            Boundary::new(node, start),
            Boundary::new(node, end),
        ))?;
        root
    } else {
        let field = doc.add_textarea(text);
        doc.select_field(field, start, end)?;
        field
    };
    Ok((doc, element))
}

struct RewriteJob {
    instruction: String,
    model: Option<String>,
    url: String,
}

async fn rewrite(
    client: Arc<OllamaClient>,
    settings: &Settings,
    doc: MemoryDocument,
    job: RewriteJob,
) -> anyhow::Result<MemoryDocument> {
    let hub = Arc::new(LocalHub::new());
    let (background, task) =
        BackgroundHandle::spawn(client, hub.clone(), BackgroundSettings::default());
    let mut events = hub.open_tab(TAB);

    let mut page = PageRuntime::for_page(
        doc,
        TabPort::new(TAB, background.clone()),
        settings.model.clone(),
        &job.url,
        &settings.blacklist,
    );
    if let Some(model) = job.model {
        page.dispatch(Msg::ModelSelected(model));
    }
    let outcome = drive(&mut page, &mut events, &job.instruction).await;

    background.tab_removed(TAB);
    hub.close_tab(TAB);
    background.shutdown();
    task.await?;

    outcome?;
    Ok(page.into_host())
}

/// Runs one prompt-to-insert cycle on `page`, echoing output to stderr as
/// it arrives. Ctrl-C stops the generation and keeps what arrived so far.
async fn drive<P: BackgroundPort>(
    page: &mut PageRuntime<MemoryDocument, P>,
    events: &mut UnboundedReceiver<BackgroundEvent>,
    instruction: &str,
) -> anyhow::Result<()> {
    if !page.is_enabled() {
        bail!("rewriting is disabled for this page");
    }
    page.trigger_action(None);
    if page.view().phase != UiPhase::PromptOpen {
        bail!("nothing to rewrite: the selection is empty");
    }
    page.dispatch(Msg::InstructionChanged(instruction.to_string()));
    page.dispatch(Msg::InstructionSubmitted);
    if page.view().phase != UiPhase::Streaming {
        page.dispatch(Msg::CloseClicked);
        bail!("the instruction is empty");
    }

    let mut interrupted = pin!(tokio::signal::ctrl_c());
    let mut shown = 0;
    while page.view().receiving {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => page.handle_event(event),
                None => bail!("the background closed the connection"),
            },
            _ = &mut interrupted => {
                rewrite_info!("interrupted; stopping generation");
                page.dispatch(Msg::StopClicked);
            }
        }
        if let Some(view) = page.take_render() {
            eprint!("{}", &view.response[shown..]);
            shown = view.response.len();
        }
    }
    eprintln!();

    let view = page.view();
    if let Some(error) = view.error {
        page.dispatch(Msg::CloseClicked);
        bail!(error);
    }
    if !view.can_insert {
        page.dispatch(Msg::CloseClicked);
        bail!("the model returned no text");
    }
    page.dispatch(Msg::InsertClicked);
    if let Some(notice) = page.view().notice {
        bail!(notice);
    }
    Ok(())
}
