use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use parley::knowledge::{AnyDocumentExtractor, DocumentExtractor, split_text};
use parley::voice::{ChannelCapture, ClipOutput};
use parley::voices::{VOICES, voice_by_id, voices_for_language};
use parley::{
    Capabilities, ChunkStore, Config, ConversationOrchestrator, PromptComposer, SessionState,
    TurnOutcome, TurnSettings, embedder_for,
};

/// Parley - Spoken conversations grounded in your documents
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to the assistant; each typed line is one utterance
    Chat {
        /// Voice to speak with
        #[arg(long, env = "PARLEY_VOICE")]
        voice: Option<String>,
        /// Documents to index before the first turn
        #[arg(short, long)]
        document: Vec<PathBuf>,
    },
    /// Show how a document is chunked
    Ingest {
        /// Document to chunk
        file: PathBuf,
    },
    /// Search a document for passages relevant to a query
    Search {
        /// Document to index
        file: PathBuf,
        /// Query text
        query: String,
        /// Passages to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// List the voice catalog
    Voices {
        /// Only voices for this language tag (e.g. "es-ES")
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Print the system instruction sent with each turn
    Prompt {
        /// Voice whose profile drives the persona fallback
        #[arg(long)]
        voice: Option<String>,
        /// Context passages to include
        #[arg(short, long)]
        context: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config.llm, ?config.limits, ?config.knowledge, "loaded configuration");

    match cli.command.unwrap_or(Command::Chat {
        voice: None,
        document: Vec::new(),
    }) {
        Command::Chat { voice, document } => chat(config, voice, &document).await,
        Command::Ingest { file } => ingest(&config, &file).await,
        Command::Search { file, query, top_k } => search(&config, &file, &query, top_k).await,
        Command::Voices { language } => {
            list_voices(language.as_deref());
            Ok(())
        }
        Command::Prompt { voice, context } => print_prompt(&config, voice.as_deref(), &context),
    }
}

/// Interactive turn loop
async fn chat(
    mut config: Config,
    voice: Option<String>,
    documents: &[PathBuf],
) -> anyhow::Result<()> {
    if let Some(voice) = voice {
        config.voice.default_voice = voice;
        config.validate()?;
    }

    let capture = Arc::new(ChannelCapture::default());
    let utterances = capture.sender();
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
    let audio = Arc::new(ClipOutput::new(config.voice.player.as_deref(), finished_tx));

    let store = Arc::new(ChunkStore::new(
        embedder_for(&config),
        config.knowledge.chunking()?,
    ));
    let caps = Capabilities::openai(&config, capture, audio);
    let orchestrator =
        ConversationOrchestrator::new(caps, store, TurnSettings::from_config(&config))?;

    let preload = config.knowledge.preload_path.iter().chain(documents);
    for path in preload {
        match orchestrator.add_document_from_path(path).await {
            Ok(doc) => println!("indexed {} ({} chunks)", doc.name, doc.chunk_count),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to index document");
            }
        }
    }

    if config.api_key.is_none() {
        println!("OPENAI_API_KEY is not set; turns will fail until it is configured.");
    }
    for message in orchestrator.messages() {
        println!("{}: {}", message.role.as_str(), message.content);
    }
    println!("Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !run_command(&orchestrator, command).await {
                break;
            }
            continue;
        }

        if orchestrator.state() == SessionState::Error {
            orchestrator.stop();
        }

        utterances.send(line.to_string()).await?;
        match orchestrator.start_turn().await? {
            TurnOutcome::Speaking { clip_id, reply, .. } => {
                println!("{}: {reply}", orchestrator.voice().name);
                wait_for_playback(&orchestrator, &mut finished_rx, clip_id).await;
            }
            TurnOutcome::Failed(error) => {
                println!("! {}", error.message);
                tracing::debug!(kind = ?error.kind, detail = %error.detail, "turn failed");
            }
            TurnOutcome::Superseded => {}
        }
    }

    orchestrator.stop();
    Ok(())
}

/// Block until `clip_id` finishes or the user interrupts playback
async fn wait_for_playback(
    orchestrator: &ConversationOrchestrator,
    finished: &mut mpsc::UnboundedReceiver<Uuid>,
    clip_id: Uuid,
) {
    loop {
        tokio::select! {
            done = finished.recv() => match done {
                Some(id) if orchestrator.audio_finished(id) || id == clip_id => return,
                Some(_) => {}
                None => return,
            },
            _ = tokio::signal::ctrl_c() => {
                orchestrator.stop();
                return;
            }
        }
    }
}

/// Handle a slash command; returns false to quit
async fn run_command(orchestrator: &ConversationOrchestrator, command: &str) -> bool {
    let (name, arg) = command
        .split_once(' ')
        .map_or((command, ""), |(n, a)| (n, a.trim()));

    match name {
        "quit" | "exit" => return false,
        "stop" => orchestrator.stop(),
        "clear" => {
            orchestrator.clear_history();
            println!("history cleared");
        }
        "context" => match orchestrator.last_context() {
            Some(context) => println!("{context}"),
            None => println!("(no context)"),
        },
        "error" => match orchestrator.last_error() {
            Some(error) => println!("{:?}: {}\n{}", error.kind, error.message, error.detail),
            None => println!("(no error)"),
        },
        "docs" => {
            for doc in orchestrator.documents() {
                println!(
                    "{}  {}  {} bytes  {} chunks",
                    doc.id, doc.name, doc.size_bytes, doc.chunk_count
                );
            }
        }
        "add" => match orchestrator.add_document_from_path(Path::new(arg)).await {
            Ok(doc) => println!("indexed {} ({} chunks)", doc.name, doc.chunk_count),
            Err(e) => println!("! {}: {e}", e.user_message()),
        },
        "remove" => match arg.parse::<Uuid>() {
            Ok(id) => match orchestrator.remove_document(id) {
                Ok(()) => println!("removed {id}"),
                Err(e) => println!("! {e}"),
            },
            Err(e) => println!("! invalid document id: {e}"),
        },
        "voice" => match orchestrator.set_voice(arg) {
            Ok(()) => println!("voice set to {}", orchestrator.voice().name),
            Err(e) => println!("! {e}"),
        },
        "limits" => {
            let limits = orchestrator.limits();
            println!(
                "enabled={} max_words={} max_characters={} max_tokens={}",
                limits.enabled, limits.max_words, limits.max_characters, limits.max_tokens
            );
        }
        _ => println!(
            "commands: /stop /clear /context /error /docs /add <path> /remove <id> \
             /voice <id> /limits /quit"
        ),
    }
    true
}

async fn read_document(config: &Config, file: &Path) -> anyhow::Result<(String, usize, String)> {
    let bytes = tokio::fs::read(file).await?;
    let name = file.display().to_string();
    let text = AnyDocumentExtractor::new(config.knowledge.max_document_bytes)
        .extract(&bytes, &name)
        .await?;
    Ok((name, bytes.len(), text))
}

/// Print the chunks a document would produce
async fn ingest(config: &Config, file: &Path) -> anyhow::Result<()> {
    let (name, size, text) = read_document(config, file).await?;
    let spans = split_text(&text, config.knowledge.chunking()?);

    println!("{name}: {size} bytes, {} chunks", spans.len());
    for (i, span) in spans.iter().enumerate() {
        let preview: String = span.text.chars().take(60).collect();
        println!("[{i}] {}..{}  {}", span.start, span.end, preview.replace('\n', " "));
    }
    Ok(())
}

/// Index a document and print the best passages for `query`
async fn search(
    config: &Config,
    file: &Path,
    query: &str,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let (name, size, text) = read_document(config, file).await?;
    let store = ChunkStore::new(embedder_for(config), config.knowledge.chunking()?);
    store.ingest(&name, size, &text).await?;

    let result = store
        .search(query, top_k.unwrap_or(config.knowledge.top_k))
        .await?;
    if result.is_empty() {
        println!("no matching passages");
    }
    for scored in &result.chunks {
        println!(
            "{:.3}  [{}..{}]  {}",
            scored.score,
            scored.chunk.start,
            scored.chunk.end,
            scored.chunk.text.replace('\n', " ")
        );
    }
    Ok(())
}

fn list_voices(language: Option<&str>) {
    let voices: Vec<_> = match language {
        Some(tag) => voices_for_language(tag).collect(),
        None => VOICES.iter().collect(),
    };

    for voice in voices {
        let star = if voice.recommended { "*" } else { " " };
        println!(
            "{star} {:<8} {:<8} {:<6} {:?}  {}",
            voice.id, voice.name, voice.language, voice.gender, voice.description
        );
    }
}

fn print_prompt(config: &Config, voice: Option<&str>, context: &[String]) -> anyhow::Result<()> {
    let voice_id = voice.unwrap_or(&config.voice.default_voice);
    let profile =
        voice_by_id(voice_id).ok_or_else(|| anyhow::anyhow!("unknown voice: {voice_id}"))?;

    let composer = PromptComposer::new(
        config.persona.active_text(),
        config.voice.language.clone(),
        config.limits.max_words,
        config.knowledge.enabled,
    );
    let passages: Vec<&str> = context.iter().map(String::as_str).collect();
    println!("{}", composer.compose(profile, &passages));
    Ok(())
}
