//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use parley::knowledge::{ChunkStore, ChunkingConfig, HashEmbedder, PlainTextExtractor};
use parley::voice::{AudioHandle, AudioOutput, Capture, CaptureError, PlaybackError, Synthesizer};
use parley::{
    Capabilities, ChatMessage, ConversationOrchestrator, GenerationOptions, Generator,
    ProviderError, TurnSettings,
};

/// One scripted capture result
#[derive(Debug, Clone)]
pub enum Heard {
    Say(String),
    Fail(CaptureError),
    /// Never hears anything; waits for cancellation
    Silence,
}

/// Capture that replays a script, then stays silent
#[derive(Default)]
pub struct ScriptedCapture {
    script: Mutex<VecDeque<Heard>>,
    pub cancelled: AtomicUsize,
}

impl ScriptedCapture {
    pub fn new(script: impl IntoIterator<Item = Heard>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            cancelled: AtomicUsize::new(0),
        }
    }

    pub fn saying(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| Heard::Say((*l).to_string())))
    }
}

#[async_trait]
impl Capture for ScriptedCapture {
    async fn capture(
        &self,
        _timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<String, CaptureError> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Heard::Say(text)) => Ok(text),
            Some(Heard::Fail(e)) => Err(e),
            Some(Heard::Silence) | None => {
                cancel.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(CaptureError::Aborted)
            }
        }
    }
}

/// A recorded generation request
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub history: Vec<ChatMessage>,
    pub instruction: String,
    pub options: GenerationOptions,
}

/// Generator returning canned replies, optionally held until released
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub calls: Mutex<Vec<GenerateCall>>,
    gated: bool,
    pub entered: Notify,
    pub release: Notify,
}

impl ScriptedGenerator {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            ..Self::default()
        }
    }

    /// Hold every call until `release` is notified
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        history: &[ChatMessage],
        instruction: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(GenerateCall {
            history: history.to_vec(),
            instruction: instruction.to_string(),
            options: *options,
        });

        if self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Claro, con mucho gusto te ayudo.".to_string()))
    }
}

/// Synthesizer that "encodes" text as its UTF-8 bytes
#[derive(Default)]
pub struct EchoSynthesizer {
    pub voices: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl Synthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Provider("synthesis backend down".to_string()));
        }
        self.voices.lock().unwrap().push(voice_id.to_string());
        Ok(text.as_bytes().to_vec())
    }
}

/// Audio output counting live handles
#[derive(Default)]
pub struct CountingAudio {
    pub live: Arc<AtomicUsize>,
    pub max_live: Arc<AtomicUsize>,
    pub loaded: AtomicUsize,
    /// Refuse every clip with this error
    pub refuse: Option<PlaybackError>,
    /// Load clips whose `play()` fails
    pub mute: bool,
    /// Stopped from inside `load`, as if the user hit stop mid-staging
    pub stop_on_load: OnceLock<ConversationOrchestrator>,
}

impl CountingAudio {
    pub fn refusing(error: PlaybackError) -> Self {
        Self {
            refuse: Some(error),
            ..Self::default()
        }
    }

    pub fn mute() -> Self {
        Self {
            mute: true,
            ..Self::default()
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

struct CountingHandle {
    id: Uuid,
    live: Arc<AtomicUsize>,
    mute: bool,
}

impl AudioHandle for CountingHandle {
    fn id(&self) -> Uuid {
        self.id
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.mute {
            return Err(PlaybackError::Player("no output device".to_string()));
        }
        Ok(())
    }
}

impl Drop for CountingHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AudioOutput for CountingAudio {
    fn load(&self, audio: Vec<u8>) -> Result<Box<dyn AudioHandle>, PlaybackError> {
        if audio.is_empty() {
            return Err(PlaybackError::EmptyClip);
        }
        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }
        if let Some(orchestrator) = self.stop_on_load.get() {
            orchestrator.stop();
        }
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);
        self.loaded.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingHandle {
            id: Uuid::new_v4(),
            live: Arc::clone(&self.live),
            mute: self.mute,
        }))
    }
}

/// Orchestrator wired to mocks, with handles kept for assertions
pub struct Harness {
    pub orchestrator: ConversationOrchestrator,
    pub capture: Arc<ScriptedCapture>,
    pub generator: Arc<ScriptedGenerator>,
    pub synthesizer: Arc<EchoSynthesizer>,
    pub audio: Arc<CountingAudio>,
    pub store: Arc<ChunkStore>,
}

impl Harness {
    pub fn new(capture: ScriptedCapture, generator: ScriptedGenerator) -> Self {
        Self::with_settings(capture, generator, EchoSynthesizer::default(), test_settings())
    }

    pub fn with_settings(
        capture: ScriptedCapture,
        generator: ScriptedGenerator,
        synthesizer: EchoSynthesizer,
        settings: TurnSettings,
    ) -> Self {
        Self::with_audio(
            capture,
            generator,
            synthesizer,
            CountingAudio::default(),
            settings,
        )
    }

    pub fn with_audio(
        capture: ScriptedCapture,
        generator: ScriptedGenerator,
        synthesizer: EchoSynthesizer,
        audio: CountingAudio,
        settings: TurnSettings,
    ) -> Self {
        let capture = Arc::new(capture);
        let generator = Arc::new(generator);
        let synthesizer = Arc::new(synthesizer);
        let audio = Arc::new(audio);
        let store = Arc::new(ChunkStore::new(
            Arc::new(HashEmbedder::default()),
            ChunkingConfig::new(200, 20).unwrap(),
        ));

        let caps = Capabilities {
            capture: capture.clone(),
            generator: generator.clone(),
            synthesizer: synthesizer.clone(),
            audio: audio.clone(),
            extractor: Arc::new(PlainTextExtractor::default()),
        };
        let orchestrator =
            ConversationOrchestrator::new(caps, Arc::clone(&store), settings).unwrap();

        Self {
            orchestrator,
            capture,
            generator,
            synthesizer,
            audio,
            store,
        }
    }
}

/// Default settings with a short capture timeout
pub fn test_settings() -> TurnSettings {
    TurnSettings {
        capture_timeout: Duration::from_secs(5),
        ..TurnSettings::default()
    }
}

/// Build a PDF with one text page per entry of `pages`
pub fn pdf_document(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
