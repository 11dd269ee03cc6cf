//! Conversation turn orchestration
//!
//! One turn runs `idle → listening → processing → speaking → idle`. Every
//! turn carries an epoch; `stop()` bumps the epoch and cancels the turn's
//! token, so whatever an in-flight capability returns afterwards is dropped.
//! The session lock is never held across an await.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{Config, ResponseLimits};
use crate::generation::{GenerationOptions, Generator, MissingCredentials, OpenAiChat};
use crate::knowledge::{
    AnyDocumentExtractor, ChunkStore, DocumentExtractor, DocumentSummary, Embedder,
    HashEmbedder, OpenAiEmbedder, RetrievalResult,
};
use crate::prompt::PromptComposer;
use crate::session::{ChatMessage, ConversationSession, SessionError, SessionState};
use crate::shaping::{ResponseShaper, estimate_tokens};
use crate::voice::{AudioHandle, AudioOutput, Capture, CaptureError, OpenAiSpeech, Synthesizer};
use crate::voices::{VoiceProfile, voice_by_id};
use crate::{Error, Result};

/// External capabilities a turn depends on
#[derive(Clone)]
pub struct Capabilities {
    pub capture: Arc<dyn Capture>,
    pub generator: Arc<dyn Generator>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub audio: Arc<dyn AudioOutput>,
    pub extractor: Arc<dyn DocumentExtractor>,
}

impl Capabilities {
    /// Wire the `OpenAI` adapters around the given capture and audio output
    ///
    /// Without an API key generation and synthesis report a configuration
    /// error on use.
    #[must_use]
    pub fn openai(
        config: &Config,
        capture: Arc<dyn Capture>,
        audio: Arc<dyn AudioOutput>,
    ) -> Self {
        let chat = config.api_key.clone().and_then(|key| {
            OpenAiChat::new(key, config.llm.model.clone(), &config.llm.base_url).ok()
        });
        let generator: Arc<dyn Generator> = match chat {
            Some(chat) => Arc::new(chat),
            None => Arc::new(MissingCredentials),
        };

        let speech = config.api_key.clone().and_then(|key| {
            OpenAiSpeech::new(key, config.voice.tts_model.clone(), &config.llm.base_url).ok()
        });
        let synthesizer: Arc<dyn Synthesizer> = match speech {
            Some(speech) => Arc::new(speech),
            None => Arc::new(MissingCredentials),
        };

        Self {
            capture,
            generator,
            synthesizer,
            audio,
            extractor: Arc::new(AnyDocumentExtractor::new(config.knowledge.max_document_bytes)),
        }
    }
}

/// Pick the embedder for `config`: `OpenAI` with a key, hashed otherwise
#[must_use]
pub fn embedder_for(config: &Config) -> Arc<dyn Embedder> {
    let openai = config.api_key.clone().and_then(|key| {
        OpenAiEmbedder::new(
            key,
            config.knowledge.embedding_model.clone(),
            &config.llm.base_url,
        )
        .ok()
    });

    match openai {
        Some(embedder) => Arc::new(embedder),
        None => {
            tracing::info!("no API key, using offline hashed embeddings");
            Arc::new(HashEmbedder::default())
        }
    }
}

/// Per-turn behavior derived from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSettings {
    pub limits: ResponseLimits,
    pub retrieval_enabled: bool,
    pub top_k: usize,
    pub temperature: f32,
    pub rag_temperature: f32,
    pub persona: Option<String>,
    pub language: String,
    pub voice: String,
    pub capture_timeout: Duration,
    pub history_window: usize,
    pub welcome_message: Option<String>,
    pub diagnostics: bool,
}

impl TurnSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            limits: config.limits,
            retrieval_enabled: config.knowledge.enabled,
            top_k: config.knowledge.top_k,
            temperature: config.llm.temperature,
            rag_temperature: config.llm.rag_temperature,
            persona: config.persona.active_text(),
            language: config.voice.language.clone(),
            voice: config.voice.default_voice.clone(),
            capture_timeout: config.voice.capture_timeout,
            history_window: config.conversation.history_window,
            welcome_message: config.conversation.welcome_message.clone(),
            diagnostics: config.features.diagnostics,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply is playing
    Speaking {
        /// Id of the assistant message, same as its placeholder's
        message_id: Uuid,
        /// Id reported back through [`ConversationOrchestrator::audio_finished`]
        clip_id: Uuid,
        reply: String,
    },
    /// The turn failed; the session is in the error state
    Failed(SessionError),
    /// A stop or clear superseded the turn; its results were discarded
    Superseded,
}

/// Why a turn stopped early
enum Interrupt {
    Superseded,
    Failed(Error),
}

impl From<Error> for Interrupt {
    fn from(e: Error) -> Self {
        Self::Failed(e)
    }
}

/// Identity of one turn
struct Turn {
    epoch: u64,
    cancel: CancellationToken,
}

struct Inner {
    session: ConversationSession,
    epoch: u64,
    cancel: CancellationToken,
    audio: Option<Box<dyn AudioHandle>>,
    voice: &'static VoiceProfile,
}

struct Shared {
    caps: Capabilities,
    store: Arc<ChunkStore>,
    settings: TurnSettings,
    composer: PromptComposer,
    shaper: ResponseShaper,
    inner: Mutex<Inner>,
}

/// Drives conversation turns over the injected capabilities
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    shared: Arc<Shared>,
}

impl ConversationOrchestrator {
    /// Create an orchestrator with a fresh session
    ///
    /// # Errors
    ///
    /// Returns error if the configured voice is not in the catalog
    pub fn new(caps: Capabilities, store: Arc<ChunkStore>, settings: TurnSettings) -> Result<Self> {
        let voice = voice_by_id(&settings.voice)
            .ok_or_else(|| Error::Config(format!("unknown voice: {}", settings.voice)))?;

        let composer = PromptComposer::new(
            settings.persona.clone(),
            settings.language.clone(),
            settings.limits.max_words,
            settings.retrieval_enabled,
        );
        let shaper = ResponseShaper::from_limits(&settings.limits);
        let session = ConversationSession::with_welcome(settings.welcome_message.as_deref());

        Ok(Self {
            shared: Arc::new(Shared {
                caps,
                store,
                composer,
                shaper,
                inner: Mutex::new(Inner {
                    session,
                    epoch: 0,
                    cancel: CancellationToken::new(),
                    audio: None,
                    voice,
                }),
                settings,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one full turn: capture, retrieve, generate, shape, synthesize, play
    ///
    /// Capability failures never escape; they are stored on the session and
    /// reported as [`TurnOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentTurn`] if the session is not idle; the
    /// state is left unchanged
    pub async fn start_turn(&self) -> Result<TurnOutcome> {
        let turn = {
            let mut inner = self.lock();
            let state = inner.session.state();
            if state != SessionState::Idle {
                tracing::debug!(%state, "turn rejected");
                return Err(Error::ConcurrentTurn(state));
            }
            inner.epoch += 1;
            inner.cancel = CancellationToken::new();
            inner.session.transition(SessionState::Listening);
            Turn {
                epoch: inner.epoch,
                cancel: inner.cancel.clone(),
            }
        };

        tracing::debug!(epoch = turn.epoch, "turn started");

        match self.run_turn(&turn).await {
            Ok(outcome) => Ok(outcome),
            Err(Interrupt::Superseded) => {
                tracing::debug!(epoch = turn.epoch, "turn superseded");
                Ok(TurnOutcome::Superseded)
            }
            Err(Interrupt::Failed(e)) => Ok(self.fail_turn(&turn, &e)),
        }
    }

    /// Err(Superseded) once `turn` is no longer the current turn
    fn ensure_current(&self, turn: &Turn) -> std::result::Result<(), Interrupt> {
        if self.lock().epoch == turn.epoch {
            Ok(())
        } else {
            Err(Interrupt::Superseded)
        }
    }

    async fn run_turn(&self, turn: &Turn) -> std::result::Result<TurnOutcome, Interrupt> {
        let settings = &self.shared.settings;

        let transcript = self.capture(turn).await?;
        self.ensure_current(turn)?;

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(Error::EmptyInput.into());
        }

        let (placeholder_id, history, voice) = {
            let mut inner = self.lock();
            if inner.epoch != turn.epoch {
                return Err(Interrupt::Superseded);
            }
            inner.session.push_user(&transcript);
            let placeholder_id = inner.session.push_placeholder();
            inner.session.transition(SessionState::Processing);
            (
                placeholder_id,
                inner.session.history(settings.history_window),
                inner.voice,
            )
        };

        let context = self.retrieve(turn, &transcript).await?;
        let passages: Vec<&str> = context.iter().map(String::as_str).collect();
        let instruction = self.shared.composer.compose(voice, &passages);
        if settings.diagnostics {
            tracing::debug!(%instruction, passages = passages.len(), "composed instruction");
        }

        let options = GenerationOptions {
            max_tokens: settings.limits.max_tokens,
            temperature: if settings.retrieval_enabled {
                settings.rag_temperature
            } else {
                settings.temperature
            },
        };

        let raw = tokio::select! {
            () = turn.cancel.cancelled() => return Err(Interrupt::Superseded),
            result = self.shared.caps.generator.generate(&history, &instruction, &options) => {
                result.map_err(Error::generation)?
            }
        };
        self.ensure_current(turn)?;

        let reply = self.shape(raw.trim())?;

        let audio = tokio::select! {
            () = turn.cancel.cancelled() => return Err(Interrupt::Superseded),
            result = self.shared.caps.synthesizer.synthesize(&reply, voice.id) => {
                result.map_err(Error::synthesis)?
            }
        };

        let previous = {
            let mut inner = self.lock();
            if inner.epoch != turn.epoch {
                return Err(Interrupt::Superseded);
            }
            inner.session.resolve_placeholder(placeholder_id, &reply);
            inner.audio.take()
        };

        // Release the previous clip before acquiring the next
        drop(previous);
        let handle = self.play(audio)?;
        let clip_id = handle.id();

        let superseded = {
            let mut inner = self.lock();
            if inner.epoch == turn.epoch {
                inner.audio = Some(handle);
                inner.session.transition(SessionState::Speaking);
                None
            } else {
                Some(handle)
            }
        };
        if let Some(stale) = superseded {
            drop(stale);
            return Err(Interrupt::Superseded);
        }

        tracing::info!(
            epoch = turn.epoch,
            message = %placeholder_id,
            words = reply.split_whitespace().count(),
            "reply speaking"
        );

        Ok(TurnOutcome::Speaking {
            message_id: placeholder_id,
            clip_id,
            reply,
        })
    }

    async fn capture(&self, turn: &Turn) -> std::result::Result<String, Interrupt> {
        let timeout = self.shared.settings.capture_timeout;
        let token = turn.cancel.child_token();
        let capture = self.shared.caps.capture.capture(timeout, token.clone());

        let result = tokio::select! {
            () = turn.cancel.cancelled() => return Err(Interrupt::Superseded),
            result = tokio::time::timeout(timeout, capture) => result,
        };

        match result {
            Ok(Ok(transcript)) => Ok(transcript),
            Ok(Err(CaptureError::Aborted)) if turn.cancel.is_cancelled() => {
                Err(Interrupt::Superseded)
            }
            Ok(Err(e)) => Err(Error::from(e).into()),
            Err(_elapsed) => {
                token.cancel();
                Err(Error::from(CaptureError::Timeout(timeout)).into())
            }
        }
    }

    /// Retrieve context for `query`, recording it on the session
    ///
    /// Retrieval failures degrade to no context.
    async fn retrieve(
        &self,
        turn: &Turn,
        query: &str,
    ) -> std::result::Result<Vec<String>, Interrupt> {
        let settings = &self.shared.settings;
        if !settings.retrieval_enabled || self.shared.store.is_empty() {
            self.lock().session.set_last_context(None);
            return Ok(Vec::new());
        }

        let result = tokio::select! {
            () = turn.cancel.cancelled() => return Err(Interrupt::Superseded),
            result = self.shared.store.search(query, settings.top_k) => result,
        };

        let result = result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "retrieval failed, answering without context");
            RetrievalResult::default()
        });

        let mut inner = self.lock();
        if inner.epoch != turn.epoch {
            return Err(Interrupt::Superseded);
        }
        let context = result.context();
        if settings.diagnostics {
            tracing::debug!(
                chunks = result.len(),
                context = context.as_deref().unwrap_or_default(),
                "retrieved context"
            );
        }
        inner.session.set_last_context(context);
        drop(inner);

        Ok(result.texts().into_iter().map(str::to_string).collect())
    }

    /// Stage and start a clip; runs without the session lock
    fn play(&self, audio: Vec<u8>) -> Result<Box<dyn AudioHandle>> {
        let mut handle = self.shared.caps.audio.load(audio)?;
        handle.play()?;
        Ok(handle)
    }

    fn shape(&self, raw: &str) -> Result<String> {
        if raw.is_empty() {
            return Err(Error::Generation("empty reply".to_string()));
        }

        let settings = &self.shared.settings;
        let reply = if settings.limits.enabled {
            let shaped = self.shared.shaper.shape(raw);
            if let Some(cut) = shaped.truncation {
                tracing::debug!(?cut, "reply truncated");
            }
            shaped.text
        } else {
            raw.to_string()
        };

        if settings.diagnostics {
            let check = self.shared.shaper.validate(&reply);
            tracing::debug!(
                ?check,
                valid = check.is_valid(),
                tokens = estimate_tokens(&reply),
                max_tokens = settings.limits.max_tokens,
                "response check"
            );
        }

        Ok(reply)
    }

    fn fail_turn(&self, turn: &Turn, error: &Error) -> TurnOutcome {
        let mut inner = self.lock();
        if inner.epoch != turn.epoch {
            return TurnOutcome::Superseded;
        }

        turn.cancel.cancel();
        drop(inner.audio.take());
        inner.session.discard_pending();
        inner.session.fail(error);

        tracing::warn!(epoch = turn.epoch, kind = ?error.kind(), error = %error, "turn failed");
        TurnOutcome::Failed(SessionError::from(error))
    }

    /// Abort whatever is happening and return to idle
    ///
    /// Cancels a pending capture, releases the audio clip, clears the error
    /// and discards any late result of the in-flight turn.
    pub fn stop(&self) {
        let mut inner = self.lock();
        Self::supersede(&mut inner);
        inner.session.reset();
        tracing::info!("conversation stopped");
    }

    fn supersede(inner: &mut Inner) {
        inner.cancel.cancel();
        inner.epoch += 1;
        drop(inner.audio.take());
    }

    /// Report that the clip `clip_id` finished playing
    ///
    /// Returns false for stale or unknown clips, which are ignored.
    pub fn audio_finished(&self, clip_id: Uuid) -> bool {
        let mut inner = self.lock();
        let current = inner.audio.as_ref().map(|h| h.id());
        if inner.session.state() != SessionState::Speaking || current != Some(clip_id) {
            tracing::trace!(clip = %clip_id, "ignoring stale playback signal");
            return false;
        }

        drop(inner.audio.take());
        inner.session.transition(SessionState::Idle);
        tracing::debug!(clip = %clip_id, "playback complete");
        true
    }

    /// Drop the conversation history, superseding any in-flight turn
    pub fn clear_history(&self) {
        let mut inner = self.lock();
        Self::supersede(&mut inner);
        inner.session.reset();
        inner
            .session
            .clear(self.shared.settings.welcome_message.as_deref());
        tracing::info!("history cleared");
    }

    /// Switch the voice used for synthesis and the persona fallback
    ///
    /// # Errors
    ///
    /// Returns error if `voice_id` is not in the catalog
    pub fn set_voice(&self, voice_id: &str) -> Result<()> {
        let voice =
            voice_by_id(voice_id).ok_or_else(|| Error::NotFound(format!("voice {voice_id}")))?;
        self.lock().voice = voice;
        tracing::info!(voice = voice.id, "voice changed");
        Ok(())
    }

    #[must_use]
    pub fn voice(&self) -> &'static VoiceProfile {
        self.lock().voice
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().session.state()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().session.messages().to_vec()
    }

    /// Context retrieved for the most recent turn
    #[must_use]
    pub fn last_context(&self) -> Option<String> {
        self.lock().session.last_context().map(str::to_string)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<SessionError> {
        self.lock().session.last_error().cloned()
    }

    /// Snapshot of the whole session
    #[must_use]
    pub fn session(&self) -> ConversationSession {
        self.lock().session.clone()
    }

    /// Configured response ceilings
    #[must_use]
    pub fn limits(&self) -> ResponseLimits {
        self.shared.settings.limits
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.shared.store
    }

    /// Extract, chunk and index a document
    ///
    /// # Errors
    ///
    /// Returns error if the document is too large, unreadable or cannot be
    /// embedded
    pub async fn add_document(&self, name: &str, bytes: &[u8]) -> Result<DocumentSummary> {
        let text = self.shared.caps.extractor.extract(bytes, name).await?;
        self.shared.store.ingest(name, bytes.len(), &text).await
    }

    /// Read and index the document at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or indexed
    pub async fn add_document_from_path(&self, path: &Path) -> Result<DocumentSummary> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        self.add_document(&name, &bytes).await
    }

    #[must_use]
    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.shared.store.documents()
    }

    /// Remove a document and everything derived from it
    ///
    /// # Errors
    ///
    /// Returns error if no document has `id`
    pub fn remove_document(&self, id: Uuid) -> Result<()> {
        if self.shared.store.remove(id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("document {id}")))
        }
    }
}
