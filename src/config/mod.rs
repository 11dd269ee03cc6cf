//! Configuration management for Parley

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::knowledge::{ChunkingConfig, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::voices::voice_by_id;
use crate::{Error, Result};

use file::ParleyConfigFile;

/// Default `OpenAI` API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Parley configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// `OpenAI` API key; adapters that need it report a configuration error
    /// when absent
    pub api_key: Option<SecretString>,

    pub llm: LlmConfig,

    pub limits: ResponseLimits,

    pub knowledge: KnowledgeConfig,

    pub persona: PersonaConfig,

    pub voice: VoiceConfig,

    pub conversation: ConversationConfig,

    pub features: FeatureFlags,
}

/// Chat model configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Chat model identifier
    pub model: String,

    /// Sampling temperature without retrieval
    pub temperature: f32,

    /// Sampling temperature when retrieval is enabled
    pub rag_temperature: f32,

    /// API base URL
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            rag_temperature: 0.2,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Spoken reply ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLimits {
    /// Shape replies at all
    pub enabled: bool,
    pub max_words: usize,
    pub max_characters: usize,
    /// Forwarded to the chat model
    pub max_tokens: u32,
    /// Replies below this are flagged in diagnostics
    pub min_words: usize,
}

impl Default for ResponseLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            max_words: 100,
            max_characters: 500,
            max_tokens: 500,
            min_words: 3,
        }
    }
}

/// Document retrieval configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeConfig {
    /// Retrieve context for each turn
    pub enabled: bool,
    pub chunk_size: usize,
    pub overlap: usize,
    /// Chunks retrieved per turn
    pub top_k: usize,
    pub max_document_bytes: usize,
    pub embedding_model: String,
    /// Document ingested at start-up
    pub preload_path: Option<PathBuf>,
}

impl KnowledgeConfig {
    /// Validated chunk geometry
    ///
    /// # Errors
    ///
    /// Returns error if the chunk size is zero or the overlap is not smaller
    pub fn chunking(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.chunk_size, self.overlap)
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        let chunking = ChunkingConfig::default();
        Self {
            enabled: true,
            chunk_size: chunking.chunk_size,
            overlap: chunking.overlap,
            top_k: 3,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            embedding_model: "text-embedding-3-small".to_string(),
            preload_path: None,
        }
    }
}

/// Persona configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonaConfig {
    pub enabled: bool,
    pub text: String,
}

impl PersonaConfig {
    /// Persona text when enabled and non-blank
    #[must_use]
    pub fn active_text(&self) -> Option<String> {
        (self.enabled && !self.text.trim().is_empty()).then(|| self.text.clone())
    }
}

/// Voice processing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    /// Catalog voice id used for synthesis
    pub default_voice: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// Response language tag
    pub language: String,

    /// How long a capture may wait for speech
    pub capture_timeout: Duration,

    /// External player command; auto-detected when `None`
    pub player: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            default_voice: "nova".to_string(),
            tts_model: "tts-1".to_string(),
            language: "es-ES".to_string(),
            capture_timeout: Duration::from_secs(10),
            player: None,
        }
    }
}

/// Conversation history configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationConfig {
    /// Messages sent to generation per turn
    pub history_window: usize,

    /// Assistant greeting seeded into fresh sessions
    pub welcome_message: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: 20,
            welcome_message: None,
        }
    }
}

/// Feature toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Log prompts, retrieved context and response checks
    pub diagnostics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            llm: LlmConfig::default(),
            limits: ResponseLimits::default(),
            knowledge: KnowledgeConfig::default(),
            persona: PersonaConfig::default(),
            voice: VoiceConfig::default(),
            conversation: ConversationConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

impl Config {
    /// Load configuration from environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge `fc` with values from `env`, env taking priority
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn resolve(fc: ParleyConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_key = env("OPENAI_API_KEY")
            .or(fc.openai_api_key)
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let llm = LlmConfig {
            model: env("PARLEY_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(defaults.llm.model),
            temperature: fc.llm.temperature.unwrap_or(defaults.llm.temperature),
            rag_temperature: fc
                .llm
                .rag_temperature
                .unwrap_or(defaults.llm.rag_temperature),
            base_url: env("PARLEY_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or(defaults.llm.base_url),
        };

        let limits = ResponseLimits {
            enabled: env("PARLEY_LIMITS_ENABLED")
                .map(|v| parse_flag(&v))
                .or(fc.limits.enabled)
                .unwrap_or(defaults.limits.enabled),
            max_words: fc.limits.max_words.unwrap_or(defaults.limits.max_words),
            max_characters: fc
                .limits
                .max_characters
                .unwrap_or(defaults.limits.max_characters),
            max_tokens: fc.limits.max_tokens.unwrap_or(defaults.limits.max_tokens),
            min_words: fc.limits.min_words.unwrap_or(defaults.limits.min_words),
        };

        let knowledge = KnowledgeConfig {
            enabled: env("PARLEY_RAG_ENABLED")
                .map(|v| parse_flag(&v))
                .or(fc.knowledge.enabled)
                .unwrap_or(defaults.knowledge.enabled),
            chunk_size: fc
                .knowledge
                .chunk_size
                .unwrap_or(defaults.knowledge.chunk_size),
            overlap: fc.knowledge.overlap.unwrap_or(defaults.knowledge.overlap),
            top_k: fc.knowledge.top_k.unwrap_or(defaults.knowledge.top_k),
            max_document_bytes: fc
                .knowledge
                .max_document_bytes
                .unwrap_or(defaults.knowledge.max_document_bytes),
            embedding_model: fc
                .knowledge
                .embedding_model
                .unwrap_or(defaults.knowledge.embedding_model),
            preload_path: env("PARLEY_PRELOAD_DOCUMENT")
                .or(fc.knowledge.preload_path)
                .map(PathBuf::from),
        };

        let persona = PersonaConfig {
            enabled: fc.persona.enabled.unwrap_or(true),
            text: env("PARLEY_PERSONA")
                .or(fc.persona.text)
                .unwrap_or_default(),
        };

        let voice = VoiceConfig {
            default_voice: env("PARLEY_VOICE")
                .or(fc.voice.default_voice)
                .unwrap_or(defaults.voice.default_voice),
            tts_model: env("PARLEY_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.voice.tts_model),
            language: env("PARLEY_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or(defaults.voice.language),
            capture_timeout: fc
                .voice
                .capture_timeout_secs
                .map_or(defaults.voice.capture_timeout, Duration::from_secs),
            player: env("PARLEY_PLAYER").or(fc.voice.player),
        };

        let conversation = ConversationConfig {
            history_window: fc
                .conversation
                .history_window
                .unwrap_or(defaults.conversation.history_window),
            welcome_message: fc
                .conversation
                .welcome_message
                .filter(|w| !w.trim().is_empty()),
        };

        let features = FeatureFlags {
            diagnostics: env("PARLEY_DIAGNOSTICS")
                .map(|v| parse_flag(&v))
                .or(fc.features.diagnostics)
                .unwrap_or(false),
        };

        let config = Self {
            api_key,
            llm,
            limits,
            knowledge,
            persona,
            voice,
            conversation,
            features,
        };
        config.validate()?;

        tracing::debug!(
            model = %config.llm.model,
            voice = %config.voice.default_voice,
            language = %config.voice.language,
            retrieval = config.knowledge.enabled,
            has_api_key = config.api_key.is_some(),
            "configuration resolved"
        );
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns error on invalid chunk geometry, zero word ceiling, a zero
    /// history window or an unknown default voice
    pub fn validate(&self) -> Result<()> {
        self.knowledge.chunking()?;

        if self.limits.max_words == 0 || self.limits.max_characters == 0 {
            return Err(Error::Config(
                "response limits must be positive".to_string(),
            ));
        }

        if self.conversation.history_window == 0 {
            return Err(Error::Config(
                "history window must be at least one message".to_string(),
            ));
        }

        if voice_by_id(&self.voice.default_voice).is_none() {
            return Err(Error::Config(format!(
                "unknown voice: {}",
                self.voice.default_voice
            )));
        }

        Ok(())
    }
}
