//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// `OpenAI` API key (the `OPENAI_API_KEY` env var wins)
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub llm: LlmFileConfig,

    #[serde(default)]
    pub limits: LimitsFileConfig,

    #[serde(default)]
    pub knowledge: KnowledgeFileConfig,

    #[serde(default)]
    pub persona: PersonaFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub conversation: ConversationFileConfig,

    #[serde(default)]
    pub features: FeaturesFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Chat model (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// Sampling temperature without retrieval
    pub temperature: Option<f32>,

    /// Sampling temperature when retrieval is enabled
    pub rag_temperature: Option<f32>,

    /// API base URL (e.g. a compatible local server)
    pub base_url: Option<String>,
}

/// Response length ceilings
#[derive(Debug, Default, Deserialize)]
pub struct LimitsFileConfig {
    pub enabled: Option<bool>,
    pub max_words: Option<usize>,
    pub max_characters: Option<usize>,
    pub max_tokens: Option<u32>,
    pub min_words: Option<usize>,
}

/// Document retrieval configuration
#[derive(Debug, Default, Deserialize)]
pub struct KnowledgeFileConfig {
    pub enabled: Option<bool>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub max_document_bytes: Option<usize>,
    pub embedding_model: Option<String>,

    /// Document ingested at start-up
    pub preload_path: Option<String>,
}

/// Persona configuration
#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    pub enabled: Option<bool>,
    pub text: Option<String>,
}

/// Voice/audio configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Catalog voice id (e.g. "nova")
    pub default_voice: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// Response language tag (e.g. "es-ES")
    pub language: Option<String>,

    /// Seconds to wait for an utterance
    pub capture_timeout_secs: Option<u64>,

    /// External audio player command (e.g. "mpv")
    pub player: Option<String>,
}

/// Conversation history configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Messages sent to generation per turn
    pub history_window: Option<usize>,

    /// Assistant greeting seeded into fresh sessions
    pub welcome_message: Option<String>,
}

/// Feature toggles
#[derive(Debug, Default, Deserialize)]
pub struct FeaturesFileConfig {
    pub diagnostics: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    let Some(path) = config_file_path() else {
        return ParleyConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_file_from(path: &Path) -> ParleyConfigFile {
    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParleyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}
