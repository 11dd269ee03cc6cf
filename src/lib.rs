//! Parley - Voice conversation orchestrator with document-grounded answers
//!
//! This library provides the core functionality for a spoken assistant:
//! - Turn orchestration (capture, generation, synthesis, playback)
//! - Document chunking, embedding and retrieval
//! - Prompt composition and spoken-reply shaping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              ConversationOrchestrator                │
//! │   Session  │  Turn epochs  │  Audio handle          │
//! └──────┬──────────────┬───────────────┬───────────────┘
//!        │              │               │
//! ┌──────▼─────┐ ┌──────▼──────┐ ┌──────▼──────────────┐
//! │ ChunkStore │ │ Prompt      │ │ Capabilities        │
//! │ Embedder   │ │ Shaper      │ │ Capture │ LLM │ TTS │
//! └────────────┘ └─────────────┘ └─────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod shaping;
pub mod voice;
pub mod voices;

pub use config::Config;
pub use error::{Error, ErrorKind, ProviderError, Result};
pub use generation::{GenerationOptions, Generator, MissingCredentials, OpenAiChat};
pub use knowledge::{
    ChunkStore, ChunkingConfig, DocumentExtractor, DocumentSummary, Embedder, HashEmbedder,
    RetrievalResult,
};
pub use orchestrator::{
    Capabilities, ConversationOrchestrator, TurnOutcome, TurnSettings, embedder_for,
};
pub use prompt::PromptComposer;
pub use session::{ChatMessage, ConversationSession, Role, SessionError, SessionState};
pub use shaping::{ResponseCheck, ResponseShaper};
pub use voices::{Gender, VoiceProfile};
