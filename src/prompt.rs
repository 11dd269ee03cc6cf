//! System instruction builder
//!
//! Sections are always emitted in the same order:
//! 1. Persona (configured text, or a fallback derived from the voice)
//! 2. Grounding instructions and the delimited context block, only when
//!    retrieval is enabled and something was retrieved
//! 3. Language directive and word ceiling

use crate::voices::{Gender, VoiceProfile};

/// Instructions prepended to retrieved document context
pub const GROUNDING_INSTRUCTIONS: &str = "You will be given context extracted from documents. \
Use ONLY this information to answer the user's question. If the answer is not in the \
provided context, politely say that you do not have that information. Do not guess or \
use outside knowledge. Stick strictly to the facts in the text.";

/// Opens the retrieved context block
pub const CONTEXT_START: &str = "--- CONTEXT START ---";

/// Closes the retrieved context block
pub const CONTEXT_END: &str = "--- CONTEXT END ---";

/// Builds the system instruction for each generation call
#[derive(Debug, Clone)]
pub struct PromptComposer {
    persona: Option<String>,
    language: String,
    max_words: usize,
    retrieval_enabled: bool,
}

impl PromptComposer {
    /// Create a composer
    ///
    /// A blank `persona` is treated as absent.
    #[must_use]
    pub fn new(
        persona: Option<String>,
        language: impl Into<String>,
        max_words: usize,
        retrieval_enabled: bool,
    ) -> Self {
        Self {
            persona: persona.filter(|p| !p.trim().is_empty()),
            language: language.into(),
            max_words,
            retrieval_enabled,
        }
    }

    #[must_use]
    pub const fn retrieval_enabled(&self) -> bool {
        self.retrieval_enabled
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Compose the instruction for one turn
    ///
    /// `context` holds retrieved chunk texts in rank order; blank entries are
    /// ignored and an empty set yields no grounding section at all.
    #[must_use]
    pub fn compose(&self, voice: &VoiceProfile, context: &[&str]) -> String {
        let mut prompt = self.persona_section(voice);

        let passages: Vec<&str> = context
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();

        if self.retrieval_enabled && !passages.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(GROUNDING_INSTRUCTIONS);
            prompt.push_str("\n\n");
            prompt.push_str(CONTEXT_START);
            prompt.push('\n');
            prompt.push_str(&passages.join("\n\n"));
            prompt.push('\n');
            prompt.push_str(CONTEXT_END);
        }

        prompt.push_str("\n\n");
        prompt.push_str(&language_directive(&self.language));
        prompt.push(' ');
        prompt.push_str(&format!(
            "Keep your answers under {} words.",
            self.max_words
        ));

        prompt
    }

    fn persona_section(&self, voice: &VoiceProfile) -> String {
        self.persona.as_ref().map_or_else(
            || {
                let role = match voice.gender {
                    Gender::Female => "a female assistant",
                    Gender::Male => "a male assistant",
                    Gender::Neutral => "a virtual assistant",
                };
                format!("You are {}, {role}.", voice.name)
            },
            |p| p.trim().to_string(),
        )
    }
}

/// Reply-language instruction for a BCP 47 tag
#[must_use]
pub fn language_directive(language: &str) -> String {
    if is_spanish(language) {
        "Responde siempre en español.".to_string()
    } else {
        format!("Respond in {language}.")
    }
}

fn is_spanish(language: &str) -> bool {
    matches!(language, "es-ES" | "es-MX")
}
