//! Response length budgets
//!
//! Generated replies are spoken aloud, so they are kept short: the word
//! ceiling is applied first and the character ceiling only when the word
//! ceiling did not fire.

use crate::config::ResponseLimits;

/// Appended to any truncated reply
pub const CONTINUATION_MARKER: &str = "...";

/// Default minimum word count for [`ResponseShaper::validate`]
pub const MIN_WORDS: usize = 3;

/// Which ceiling cut a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    Words,
    Characters,
}

/// Result of shaping a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shaped {
    pub text: String,
    pub truncation: Option<Truncation>,
}

/// Diagnostic classification of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCheck {
    Valid,
    TooShort { words: usize },
    TooManyWords { words: usize, max: usize },
    TooManyCharacters { characters: usize, max: usize },
}

impl ResponseCheck {
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Enforces word and character ceilings on generated text
#[derive(Debug, Clone, Copy)]
pub struct ResponseShaper {
    max_words: usize,
    max_characters: usize,
    min_words: usize,
}

impl ResponseShaper {
    #[must_use]
    pub const fn new(max_words: usize, max_characters: usize) -> Self {
        Self {
            max_words,
            max_characters,
            min_words: MIN_WORDS,
        }
    }

    #[must_use]
    pub const fn from_limits(limits: &ResponseLimits) -> Self {
        Self {
            max_words: limits.max_words,
            max_characters: limits.max_characters,
            min_words: limits.min_words,
        }
    }

    #[must_use]
    pub const fn max_words(&self) -> usize {
        self.max_words
    }

    #[must_use]
    pub const fn max_characters(&self) -> usize {
        self.max_characters
    }

    /// Truncate `text` to the configured ceilings
    ///
    /// Compliant text is returned unchanged.
    #[must_use]
    pub fn shape(&self, text: &str) -> Shaped {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() > self.max_words {
            tracing::debug!(
                words = words.len(),
                max = self.max_words,
                "reply truncated to word limit"
            );
            let mut shaped = words[..self.max_words].join(" ");
            shaped.push_str(CONTINUATION_MARKER);
            return Shaped {
                text: shaped,
                truncation: Some(Truncation::Words),
            };
        }

        let characters = text.chars().count();
        if characters > self.max_characters {
            tracing::debug!(
                characters,
                max = self.max_characters,
                "reply truncated to character limit"
            );
            let mut shaped: String = text.chars().take(self.max_characters).collect();
            shaped.push_str(CONTINUATION_MARKER);
            return Shaped {
                text: shaped,
                truncation: Some(Truncation::Characters),
            };
        }

        Shaped {
            text: text.to_string(),
            truncation: None,
        }
    }

    /// Classify a reply against the ceilings and the minimum length
    #[must_use]
    pub fn validate(&self, text: &str) -> ResponseCheck {
        let words = text.split_whitespace().count();
        let characters = text.chars().count();

        if words < self.min_words {
            ResponseCheck::TooShort { words }
        } else if words > self.max_words {
            ResponseCheck::TooManyWords {
                words,
                max: self.max_words,
            }
        } else if characters > self.max_characters {
            ResponseCheck::TooManyCharacters {
                characters,
                max: self.max_characters,
            }
        } else {
            ResponseCheck::Valid
        }
    }
}

/// Rough token estimation (4 chars per token)
#[must_use]
pub const fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
