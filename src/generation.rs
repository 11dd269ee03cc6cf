//! Reply generation

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::session::ChatMessage;
use crate::voice::Synthesizer;

/// Sampling options for one generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Produces the assistant reply for a conversation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a reply to `history` under the system `instruction`
    ///
    /// `history` is ordered oldest first and ends with the latest user message.
    ///
    /// # Errors
    ///
    /// Returns error if the provider is not configured or the call fails
    async fn generate(
        &self,
        history: &[ChatMessage],
        instruction: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}

/// Generator backed by `OpenAI` chat completions
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiChat {
    /// Create a generator for `model`
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(
        api_key: SecretString,
        model: String,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        if api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "OpenAI API key required for chat".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn build_messages<'a>(history: &'a [ChatMessage], instruction: &'a str) -> Vec<Message<'a>> {
    std::iter::once(Message {
        role: "system",
        content: instruction,
    })
    .chain(history.iter().map(|m| Message {
        role: m.role.as_str(),
        content: &m.content,
    }))
    .collect()
}

#[async_trait]
impl Generator for OpenAiChat {
    async fn generate(
        &self,
        history: &[ChatMessage],
        instruction: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: build_messages(history, instruction),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Provider(format!(
                "OpenAI API error: {status} - {body}"
            )));
        }

        let result: ChatCompletionResponse = response.json().await?;
        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Provider("empty completion".to_string()))?;

        tracing::debug!(
            model = %self.model,
            messages = history.len(),
            chars = reply.len(),
            "reply generated"
        );
        Ok(reply)
    }
}

/// Stand-in for providers that need an API key nobody configured
///
/// Every call fails with [`ProviderError::NotConfigured`], which surfaces to
/// the session as a configuration error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingCredentials;

const MISSING_KEY: &str = "OPENAI_API_KEY is not set";

#[async_trait]
impl Generator for MissingCredentials {
    async fn generate(
        &self,
        _history: &[ChatMessage],
        _instruction: &str,
        _options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(MISSING_KEY.to_string()))
    }
}

#[async_trait]
impl Synthesizer for MissingCredentials {
    async fn synthesize(&self, _text: &str, _voice_id: &str) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::NotConfigured(MISSING_KEY.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_start_with_instruction() {
        let history = vec![
            ChatMessage::assistant("Hola"),
            ChatMessage::user("¿Qué hay de postre?"),
        ];
        let messages = build_messages(&history, "Be brief.");

        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
        assert_eq!(messages[0].content, "Be brief.");
    }

    #[test]
    fn test_requires_key() {
        let result = OpenAiChat::new(
            SecretString::from(String::new()),
            "gpt-4o-mini".to_string(),
            "https://api.openai.com/v1",
        );
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let options = GenerationOptions {
            max_tokens: 10,
            temperature: 0.0,
        };
        let err = MissingCredentials
            .generate(&[], "x", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let err = MissingCredentials.synthesize("x", "nova").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
