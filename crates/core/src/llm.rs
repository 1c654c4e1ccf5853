//! Text-Generation Collaborator
//!
//! The dialogue controller needs exactly one operation from a language model:
//! produce a completion for a persona context, a task instruction, and a
//! window of conversation history. The trait keeps the controller testable;
//! the one production implementation speaks to any OpenAI-compatible chat
//! completions API.

use crate::dialogue::{Speaker, Turn};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

/// Failure of a completion request. The dialogue controller treats every
/// variant the same way: substitute a fixed fallback and keep the call alive.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation request failed: {0}")]
    Provider(String),
    #[error("text generation returned an empty completion")]
    EmptyCompletion,
}

/// A text completion service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces one completion.
    ///
    /// `system` carries the persona context and `instruction` the task for
    /// this turn; either may be empty. A bare instruction with no context and
    /// no history is the structured-extraction path and is submitted as the
    /// sole user turn.
    async fn complete(
        &self,
        system: &str,
        instruction: &str,
        history: &[Turn],
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// [`TextGenerator`] backed by an OpenAI-compatible chat completions API.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(
        &self,
        system: &str,
        instruction: &str,
        history: &[Turn],
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, GenerationError> {
        let provider_err = |e: &dyn std::fmt::Display| GenerationError::Provider(e.to_string());

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        if !system.is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| provider_err(&e))?
                    .into(),
            );
        }
        if !instruction.is_empty() {
            if system.is_empty() && history.is_empty() {
                messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(instruction)
                        .build()
                        .map_err(|e| provider_err(&e))?
                        .into(),
                );
            } else {
                messages.push(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(format!("Current task: {instruction}"))
                        .build()
                        .map_err(|e| provider_err(&e))?
                        .into(),
                );
            }
        }
        for turn in history {
            let message: ChatCompletionRequestMessage = match turn.speaker {
                Speaker::Caller => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(|e| provider_err(&e))?
                    .into(),
                Speaker::Agent => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(|e| provider_err(&e))?
                    .into(),
            };
            messages.push(message);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(temperature)
            .max_completion_tokens(max_output_tokens)
            .build()
            .map_err(|e| provider_err(&e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| provider_err(&e))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyCompletion)
    }
}
