//! Abstraction over the language-model inference engine.
//!
//! The orchestrator needs exactly two calls per turn: a non-streaming
//! request deciding the next action (answer directly or call tools), and a
//! streaming request phrasing the final response once tool results are in
//! the history. Anything implementing `LLMClient` can drive a session; the
//! production implementation targets OpenAI-compatible chat-completion APIs.

use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestMessage, ChatCompletionTool, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A tool call requested by the model.
pub type ToolCall = async_openai::types::ChatCompletionMessageToolCall;

/// Events yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of response chunks from the model.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// The model's decision for a turn.
#[derive(Debug, Clone)]
pub enum LLMAction {
    /// The model answered directly with text.
    TextResponse(String),
    /// The model wants one or more tools executed first.
    ToolCall(Vec<ToolCall>),
}

#[async_trait]
pub trait LLMClient: Send + Sync {
    /// One non-streaming call deciding the next action for the turn.
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction>;

    /// Streams the final response after tool results were appended.
    async fn stream_after_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream>;
}

/// An `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(messages);
        // The API rejects an empty tools array, so only attach tools when
        // the behavior declares some.
        if !tools.is_empty() {
            request.tools(tools).tool_choice("auto");
        }

        let response = self.client.chat().create(request.build()?).await?;
        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("LLM response contained no choices"))?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            Ok(LLMAction::ToolCall(tool_calls.clone()))
        } else if let Some(content) = &choice.message.content {
            Ok(LLMAction::TextResponse(content.clone()))
        } else {
            Err(anyhow!(
                "LLM response had neither text content nor tool calls"
            ))
        }
    }

    async fn stream_after_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async {
            match result {
                Ok(response) => response
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.as_ref())
                    .filter(|content| !content.is_empty())
                    .map(|content| Ok(LLMStreamEvent::TextChunk(content.clone()))),
                Err(e) => Some(Err(e)),
            }
        })))
    }
}
