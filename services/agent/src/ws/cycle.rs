//! One reason/act turn of the conversation.
//!
//! A turn starts with the user's recognized words and ends with the text the
//! assistant should speak. In between, the model may issue tool calls; they
//! are executed through the session's MCP client and their results fed back
//! before the final response is streamed.

use anyhow::{Context, Result, bail};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs, FunctionObjectArgs,
};
use futures_util::StreamExt;
use rmcp::{
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use std::sync::Arc;
use tiro_core::{
    llm_client::{LLMAction, LLMClient, LLMStreamEvent},
    session::{SessionState, Turn, TurnRole},
};
use tokio::sync::Mutex;
use tracing::info;

/// Handles a single user interaction.
///
/// This involves:
/// 1.  Appending the user's words to the transcript.
/// 2.  Calling the LLM to decide on an action (speak or use a tool).
/// 3.  If tools are chosen, executing them and feeding the results back.
/// 4.  Appending the assistant's reply and returning it for synthesis.
pub async fn handle_turn(
    llm_client: &Arc<dyn LLMClient>,
    session: &Arc<Mutex<SessionState>>,
    mcp_client: &RunningService<RoleClient, ()>,
    user_text: &str,
) -> Result<Option<String>> {
    let messages = {
        let mut state = session.lock().await;
        state.push_turn(TurnRole::User, user_text);
        build_chat_messages(&state.history)?
    };

    // The tool registry, as plain data for the model.
    let tools = mcp_client
        .list_all_tools()
        .await?
        .into_iter()
        .map(|t| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(t.name)
                        .description(t.description.unwrap_or_default())
                        .parameters(serde_json::to_value(&*t.input_schema)?)
                        .build()?,
                )
                .build()?)
        })
        .collect::<Result<Vec<_>>>()?;

    let action = llm_client.decide_action(messages.clone(), tools).await?;

    let mut reply = String::new();
    match action {
        LLMAction::TextResponse(text) => reply = text,
        LLMAction::ToolCall(tool_calls) => {
            let mut tool_results = vec![];
            for call in &tool_calls {
                info!(tool = %call.function.name, "Executing model-issued tool call");
                let result = mcp_client
                    .peer()
                    .call_tool(CallToolRequestParam {
                        name: call.function.name.clone().into(),
                        arguments: Some(serde_json::from_str(&call.function.arguments)?),
                    })
                    .await?;

                let is_error = result.is_error.unwrap_or(false);
                let annotated_content = result
                    .content
                    .context("Tool call returned no content")?
                    .pop()
                    .context("Tool content list was empty")?;
                let result_text = match annotated_content.raw {
                    RawContent::Text(text_content) => text_content.text,
                    _ => "{\"error\": \"Unexpected content type from tool\"}".to_string(),
                };
                if is_error {
                    // A tool-protocol error is not something the model can
                    // talk its way around; it ends the session.
                    bail!("tool '{}' failed: {result_text}", call.function.name);
                }
                tool_results.push(result_text);
            }

            // Append the tool calls and their results, then ask the model to
            // phrase the spoken response.
            let mut followup = messages;
            followup.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for (call, result) in tool_calls.iter().zip(tool_results) {
                followup.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }

            let mut stream = llm_client.stream_after_tools(followup).await?;
            while let Some(event) = stream.next().await {
                if let Ok(LLMStreamEvent::TextChunk(chunk)) = event {
                    reply.push_str(&chunk);
                }
            }
        }
    }

    if reply.is_empty() {
        return Ok(None);
    }
    session
        .lock()
        .await
        .push_turn(TurnRole::Assistant, reply.as_str());
    Ok(Some(reply))
}

/// Maps the transcript into chat-completion request messages.
fn build_chat_messages(history: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    history
        .iter()
        .map(|turn| {
            Ok(match turn.role {
                TurnRole::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
                TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
                TurnRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()?
                    .into(),
            })
        })
        .collect()
}
