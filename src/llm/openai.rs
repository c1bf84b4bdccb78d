//! OpenAI chat completions backend.

use super::{ChatModel, ContentBlock, Message, ModelRequest, ModelResponse, Role, StopReason};
use crate::error::{Result, SyllabusError};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatChoice, ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Chat model backed by the OpenAI chat completions API.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create a model client with the given request timeout.
    pub fn new(model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
            max_tokens: 800,
            temperature: 0.0,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn build_err(e: impl std::fmt::Display) -> SyllabusError {
    SyllabusError::Model(e.to_string())
}

/// Translate block-structured history into chat completion messages.
///
/// Tool results become one `tool` message each; any text in the same user
/// turn follows them as a regular user message.
pub(crate) fn to_openai_messages(
    system: &str,
    messages: &[Message],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut out: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system.to_string())
            .build()
            .map_err(build_err)?
            .into(),
    ];

    for message in messages {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in &message.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(t),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ChatCompletionMessageToolCall {
                        id: id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    });
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => {
                    out.push(
                        ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(tool_use_id.clone())
                            .content(content.clone())
                            .build()
                            .map_err(build_err)?
                            .into(),
                    );
                }
            }
        }

        match message.role {
            Role::User => {
                if !text.is_empty() {
                    out.push(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(text)
                            .build()
                            .map_err(build_err)?
                            .into(),
                    );
                }
            }
            Role::Assistant => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    args.content(text);
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(tool_calls);
                }
                out.push(args.build().map_err(build_err)?.into());
            }
        }
    }

    Ok(out)
}

fn to_openai_tools(request: &ModelRequest) -> Vec<ChatCompletionTool> {
    request
        .tools
        .iter()
        .flatten()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.input_schema.clone()),
                strict: None,
            },
        })
        .collect()
}

/// Convert the first completion choice into a block-structured response.
pub(crate) fn from_openai_choice(choice: &ChatChoice) -> ModelResponse {
    let mut content = Vec::new();

    if let Some(text) = choice.message.content.as_ref().filter(|t| !t.is_empty()) {
        content.push(ContentBlock::text(text.clone()));
    }

    for call in choice.message.tool_calls.iter().flatten() {
        let input = serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
            warn!(
                "Model sent malformed arguments for '{}': {}",
                call.function.name, e
            );
            serde_json::Value::String(call.function.arguments.clone())
        });
        content.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input,
        });
    }

    let has_tool_calls = content
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

    let stop_reason = match choice.finish_reason {
        Some(FinishReason::ToolCalls) | Some(FinishReason::FunctionCall) => StopReason::ToolUse,
        Some(FinishReason::Length) => StopReason::MaxTokens,
        _ if has_tool_calls => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    };

    ModelResponse {
        content,
        stop_reason,
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        let messages = to_openai_messages(&request.system, &request.messages)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature);

        if request.has_tools() {
            args.tools(to_openai_tools(&request))
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        let api_request = args.build().map_err(build_err)?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| SyllabusError::OpenAI(format!("Chat completion failed: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| SyllabusError::Model("No response from model".to_string()))?;

        let result = from_openai_choice(choice);
        debug!(
            "Model stopped with {:?} ({} blocks)",
            result.stop_reason,
            result.content.len()
        );
        Ok(result)
    }
}
