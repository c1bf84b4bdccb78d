//! Agent runner with a bounded, sequential tool calling loop.

use super::tools::ToolManager;
use crate::error::Result;
use crate::llm::{ChatModel, ContentBlock, Message, ModelRequest};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default number of tool-bearing rounds before the forced final answer.
pub const DEFAULT_MAX_ROUNDS: usize = 2;

/// Agent that answers a query, calling tools for up to `max_rounds` rounds.
///
/// Each round is one model call offering every tool schema. If the model asks
/// for tools they are dispatched in order and their results appended to the
/// history. Once the budget is spent, one last call is made without tools so
/// the model must answer. Worst case is `max_rounds + 1` model calls.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    max_rounds: usize,
}

impl Agent {
    /// Create a new agent with the given model and system prompt.
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Set the maximum number of tool rounds.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// System instructions for one run.
    pub fn system_content(&self, history: Option<&str>) -> String {
        let mut content = self.system_prompt.clone();

        if self.max_rounds > 1 {
            content.push_str(&format!(
                "\n\nNote: You have up to {} rounds of tool calls available for comprehensive information gathering.",
                self.max_rounds
            ));
        }

        match history.filter(|h| !h.is_empty()) {
            Some(history) => format!("{}\n\nPrevious conversation:\n{}", content, history),
            None => content,
        }
    }

    /// Run the loop for one user turn.
    ///
    /// Without a tool manager the first model reply is returned as is. Tool
    /// failures are reported back to the model as text and never abort the
    /// run; a failed model call does.
    #[instrument(skip(self, query, history, tools), fields(max_rounds = self.max_rounds))]
    pub async fn run(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&ToolManager>,
    ) -> Result<LoopOutcome> {
        let system = self.system_content(history);
        let definitions = tools.map(|t| t.definitions()).filter(|d| !d.is_empty());

        let mut messages = vec![Message::user(query)];
        let mut outcome = LoopOutcome::default();
        let mut round = 0;

        while round < self.max_rounds {
            debug!("Agent round {}", round + 1);

            let mut request = ModelRequest::new(system.clone(), messages.clone());
            if let Some(definitions) = &definitions {
                request = request.with_tools(definitions.clone());
            }

            let response = self.model.complete(request).await?;
            outcome.model_calls += 1;

            let manager = match tools {
                Some(manager) if response.wants_tools() => manager,
                _ => {
                    outcome.answer = response.text_content();
                    return Ok(outcome);
                }
            };

            messages.push(Message::assistant(response.content.clone()));

            let mut results = Vec::new();
            for (id, name, input) in response.tool_uses() {
                info!("Agent calling tool: {} with args: {}", name, input);

                let (content, failed) = match manager.dispatch(name, input).await {
                    Ok(output) => (output, false),
                    Err(e) => (format!("Tool execution error: {}", e), true),
                };

                outcome.tool_calls.push(ToolCallRecord {
                    name: name.to_string(),
                    arguments: input.clone(),
                    result: content.clone(),
                    failed,
                });
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id.to_string(),
                    content,
                });
            }

            if !results.is_empty() {
                messages.push(Message::tool_results(results));
            }
            round += 1;
        }

        debug!("Tool budget spent after {} rounds, requesting final answer", round);
        let response = self
            .model
            .complete(ModelRequest::new(system, messages))
            .await?;
        outcome.model_calls += 1;
        outcome.answer = response.text_content();
        Ok(outcome)
    }
}

/// Result of an agent run.
#[derive(Debug, Clone, Default)]
pub struct LoopOutcome {
    /// The final answer text.
    pub answer: String,
    /// Number of model calls made, including the forced final one.
    pub model_calls: usize,
    /// Every tool dispatch, in order.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    /// Text returned to the model.
    pub result: String,
    /// Whether the tool returned an error.
    pub failed: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
