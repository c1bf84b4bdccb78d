//! Tool-calling agent over the course index.
//!
//! The [`Agent`] drives a language model through a bounded number of tool
//! rounds. Tools are registered with a [`ToolManager`], which dispatches
//! calls by name and gathers the sources behind the final answer.

mod outline;
mod runner;
mod search;
mod tools;

pub use outline::{CourseOutlineTool, OUTLINE_TOOL_NAME};
pub use runner::{Agent, LoopOutcome, ToolCallRecord, DEFAULT_MAX_ROUNDS};
pub use search::{CourseSearchTool, SEARCH_TOOL_NAME};
pub use tools::{SourceTracker, Tool, ToolManager};

#[cfg(test)]
pub(crate) use runner::testing::{tool_use, ScriptedModel};
