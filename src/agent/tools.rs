//! Tool abstraction and the registry the agent dispatches through.

use crate::config::SourceAggregation;
use crate::error::{Result, SyllabusError};
use crate::llm::ToolDefinition;
use crate::models::Source;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Schema presented to the model. The name must be non-empty.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with JSON arguments from the model.
    async fn execute(&self, input: &Value) -> Result<String>;

    /// Provenance recorded by the most recent execution.
    fn sources(&self) -> Vec<Source> {
        Vec::new()
    }

    /// Forget recorded provenance.
    fn clear_sources(&self) {}
}

/// Provenance slot shared by the retrieval tools.
///
/// Each execution replaces the previous contents.
#[derive(Debug, Default)]
pub struct SourceTracker {
    sources: Mutex<Vec<Source>>,
}

impl SourceTracker {
    pub fn replace(&self, sources: Vec<Source>) {
        match self.sources.lock() {
            Ok(mut guard) => *guard = sources,
            Err(e) => warn!("Source tracker lock poisoned: {}", e),
        }
    }

    pub fn get(&self) -> Vec<Source> {
        self.sources
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }
}

/// Registry of tools keyed by name.
pub struct ToolManager {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
    aggregation: SourceAggregation,
    /// Sources from every dispatch since the last clear, used by `Merge`.
    dispatched: Mutex<Vec<Source>>,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolManager {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
            aggregation: SourceAggregation::default(),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    /// Set how `collect_sources` combines provenance across tools.
    pub fn with_aggregation(mut self, aggregation: SourceAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Register a tool. A tool with an existing name replaces the old one in
    /// its original position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.definition().name;
        if name.is_empty() {
            return Err(SyllabusError::Config(
                "Tool definition must have a non-empty name".to_string(),
            ));
        }

        match self.by_name.get(&name) {
            Some(&slot) => {
                debug!("Replacing tool '{}'", name);
                self.tools[slot] = tool;
            }
            None => {
                debug!("Registered tool '{}'", name);
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
        Ok(())
    }

    /// Tool schemas in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name. An unknown name is reported as text, not an error.
    pub async fn dispatch(&self, name: &str, input: &Value) -> Result<String> {
        let Some(&slot) = self.by_name.get(name) else {
            warn!("Model requested unknown tool '{}'", name);
            return Ok(format!("Tool '{}' not found", name));
        };

        let tool = &self.tools[slot];
        let result = tool.execute(input).await;

        if self.aggregation == SourceAggregation::Merge && result.is_ok() {
            if let Ok(mut dispatched) = self.dispatched.lock() {
                dispatched.extend(tool.sources());
            }
        }

        result
    }

    /// Provenance for the answer.
    ///
    /// `First`: the first non-empty tool provenance in registration order.
    /// `Merge`: every dispatch's provenance in dispatch order.
    pub fn collect_sources(&self) -> Vec<Source> {
        match self.aggregation {
            SourceAggregation::First => self
                .tools
                .iter()
                .map(|t| t.sources())
                .find(|s| !s.is_empty())
                .unwrap_or_default(),
            SourceAggregation::Merge => self
                .dispatched
                .lock()
                .map(|d| d.clone())
                .unwrap_or_default(),
        }
    }

    /// Reset every tool's provenance.
    pub fn clear_sources(&self) {
        for tool in &self.tools {
            tool.clear_sources();
        }
        if let Ok(mut dispatched) = self.dispatched.lock() {
            dispatched.clear();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::EchoTool;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(EchoTool::new("alpha"))).unwrap();
        manager.register(Arc::new(EchoTool::new("beta"))).unwrap();

        let names: Vec<_> = manager.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        let out = manager.dispatch("beta", &json!({"x": 1})).await.unwrap();
        assert_eq!(out, r#"beta ran with {"x":1}"#);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_text() {
        let manager = ToolManager::new();
        let out = manager.dispatch("nope", &json!({})).await.unwrap();
        assert_eq!(out, "Tool 'nope' not found");
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut manager = ToolManager::new();
        let err = manager.register(Arc::new(EchoTool::new(""))).unwrap_err();
        assert!(matches!(err, SyllabusError::Config(_)));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_keeps_slot() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(EchoTool::new("alpha"))).unwrap();
        manager.register(Arc::new(EchoTool::new("beta"))).unwrap();

        let replacement = Arc::new(EchoTool::new("alpha"));
        manager.register(replacement.clone()).unwrap();

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.definitions()[0].name, "alpha");
        manager.dispatch("alpha", &json!({})).await.unwrap();
        assert_eq!(replacement.call_count(), 1);
    }

    #[tokio::test]
    async fn test_first_non_empty_sources() {
        let alpha = Arc::new(EchoTool::new("alpha"));
        let beta = Arc::new(EchoTool::new("beta"));
        let mut manager = ToolManager::new();
        manager.register(alpha.clone()).unwrap();
        manager.register(beta.clone()).unwrap();

        manager.dispatch("beta", &json!(1)).await.unwrap();
        assert_eq!(manager.collect_sources()[0].display_text, "beta 1");

        manager.dispatch("alpha", &json!(2)).await.unwrap();
        assert_eq!(manager.collect_sources()[0].display_text, "alpha 2");

        // Next execution overwrites.
        manager.dispatch("alpha", &json!(3)).await.unwrap();
        let sources = manager.collect_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].display_text, "alpha 3");

        manager.clear_sources();
        assert!(manager.collect_sources().is_empty());
        assert!(alpha.sources().is_empty());
        assert!(beta.sources().is_empty());
    }

    #[tokio::test]
    async fn test_merge_follows_dispatch_order() {
        let mut manager = ToolManager::new().with_aggregation(SourceAggregation::Merge);
        manager.register(Arc::new(EchoTool::new("alpha"))).unwrap();
        manager.register(Arc::new(EchoTool::new("beta"))).unwrap();
        manager
            .register(Arc::new(EchoTool::failing("gamma", "boom")))
            .unwrap();

        manager.dispatch("beta", &json!(1)).await.unwrap();
        assert!(manager.dispatch("gamma", &json!(2)).await.is_err());
        manager.dispatch("alpha", &json!(3)).await.unwrap();

        let texts: Vec<_> = manager
            .collect_sources()
            .into_iter()
            .map(|s| s.display_text)
            .collect();
        assert_eq!(texts, vec!["beta 1", "alpha 3"]);

        manager.clear_sources();
        assert!(manager.collect_sources().is_empty());
    }
}
