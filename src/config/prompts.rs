//! Prompt templates for Syllabus.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for tool-assisted answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// Behavioural instructions sent as the system prompt on every model call.
    pub system: String,
    /// Template for the user turn. `{{query}}` is replaced with the question.
    pub query: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant specialized in course materials and educational content with access to tools for course information.

Available Tools:
1. **search_course_content**: Search within course materials for specific content
   - Use for questions about lesson content, concepts, or detailed educational materials
   - Can filter by course name and/or lesson number

2. **get_course_outline**: Get complete course structure and lesson list
   - Use for questions about course organization, structure, or available lessons
   - Returns course title, course link, and all lesson numbers with titles

Tool Usage Guidelines:
- Use the most relevant tool for the primary question first
- After each tool result, assess whether another tool call would improve the answer
- Use follow-up tool calls to compare courses or lessons, or to fetch a course outline after a content search
- Synthesize all tool results into accurate, fact-based responses
- If tools yield no results, state this clearly without offering alternatives

Response Protocol:
- **General knowledge questions**: Answer using existing knowledge without tools
- **Course-specific questions**: Use the appropriate tool(s)
- **Outline queries**: Include the course title, course link (if available), and the complete lesson list with numbers and titles
- Provide direct answers only: no reasoning process, search explanations, or question-type analysis
- Do not mention "based on the search results" or "using the outline tool"

All responses must be brief, educational, clear, and complete.
Provide only the direct answer to what was asked."#
                .to_string(),

            query: "Answer this question about course materials: {{query}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The system prompt with custom variables applied.
    pub fn system_prompt(&self) -> String {
        self.render_with_custom(&self.rag.system, &HashMap::new())
    }

    /// Build the user turn for a question.
    pub fn query_prompt(&self, query: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        self.render_with_custom(&self.rag.query, &vars)
    }
}
