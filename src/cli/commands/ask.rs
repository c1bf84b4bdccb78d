//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::RagSystem;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    model: Option<String>,
    max_rounds: Option<usize>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    if let Some(model) = model {
        settings.rag.model = model;
    }
    if let Some(max_rounds) = max_rounds {
        settings.rag.max_rounds = max_rounds;
    }

    let rag = RagSystem::new(&settings)?;

    let spinner = Output::spinner("Searching course materials...");

    match rag.query(question, None).await {
        Ok(response) => {
            spinner.finish_and_clear();
            Output::answer(&response.answer, &response.sources);
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
