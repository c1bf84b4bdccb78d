//! CLI module for Syllabus.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Syllabus - Course Materials Q&A
///
/// Index structured course documents and ask questions about them. Answers
/// are grounded in course content and lesson outlines, with sources.
#[derive(Parser, Debug)]
#[command(name = "syllabus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SYLLABUS_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index course documents from a folder or a single file
    Ingest {
        /// Folder of course documents, or one document
        path: String,

        /// Remove all indexed courses first
        #[arg(long)]
        clear: bool,
    },

    /// Ask a question about the indexed courses
    Ask {
        /// The question to ask
        question: String,

        /// LLM model to use for response generation
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum number of tool calling rounds
        #[arg(short = 'r', long)]
        max_rounds: Option<usize>,
    },

    /// Start an interactive chat session
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List indexed courses
    Courses,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "rag.model")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from(["syllabus", "-vv", "ask", "What is MCP?", "--max-rounds", "3"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask {
                question,
                model,
                max_rounds,
            } => {
                assert_eq!(question, "What is MCP?");
                assert_eq!(model, None);
                assert_eq!(max_rounds, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ingest_and_serve() {
        let cli = Cli::parse_from(["syllabus", "ingest", "./docs", "--clear"]);
        assert!(matches!(cli.command, Commands::Ingest { clear: true, .. }));

        let cli = Cli::parse_from(["syllabus", "serve", "--port", "9000"]);
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: Some(9000)
            }
        ));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
