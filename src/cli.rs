use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pagechat",
    about = "Chat with the page you are reading: extraction, chunking and retrieval",
    version
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(global = true, long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the main content of an HTML file
    Extract {
        /// HTML file to read
        file: PathBuf,

        /// URL to report for the page (defaults to the file path)
        #[arg(long)]
        url: Option<String>,

        /// Use the smaller budget applied once RAG is available
        #[arg(long)]
        compact: bool,

        /// Print the extraction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the prioritized chunks of an HTML file
    Chunks {
        file: PathBuf,

        #[arg(long)]
        url: Option<String>,
    },

    /// Rank the chunks of an HTML file against a query
    Search {
        file: PathBuf,

        /// Question to search for
        query: String,

        /// Number of chunks to return
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Use the local hashing embedder instead of Gemini
        #[arg(long)]
        offline: bool,

        #[arg(long)]
        url: Option<String>,
    },

    /// Print the completion request a message would produce
    Route {
        file: PathBuf,

        /// User message
        message: String,

        /// Skip RAG initialization (always full context)
        #[arg(long)]
        no_rag: bool,

        /// Use the local hashing embedder instead of Gemini
        #[arg(long)]
        offline: bool,

        #[arg(long)]
        url: Option<String>,
    },

    /// Show or change stored settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,

    /// Update one or more settings
    Set {
        /// Enable or disable grounding (web search)
        #[arg(long)]
        grounding: Option<bool>,

        /// Grounding mode (auto, always)
        #[arg(long)]
        mode: Option<String>,

        /// Response language code (en, de, fr, ...)
        #[arg(long)]
        language: Option<String>,

        /// Summarize automatically when a page is opened
        #[arg(long)]
        auto_summarize: Option<bool>,

        /// Gemini API key
        #[arg(long)]
        api_key: Option<String>,
    },
}
