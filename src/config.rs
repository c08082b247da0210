use clap::{Parser, Subcommand};
use std::path::PathBuf;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "study-gateway")]
#[command(about = "Caching, coalescing proxy between a study assistant UI and a hosted LLM API")]
pub struct Args {
    /// Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Chat-completions endpoint of the model provider
    #[arg(long, default_value = "https://api.groq.com/openai/v1/chat/completions")]
    pub upstream_url: String,

    /// Bearer credential for the provider. There is no built-in fallback
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model used by summarize, askdoubt and flashcards
    #[arg(long, default_value = "llama-3.1-8b-instant")]
    pub default_model: String,

    /// Model used by quiz and mindmap
    #[arg(long, default_value = "llama-3.3-70b-versatile")]
    pub reasoning_model: String,

    /// Cache TTL in seconds
    #[arg(short, long, default_value_t = 600)]
    pub cache_ttl: u64,

    /// Maximum number of cached responses
    #[arg(long, default_value_t = 1000)]
    pub cache_capacity: usize,

    /// Upstream attempts per request (rate limits and network failures are retried)
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Timeout of a single upstream attempt, in seconds
    #[arg(long, default_value_t = 15)]
    pub attempt_timeout: u64,

    /// First backoff delay in milliseconds, doubled after every failed attempt
    #[arg(long, default_value_t = 1000)]
    pub backoff_base_ms: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP gateway (default)
    Serve,
    /// Take a quiz generated from a text file, in the terminal
    Quiz {
        /// Study material to build the quiz from
        file: PathBuf,
    },
}
