//! Command-line parsing and validation helpers.

mod validation;

use crate::subject::Subject;
use clap::Parser;

pub const DEFAULT_DEBOUNCE_WINDOW_MS: u64 = 8_000;
pub const DEFAULT_ANSWER_RETRIES: u32 = 1;
pub const DEFAULT_ANSWER_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_ANSWER_TOKENS: u32 = 500;
pub const DEFAULT_ANSWER_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TICK_MS: u64 = 50;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// CLI options for a listenq session. Validated values keep the dispatch
/// worker and the UI protocol within sane bounds.
#[derive(Debug, Parser, Clone)]
#[command(about = "listenq audio Q&A pipeline", author, version)]
pub struct AppConfig {
    /// Subject context for the session, fixed once selected
    #[arg(long, value_enum, default_value_t = Subject::General)]
    pub subject: Subject,

    /// API key for the answer service
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat-completion endpoint URL
    #[arg(long = "api-endpoint", default_value = DEFAULT_API_ENDPOINT)]
    pub api_endpoint: String,

    /// Chat model used for answers
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Token budget for a single answer
    #[arg(long = "max-answer-tokens", default_value_t = DEFAULT_MAX_ANSWER_TOKENS)]
    pub max_answer_tokens: u32,

    /// Sampling temperature for answers
    #[arg(long = "answer-temperature", default_value_t = DEFAULT_ANSWER_TEMPERATURE)]
    pub answer_temperature: f32,

    /// Identical questions are re-admitted only after this window (milliseconds)
    #[arg(long = "debounce-window-ms", default_value_t = DEFAULT_DEBOUNCE_WINDOW_MS)]
    pub debounce_window_ms: u64,

    /// Retries after a failed answer dispatch before the event is dropped
    #[arg(long = "answer-retries", default_value_t = DEFAULT_ANSWER_RETRIES)]
    pub answer_retries: u32,

    /// Hard timeout for one answer-service call (milliseconds)
    #[arg(long = "answer-timeout-ms", default_value_t = DEFAULT_ANSWER_TIMEOUT_MS)]
    pub answer_timeout_ms: u64,

    /// Session loop tick interval (milliseconds)
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "LISTENQ_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "LISTENQ_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging transcript/question snippets (debug log only)
    #[arg(long = "log-content", env = "LISTENQ_LOG_CONTENT", default_value_t = false)]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,

    /// Print the effective pipeline settings and exit
    #[arg(long = "print-settings", default_value_t = false)]
    pub print_settings: bool,
}
