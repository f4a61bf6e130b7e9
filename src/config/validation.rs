use super::AppConfig;
use anyhow::{bail, Result};
use clap::Parser;

const MIN_DEBOUNCE_WINDOW_MS: u64 = 500;
const MAX_DEBOUNCE_WINDOW_MS: u64 = 600_000;
const MAX_ANSWER_RETRIES: u32 = 5;
const MIN_ANSWER_TIMEOUT_MS: u64 = 1_000;
const MAX_ANSWER_TIMEOUT_MS: u64 = 300_000;
const MAX_ANSWER_TOKENS_LIMIT: u32 = 4_096;
const MIN_TICK_MS: u64 = 10;
const MAX_TICK_MS: u64 = 1_000;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the free-form ones.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_DEBOUNCE_WINDOW_MS..=MAX_DEBOUNCE_WINDOW_MS).contains(&self.debounce_window_ms) {
            bail!(
                "--debounce-window-ms must be between {MIN_DEBOUNCE_WINDOW_MS} and {MAX_DEBOUNCE_WINDOW_MS}, got {}",
                self.debounce_window_ms
            );
        }
        if self.answer_retries > MAX_ANSWER_RETRIES {
            bail!(
                "--answer-retries must be at most {MAX_ANSWER_RETRIES}, got {}",
                self.answer_retries
            );
        }
        if !(MIN_ANSWER_TIMEOUT_MS..=MAX_ANSWER_TIMEOUT_MS).contains(&self.answer_timeout_ms) {
            bail!(
                "--answer-timeout-ms must be between {MIN_ANSWER_TIMEOUT_MS} and {MAX_ANSWER_TIMEOUT_MS}, got {}",
                self.answer_timeout_ms
            );
        }
        if self.max_answer_tokens == 0 || self.max_answer_tokens > MAX_ANSWER_TOKENS_LIMIT {
            bail!(
                "--max-answer-tokens must be between 1 and {MAX_ANSWER_TOKENS_LIMIT}, got {}",
                self.max_answer_tokens
            );
        }
        if !(0.0..=2.0).contains(&self.answer_temperature) {
            bail!(
                "--answer-temperature must be between 0.0 and 2.0, got {}",
                self.answer_temperature
            );
        }
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.tick_ms) {
            bail!(
                "--tick-ms must be between {MIN_TICK_MS} and {MAX_TICK_MS}, got {}",
                self.tick_ms
            );
        }

        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            bail!("--model must not be empty");
        }

        self.api_endpoint = self.api_endpoint.trim().to_string();
        if !self.api_endpoint.starts_with("https://") && !self.api_endpoint.starts_with("http://") {
            bail!(
                "--api-endpoint must be an http(s) URL, got {}",
                self.api_endpoint
            );
        }

        Ok(())
    }
}
