//! Remote answer dispatch.
//!
//! The chat-completion call is the only blocking step in the whole pipeline,
//! so it runs on a worker thread with a bounded timeout and a small retry
//! budget, and reports a single message back over a channel. The snippet
//! lane never waits on the network.

use crate::config::AppConfig;
use crate::logging::log_debug;
use crate::queue::EventId;
use crate::subject::Subject;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

const VISUALIZE_MAX_TOKENS: u32 = 800;
const VISUALIZE_TEMPERATURE: f32 = 0.5;

/// What the worker is asked to produce for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Answer,
    Visualize,
}

/// Seam between the pipeline and the remote model. Implementations may
/// block; callers must only invoke this from a dispatch worker.
pub trait AnswerService: Send + Sync {
    fn name(&self) -> &'static str;
    fn answer(&self, subject: Subject, question: &str, mode: PromptMode) -> Result<String>;
}

/// Chat-completion client. One instance per session; the blocking reqwest
/// client carries the per-request timeout.
pub struct OpenAiAnswerService {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiAnswerService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.api_key.clone().unwrap_or_default();
        if api_key.trim().is_empty() {
            bail!("OpenAI API key not configured; set OPENAI_API_KEY or pass --api-key");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.answer_timeout_ms))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            endpoint: config.api_endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_answer_tokens,
            temperature: config.answer_temperature,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl AnswerService for OpenAiAnswerService {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn answer(&self, subject: Subject, question: &str, mode: PromptMode) -> Result<String> {
        let system = system_prompt(subject, mode);
        let user = match mode {
            PromptMode::Answer => question.to_string(),
            PromptMode::Visualize => format!("Visualize: {question}"),
        };
        let (max_tokens, temperature) = match mode {
            PromptMode::Answer => (self.max_tokens, self.temperature),
            PromptMode::Visualize => (VISUALIZE_MAX_TOKENS, VISUALIZE_TEMPERATURE),
        };
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("chat completion returned {status}");
        }
        let body: ChatResponse = response
            .json()
            .context("malformed chat completion response")?;
        body.choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .context("chat completion response had no content")
    }
}

pub(crate) fn system_prompt(subject: Subject, mode: PromptMode) -> String {
    match mode {
        PromptMode::Answer => format!(
            "You are a helpful educational assistant specializing in {}. \
             Answer questions clearly and concisely, providing accurate information \
             relevant to the subject. Keep answers educational but easy to understand.",
            subject.label()
        ),
        PromptMode::Visualize => format!(
            "You are a visualization assistant for {}. When asked to visualize \
             something, provide a detailed description of what the visualization \
             would show. If possible, provide ASCII art or text-based diagrams. \
             For mathematical functions, describe the graph characteristics.",
            subject.label()
        ),
    }
}

/// Handle the session loop uses to poll a dispatch worker.
pub struct AnswerJob {
    pub event_id: EventId,
    pub receiver: mpsc::Receiver<AnswerJobMessage>,
    pub handle: Option<thread::JoinHandle<()>>,
    pub started_at: Instant,
}

/// Final report from a dispatch worker. Exactly one message per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerJobMessage {
    Answered { text: String, latency_ms: u64 },
    Failed { error: String, attempts: u32 },
}

/// Spawn a worker that calls the answer service with a bounded retry budget.
pub fn start_answer_job(
    service: Arc<dyn AnswerService>,
    event_id: EventId,
    subject: Subject,
    question: String,
    mode: PromptMode,
    retry_budget: u32,
) -> AnswerJob {
    let (tx, rx) = mpsc::sync_channel(1);
    let started_at = Instant::now();
    let handle = thread::spawn(move || {
        let message = perform_dispatch(service.as_ref(), subject, &question, mode, retry_budget);
        let _ = tx.send(message);
    });
    AnswerJob {
        event_id,
        receiver: rx,
        handle: Some(handle),
        started_at,
    }
}

fn perform_dispatch(
    service: &dyn AnswerService,
    subject: Subject,
    question: &str,
    mode: PromptMode,
    retry_budget: u32,
) -> AnswerJobMessage {
    let attempts = retry_budget.saturating_add(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        let call_start = Instant::now();
        match service.answer(subject, question, mode) {
            Ok(text) => {
                return AnswerJobMessage::Answered {
                    text,
                    latency_ms: call_start.elapsed().as_millis() as u64,
                }
            }
            Err(err) => {
                last_error = format!("{err:#}");
                log_debug(&format!(
                    "answer dispatch attempt {attempt}/{attempts} via {} failed: {last_error}",
                    service.name()
                ));
            }
        }
    }
    AnswerJobMessage::Failed {
        error: last_error,
        attempts,
    }
}
