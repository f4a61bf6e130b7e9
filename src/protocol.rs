//! Newline-delimited JSON protocol between the pipeline and an external UI.
//!
//! Events flow out on stdout, commands flow in on stdin. Both sides are
//! tagged enums so a UI can discriminate on a single field.

use crate::detect::QuestionKind;
use crate::queue::EventId;
use serde::{Deserialize, Serialize};

/// Events emitted by the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum UiEvent {
    /// Sent once on startup (and on request) with the effective settings.
    #[serde(rename = "capabilities")]
    Capabilities {
        session_id: String,
        version: String,
        subject: String,
        service: String,
        model: String,
        debounce_window_ms: u64,
        answer_retries: u32,
        answer_timeout_ms: u64,
    },

    /// Pending count changed (enqueue or resolution).
    #[serde(rename = "queue_changed")]
    QueueChanged { pending: usize },

    /// A new question was admitted to the queue.
    #[serde(rename = "question_detected")]
    QuestionDetected {
        id: EventId,
        text: String,
        kind: QuestionKind,
    },

    /// An answer dispatch started for this event.
    #[serde(rename = "dispatch_start")]
    DispatchStart { id: EventId },

    /// Dispatch finished: either an answer or an error indicator.
    #[serde(rename = "answer_ready")]
    AnswerReady {
        id: EventId,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        latency_ms: Option<u64>,
    },

    /// Informational message.
    #[serde(rename = "status")]
    Status { message: String },

    /// Error (recoverable ones leave the session running).
    #[serde(rename = "error")]
    Error { message: String, recoverable: bool },
}

/// Commands received from the UI.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd")]
pub enum UiCommand {
    /// One transcript snippet from the external source.
    #[serde(rename = "snippet")]
    Snippet { text: String },

    /// Answer a pending question.
    #[serde(rename = "request_answer")]
    RequestAnswer { id: EventId },

    /// Answer a pending question in visualization mode.
    #[serde(rename = "visualize")]
    Visualize { id: EventId },

    /// Drop a pending question without answering it.
    #[serde(rename = "ignore")]
    Ignore { id: EventId },

    /// Report the oldest pending question.
    #[serde(rename = "peek")]
    Peek,

    /// Re-emit the capabilities event.
    #[serde(rename = "get_capabilities")]
    GetCapabilities,

    /// End the session.
    #[serde(rename = "shutdown")]
    Shutdown,
}
