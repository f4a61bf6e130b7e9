//! FIFO queue of detected questions awaiting user-triggered answering.
//!
//! Single-writer by construction: only the session thread mutates the queue,
//! dispatch workers report back over a channel and never touch it directly.
//! Resolution is idempotent, and resolved events are retained (capped) so
//! the UI can show a Q&A history.

use crate::detect::QuestionKind;
use crate::subject::Subject;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

/// Oldest resolved events are evicted past this point; Pending events are
/// never evicted.
pub const MAX_RETAINED_EVENTS: usize = 256;

/// Identifier handed to the UI; monotonic per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

/// Lifecycle of a question. Answered and Ignored are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    Pending,
    Answered,
    Ignored,
}

/// Terminal state requested by a resolve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Answered,
    Ignored,
}

impl Outcome {
    fn status(self) -> QuestionStatus {
        match self {
            Outcome::Answered => QuestionStatus::Answered,
            Outcome::Ignored => QuestionStatus::Ignored,
        }
    }
}

/// What the answer service produced for an event, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Text(String),
    Error(String),
}

/// Immutable once attached to the owning event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub outcome: AnswerOutcome,
    pub latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct QuestionEvent {
    pub id: EventId,
    pub text: String,
    pub kind: QuestionKind,
    pub subject: Subject,
    pub detected_at: Instant,
    pub status: QuestionStatus,
    pub answer: Option<AnswerRecord>,
}

#[derive(Default)]
pub struct AnswerQueue {
    events: VecDeque<QuestionEvent>,
    next_id: u64,
}

impl AnswerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question in Pending state. Always succeeds; duplicate
    /// suppression happens upstream in the debounce filter.
    pub fn enqueue(
        &mut self,
        text: String,
        kind: QuestionKind,
        subject: Subject,
        detected_at: Instant,
    ) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.events.push_back(QuestionEvent {
            id,
            text,
            kind,
            subject,
            detected_at,
            status: QuestionStatus::Pending,
            answer: None,
        });
        self.trim_resolved();
        id
    }

    /// Oldest Pending event, without removing it.
    pub fn peek_next(&self) -> Option<&QuestionEvent> {
        self.events
            .iter()
            .find(|event| event.status == QuestionStatus::Pending)
    }

    /// Transition an event out of Pending. Returns false (and changes
    /// nothing) for unknown ids and already-resolved events, so double
    /// resolution is a harmless no-op.
    pub fn resolve(&mut self, id: EventId, outcome: Outcome) -> bool {
        match self.event_mut(id) {
            Some(event) if event.status == QuestionStatus::Pending => {
                event.status = outcome.status();
                true
            }
            _ => false,
        }
    }

    /// Attach a dispatch result to a still-Pending event. A result arriving
    /// after the event was resolved is dropped.
    pub fn record_answer(&mut self, id: EventId, record: AnswerRecord) -> bool {
        match self.event_mut(id) {
            Some(event) if event.status == QuestionStatus::Pending => {
                event.answer = Some(record);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: EventId) -> Option<&QuestionEvent> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn status(&self, id: EventId) -> Option<QuestionStatus> {
        self.get(id).map(|event| event.status)
    }

    pub fn pending_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| event.status == QuestionStatus::Pending)
            .count()
    }

    /// Dedup support: is this normalized text already waiting in the queue?
    pub fn has_pending_text(&self, text: &str) -> bool {
        self.events
            .iter()
            .any(|event| event.status == QuestionStatus::Pending && event.text == text)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn event_mut(&mut self, id: EventId) -> Option<&mut QuestionEvent> {
        self.events.iter_mut().find(|event| event.id == id)
    }

    fn trim_resolved(&mut self) {
        while self.events.len() > MAX_RETAINED_EVENTS {
            let Some(index) = self
                .events
                .iter()
                .position(|event| event.status != QuestionStatus::Pending)
            else {
                break;
            };
            let _ = self.events.remove(index);
        }
    }
}
