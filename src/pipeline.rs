//! Question pipeline: detector -> debounce filter -> answer queue, plus the
//! single in-flight answer dispatch.
//!
//! The pipeline is single-writer: one thread (the session loop) calls every
//! method here. Dispatch workers run on their own threads and report back
//! over a channel that `poll_dispatch` drains, so a slow or failed remote
//! call never stalls snippet handling.

use crate::answer::{start_answer_job, AnswerJob, AnswerJobMessage, AnswerService, PromptMode};
use crate::config::AppConfig;
use crate::debounce::DebounceFilter;
use crate::detect::QuestionDetector;
use crate::logging::{log_debug, log_debug_content};
use crate::protocol::UiEvent;
use crate::queue::{
    AnswerOutcome, AnswerQueue, AnswerRecord, EventId, Outcome, QuestionEvent, QuestionStatus,
};
use crate::subject::Subject;
use std::sync::mpsc::TryRecvError;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Pipeline {
    detector: QuestionDetector,
    filter: DebounceFilter,
    queue: AnswerQueue,
    subject: Subject,
    service: Arc<dyn AnswerService>,
    retry_budget: u32,
    log_timings: bool,
    dispatch: Option<AnswerJob>,
}

impl Pipeline {
    pub fn new(config: &AppConfig, service: Arc<dyn AnswerService>) -> Self {
        Self {
            detector: QuestionDetector::new(),
            filter: DebounceFilter::new(Duration::from_millis(config.debounce_window_ms)),
            queue: AnswerQueue::new(),
            subject: config.subject,
            service,
            retry_budget: config.answer_retries,
            log_timings: config.log_timings,
            dispatch: None,
        }
    }

    /// Run one snippet through detection, dedup, and admission. Garbled or
    /// question-free snippets fall through silently; admissions produce a
    /// `question_detected` plus a `queue_changed` event each.
    pub fn handle_snippet(&mut self, text: &str, now: Instant) -> Vec<UiEvent> {
        let mut events = Vec::new();
        for question in self.detector.extract(text) {
            if self.queue.has_pending_text(&question.text) {
                // Already queued; refresh the record so re-emissions stay
                // suppressed even once the event resolves.
                let _ = self.filter.admit(&question.text, now);
                continue;
            }
            if !self.filter.admit(&question.text, now) {
                continue;
            }
            log_debug_content(&format!("admitted question: {}", question.text));
            let id = self
                .queue
                .enqueue(question.text.clone(), question.kind, self.subject, now);
            events.push(UiEvent::QuestionDetected {
                id,
                text: question.text,
                kind: question.kind,
            });
            events.push(self.queue_changed());
        }
        events
    }

    /// Dispatch an answer for a pending event. At most one dispatch runs at
    /// a time; a second request while one is in flight is refused.
    pub fn request_answer(&mut self, id: EventId) -> Vec<UiEvent> {
        self.start_dispatch(id, PromptMode::Answer)
    }

    /// Same as `request_answer` but asks for a visualization.
    pub fn request_visualization(&mut self, id: EventId) -> Vec<UiEvent> {
        self.start_dispatch(id, PromptMode::Visualize)
    }

    fn start_dispatch(&mut self, id: EventId, mode: PromptMode) -> Vec<UiEvent> {
        if self.dispatch.is_some() {
            return vec![UiEvent::Error {
                message: "answer dispatch already in progress".to_string(),
                recoverable: true,
            }];
        }
        let question = match self.queue.get(id) {
            Some(event) if event.status == QuestionStatus::Pending => event.text.clone(),
            Some(_) => {
                return vec![UiEvent::Error {
                    message: format!("event {} is already resolved", id.0),
                    recoverable: true,
                }]
            }
            None => {
                return vec![UiEvent::Error {
                    message: format!("unknown event id {}", id.0),
                    recoverable: true,
                }]
            }
        };
        let job = start_answer_job(
            Arc::clone(&self.service),
            id,
            self.subject,
            question,
            mode,
            self.retry_budget,
        );
        self.dispatch = Some(job);
        vec![UiEvent::DispatchStart { id }]
    }

    /// Resolve an event as Ignored. Double-ignore and unknown ids are silent
    /// no-ops; an in-flight dispatch for the event keeps running but its
    /// result will be discarded.
    pub fn ignore(&mut self, id: EventId) -> Vec<UiEvent> {
        if self.queue.resolve(id, Outcome::Ignored) {
            vec![self.queue_changed()]
        } else {
            Vec::new()
        }
    }

    /// Non-blocking check of the in-flight dispatch. On success the event is
    /// resolved Answered; after an exhausted retry budget it is resolved
    /// Ignored with an error indicator, never left Pending.
    pub fn poll_dispatch(&mut self) -> Vec<UiEvent> {
        let message = match self.dispatch.as_ref() {
            Some(job) => match job.receiver.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return Vec::new(),
                Err(TryRecvError::Disconnected) => AnswerJobMessage::Failed {
                    error: "dispatch worker exited without a result".to_string(),
                    attempts: 0,
                },
            },
            None => return Vec::new(),
        };
        let Some(mut job) = self.dispatch.take() else {
            return Vec::new();
        };
        if let Some(handle) = job.handle.take() {
            let _ = handle.join();
        }
        let id = job.event_id;

        // Cancellation rule: a concurrent ignore wins, the late result is
        // discarded.
        if self.queue.status(id) != Some(QuestionStatus::Pending) {
            log_debug(&format!(
                "discarding dispatch result for resolved event {}",
                id.0
            ));
            return Vec::new();
        }

        match message {
            AnswerJobMessage::Answered { text, latency_ms } => {
                if self.log_timings {
                    log_debug(&format!(
                        "timing|phase=answer_dispatch|latency_ms={latency_ms}|chars={}",
                        text.len()
                    ));
                }
                self.queue.record_answer(
                    id,
                    AnswerRecord {
                        outcome: AnswerOutcome::Text(text.clone()),
                        latency_ms,
                    },
                );
                self.queue.resolve(id, Outcome::Answered);
                vec![
                    UiEvent::AnswerReady {
                        id,
                        text: Some(text),
                        error: None,
                        latency_ms: Some(latency_ms),
                    },
                    self.queue_changed(),
                ]
            }
            AnswerJobMessage::Failed { error, attempts } => {
                let message = format!("answer dispatch failed after {attempts} attempt(s): {error}");
                tracing::warn!(event_id = id.0, attempts, "answer dispatch failed");
                self.queue.record_answer(
                    id,
                    AnswerRecord {
                        outcome: AnswerOutcome::Error(message.clone()),
                        latency_ms: job.started_at.elapsed().as_millis() as u64,
                    },
                );
                self.queue.resolve(id, Outcome::Ignored);
                vec![
                    UiEvent::AnswerReady {
                        id,
                        text: None,
                        error: Some(message),
                        latency_ms: None,
                    },
                    self.queue_changed(),
                ]
            }
        }
    }

    pub fn peek_next(&self) -> Option<&QuestionEvent> {
        self.queue.peek_next()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    pub fn dispatch_in_flight(&self) -> bool {
        self.dispatch.is_some()
    }

    pub fn queue(&self) -> &AnswerQueue {
        &self.queue
    }

    fn queue_changed(&self) -> UiEvent {
        UiEvent::QueueChanged {
            pending: self.queue.pending_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use clap::Parser;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::parse_from(["test-app"]);
        config.validate().expect("defaults should be valid");
        config
    }

    struct InstantService {
        reply: &'static str,
    }

    impl AnswerService for InstantService {
        fn name(&self) -> &'static str {
            "instant"
        }
        fn answer(&self, _s: Subject, _q: &str, _m: PromptMode) -> Result<String> {
            Ok(self.reply.to_string())
        }
    }

    struct FailingService {
        calls: AtomicU32,
    }

    impl AnswerService for FailingService {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn answer(&self, _s: Subject, _q: &str, _m: PromptMode) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            bail!("simulated timeout")
        }
    }

    /// Blocks until the test releases it, to model a slow remote call.
    struct GatedService {
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl AnswerService for GatedService {
        fn name(&self) -> &'static str {
            "gated"
        }
        fn answer(&self, _s: Subject, _q: &str, _m: PromptMode) -> Result<String> {
            let gate = self.gate.lock().unwrap();
            let _ = gate.recv_timeout(Duration::from_secs(5));
            Ok("late answer".to_string())
        }
    }

    fn pipeline_with(service: Arc<dyn AnswerService>) -> Pipeline {
        Pipeline::new(&test_config(), service)
    }

    fn wait_for_dispatch(pipeline: &mut Pipeline) -> Vec<UiEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if !pipeline.dispatch_in_flight() {
                return Vec::new();
            }
            let events = pipeline.poll_dispatch();
            if !pipeline.dispatch_in_flight() {
                return events;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("dispatch did not finish in time");
    }

    #[test]
    fn detected_question_flows_to_queue_and_resolves_answered() {
        let mut pipeline = pipeline_with(Arc::new(InstantService { reply: "Paris" }));
        let events = pipeline.handle_snippet("what is the capital of France", Instant::now());
        assert!(matches!(
            events.as_slice(),
            [
                UiEvent::QuestionDetected { text, .. },
                UiEvent::QueueChanged { pending: 1 }
            ] if text == "what is the capital of france"
        ));

        let id = pipeline.peek_next().expect("question queued").id;
        let events = pipeline.request_answer(id);
        assert!(matches!(events.as_slice(), [UiEvent::DispatchStart { .. }]));

        let events = wait_for_dispatch(&mut pipeline);
        assert!(matches!(
            events.as_slice(),
            [
                UiEvent::AnswerReady { text: Some(text), error: None, .. },
                UiEvent::QueueChanged { pending: 0 }
            ] if text == "Paris"
        ));
        assert_eq!(pipeline.peek_next().map(|e| e.id), None);
        assert_eq!(
            pipeline.queue().status(id),
            Some(QuestionStatus::Answered)
        );
    }

    #[test]
    fn non_question_snippet_leaves_queue_unchanged() {
        let mut pipeline = pipeline_with(Arc::new(InstantService { reply: "" }));
        let events = pipeline.handle_snippet("the sky is blue today", Instant::now());
        assert!(events.is_empty());
        assert_eq!(pipeline.pending_count(), 0);
    }

    #[test]
    fn duplicate_snippet_inside_window_is_suppressed() {
        let mut pipeline = pipeline_with(Arc::new(InstantService { reply: "" }));
        let start = Instant::now();
        pipeline.handle_snippet("how do plants grow", start);
        let events = pipeline.handle_snippet("how do plants grow", start + Duration::from_secs(2));
        assert!(events.is_empty());
        assert_eq!(pipeline.pending_count(), 1);
    }

    #[test]
    fn pending_text_blocks_readmission_even_past_the_window() {
        let mut pipeline = pipeline_with(Arc::new(InstantService { reply: "" }));
        let start = Instant::now();
        pipeline.handle_snippet("how do plants grow", start);
        // Way past the debounce window, but still Pending in the queue.
        let events =
            pipeline.handle_snippet("how do plants grow", start + Duration::from_secs(3600));
        assert!(events.is_empty());
        assert_eq!(pipeline.pending_count(), 1);
    }

    #[test]
    fn failed_dispatch_resolves_ignored_with_error_indicator() {
        let service = Arc::new(FailingService {
            calls: AtomicU32::new(0),
        });
        let calls = Arc::clone(&service);
        let mut pipeline = pipeline_with(service);
        pipeline.handle_snippet("when did rome fall", Instant::now());
        let id = pipeline.peek_next().expect("queued").id;

        pipeline.request_answer(id);
        let events = wait_for_dispatch(&mut pipeline);

        // Default budget is one retry: two attempts total.
        assert_eq!(calls.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(
            events.as_slice(),
            [
                UiEvent::AnswerReady { text: None, error: Some(_), .. },
                UiEvent::QueueChanged { pending: 0 }
            ]
        ));
        assert_eq!(pipeline.queue().status(id), Some(QuestionStatus::Ignored));
        let record = pipeline
            .queue()
            .get(id)
            .and_then(|e| e.answer.clone())
            .expect("error record attached");
        assert!(matches!(record.outcome, AnswerOutcome::Error(_)));
    }

    #[test]
    fn second_dispatch_while_one_in_flight_is_refused() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let mut pipeline = pipeline_with(Arc::new(GatedService {
            gate: Mutex::new(release_rx),
        }));
        let start = Instant::now();
        pipeline.handle_snippet("what is gravity", start);
        pipeline.handle_snippet("what is mass", start);
        let first = pipeline.peek_next().expect("queued").id;

        pipeline.request_answer(first);
        let events = pipeline.request_answer(first);
        assert!(matches!(
            events.as_slice(),
            [UiEvent::Error { recoverable: true, .. }]
        ));

        let _ = release_tx.send(());
        wait_for_dispatch(&mut pipeline);
    }

    #[test]
    fn ignored_event_discards_the_late_dispatch_result() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let mut pipeline = pipeline_with(Arc::new(GatedService {
            gate: Mutex::new(release_rx),
        }));
        pipeline.handle_snippet("what is entropy", Instant::now());
        let id = pipeline.peek_next().expect("queued").id;

        pipeline.request_answer(id);
        let events = pipeline.ignore(id);
        assert!(matches!(
            events.as_slice(),
            [UiEvent::QueueChanged { pending: 0 }]
        ));

        let _ = release_tx.send(());
        let events = wait_for_dispatch(&mut pipeline);
        assert!(events.is_empty(), "late result must be discarded");
        assert_eq!(pipeline.queue().status(id), Some(QuestionStatus::Ignored));
        assert!(pipeline
            .queue()
            .get(id)
            .and_then(|e| e.answer.clone())
            .is_none());
    }

    #[test]
    fn request_answer_for_resolved_event_is_refused() {
        let mut pipeline = pipeline_with(Arc::new(InstantService { reply: "" }));
        pipeline.handle_snippet("what is ph", Instant::now());
        let id = pipeline.peek_next().expect("queued").id;
        pipeline.ignore(id);
        let events = pipeline.request_answer(id);
        assert!(matches!(
            events.as_slice(),
            [UiEvent::Error { recoverable: true, .. }]
        ));
        assert!(!pipeline.dispatch_in_flight());
    }

    #[test]
    fn multi_sentence_snippet_enqueues_each_question_in_order() {
        let mut pipeline = pipeline_with(Arc::new(InstantService { reply: "" }));
        pipeline.handle_snippet(
            "what is gravity? we talked about it. how do magnets work?",
            Instant::now(),
        );
        assert_eq!(pipeline.pending_count(), 2);
        assert_eq!(
            pipeline.peek_next().map(|e| e.text.as_str()),
            Some("what is gravity")
        );
    }
}
