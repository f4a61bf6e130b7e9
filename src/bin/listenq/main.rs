//! JSON session loop: UI commands in on stdin, pipeline events out on stdout.
//!
//! The transcript source and the UI are both external; snippets arrive as
//! `snippet` commands and everything observable leaves as newline-delimited
//! JSON events. The loop itself never blocks on the answer service — that
//! work happens on the dispatch worker and is drained here each tick.

use anyhow::Result;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use listenq::answer::{AnswerService, OpenAiAnswerService};
use listenq::config::AppConfig;
use listenq::pipeline::Pipeline;
use listenq::protocol::{UiCommand, UiEvent};
use listenq::{init_logging, init_tracing, log_debug, log_debug_content};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);

    if config.print_settings {
        print_settings(&config);
        return Ok(());
    }

    let service: Arc<dyn AnswerService> = Arc::new(OpenAiAnswerService::from_config(&config)?);
    run_session(config, service)
}

fn run_session(config: AppConfig, service: Arc<dyn AnswerService>) -> Result<()> {
    let session_id = format!(
        "{:x}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
    );
    let service_name = service.name();
    let mut pipeline = Pipeline::new(&config, service);

    let (command_tx, command_rx) = bounded(COMMAND_CHANNEL_CAPACITY);
    let _reader = spawn_stdin_reader(command_tx);

    emit(&capabilities_event(&config, &session_id, service_name));
    tracing::info!(subject = config.subject.label(), "session started");
    log_debug(&format!("session {session_id} started"));

    let tick = Duration::from_millis(config.tick_ms);
    loop {
        match command_rx.recv_timeout(tick) {
            Ok(UiCommand::Shutdown) => break,
            Ok(command) => {
                for event in handle_command(&mut pipeline, &config, &session_id, service_name, command)
                {
                    emit(&event);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break, // stdin closed
        }
        for event in pipeline.poll_dispatch() {
            emit(&event);
        }
    }

    // Let an in-flight dispatch finish so piped sessions still see the answer.
    let drain_budget = config
        .answer_timeout_ms
        .saturating_mul(u64::from(config.answer_retries) + 1)
        .saturating_add(1_000);
    let drain_deadline = Instant::now() + Duration::from_millis(drain_budget);
    while pipeline.dispatch_in_flight() && Instant::now() < drain_deadline {
        thread::sleep(tick);
        for event in pipeline.poll_dispatch() {
            emit(&event);
        }
    }

    log_debug("session loop exiting");
    Ok(())
}

fn handle_command(
    pipeline: &mut Pipeline,
    config: &AppConfig,
    session_id: &str,
    service_name: &str,
    command: UiCommand,
) -> Vec<UiEvent> {
    match command {
        UiCommand::Snippet { text } => {
            log_debug_content(&format!("snippet: {text}"));
            pipeline.handle_snippet(&text, Instant::now())
        }
        UiCommand::RequestAnswer { id } => pipeline.request_answer(id),
        UiCommand::Visualize { id } => pipeline.request_visualization(id),
        UiCommand::Ignore { id } => pipeline.ignore(id),
        UiCommand::Peek => vec![match pipeline.peek_next() {
            Some(event) => UiEvent::Status {
                message: format!("next pending: [{}] {}", event.id.0, event.text),
            },
            None => UiEvent::Status {
                message: "queue empty".to_string(),
            },
        }],
        UiCommand::GetCapabilities => vec![capabilities_event(config, session_id, service_name)],
        UiCommand::Shutdown => Vec::new(), // handled by the loop
    }
}

fn capabilities_event(config: &AppConfig, session_id: &str, service_name: &str) -> UiEvent {
    UiEvent::Capabilities {
        session_id: session_id.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subject: config.subject.label().to_string(),
        service: service_name.to_string(),
        model: config.model.clone(),
        debounce_window_ms: config.debounce_window_ms,
        answer_retries: config.answer_retries,
        answer_timeout_ms: config.answer_timeout_ms,
    }
}

fn emit(event: &UiEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{json}");
        let _ = stdout.flush();
    }
}

fn spawn_stdin_reader(tx: Sender<UiCommand>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<UiCommand>(trimmed) {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break; // main loop has exited
                    }
                }
                Err(err) => {
                    emit(&UiEvent::Error {
                        message: format!("invalid command: {err}"),
                        recoverable: true,
                    });
                }
            }
        }
        log_debug("stdin reader exiting");
    })
}

fn print_settings(config: &AppConfig) {
    println!("listenq settings");
    println!("  subject             {}", config.subject.label());
    println!("  model               {}", config.model);
    println!("  api endpoint        {}", config.api_endpoint);
    println!("  debounce window ms  {}", config.debounce_window_ms);
    println!("  answer retries      {}", config.answer_retries);
    println!("  answer timeout ms   {}", config.answer_timeout_ms);
    println!("  tick ms             {}", config.tick_ms);
}
