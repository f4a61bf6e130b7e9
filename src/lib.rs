pub mod answer;
pub mod config;
pub mod debounce;
pub mod detect;
mod logging;
pub mod pipeline;
pub mod protocol;
pub mod queue;
pub mod subject;
mod telemetry;

pub use logging::{init_logging, log_debug, log_debug_content, log_file_path};
pub use telemetry::init_tracing;
