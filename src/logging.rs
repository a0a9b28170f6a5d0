use std::collections::HashMap;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::shared::paths::{ensure_dir, get_log_dir};

/// Targets that get their own log file. Everything else goes to `system.log`.
pub const LOG_TARGETS: [&str; 3] = ["capture", "encoder", "session"];

/// Guards that must be kept alive to ensure logs are flushed
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

/// Routes events to a per-target file writer.
struct TargetWriter {
    writers: HashMap<&'static str, NonBlocking>,
    system_writer: NonBlocking,
}

impl TargetWriter {
    fn writer_for(&self, target: &str) -> &NonBlocking {
        self.writers
            .iter()
            .find(|(name, _)| target_matches(target, name))
            .map(|(_, writer)| writer)
            .unwrap_or(&self.system_writer)
    }
}

fn target_matches(target: &str, name: &str) -> bool {
    target == name
        || target
            .strip_prefix(name)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<'a> MakeWriter<'a> for TargetWriter {
    type Writer = NonBlocking;

    fn make_writer(&'a self) -> Self::Writer {
        self.system_writer.clone()
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        self.writer_for(meta.target()).clone()
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging with per-target daily log files plus stderr.
///
/// Falls back to stderr only when the log directory cannot be created.
pub fn init_logging() -> LoggingGuards {
    init_logging_in(&get_log_dir())
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
}

pub fn init_logging_in(log_dir: &Path) -> LoggingGuards {
    if let Err(e) = ensure_dir(log_dir) {
        let installed = tracing_subscriber::registry()
            .with(env_filter())
            .with(stderr_layer())
            .try_init();
        if installed.is_ok() {
            tracing::warn!(target: "system", "Failed to create log dir {:?}: {}, logging to stderr only", log_dir, e);
        }
        return LoggingGuards { _guards: Vec::new() };
    }

    let mut guards = Vec::new();
    let mut writers = HashMap::new();

    for target in LOG_TARGETS {
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, format!("{}.log", target));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        writers.insert(target, non_blocking);
        guards.push(guard);
    }

    let system_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "system.log");
    let (system_writer, system_guard) = tracing_appender::non_blocking(system_appender);
    guards.push(system_guard);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(TargetWriter {
            writers,
            system_writer,
        })
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true);

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stderr_layer())
        .try_init();

    match installed {
        Ok(()) => tracing::info!(target: "system", "Logging initialized at {:?}", log_dir),
        Err(e) => eprintln!("[REGIONREEL] Tracing subscriber already set: {}", e),
    }

    LoggingGuards { _guards: guards }
}
