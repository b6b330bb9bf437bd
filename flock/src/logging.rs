//! # Logging
//!
//! `tracing` subscriber setup for applications embedding a pool. The pool
//! itself only emits events; nothing is printed until one of the `init*`
//! functions installs a global subscriber.
//!
//! ```rust
//! use flock::logging::{self, LogConfig};
//!
//! logging::init(LogConfig {
//!     level: tracing::Level::DEBUG,
//!     target_filters: Some("flock::pool=trace".to_string()),
//!     ..Default::default()
//! });
//! ```
//!
//! Pool events carry a `worker` field; execution unit threads run inside a
//! [`worker_span!`](crate::worker_span) so job function logs can be traced
//! back to their worker.

use std::fs::OpenOptions;
use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global subscriber described by `config`.
///
/// Only the first `init*` call in a process takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config));
        set_global_subscriber(subscriber);
    });
}

/// Like [`init`], additionally appending plain-text logs to `log_file`.
///
/// # Errors
/// Returns an error if the file cannot be opened or created.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    file_writer(log_file)?;

    let path = log_file.to_string();
    INIT.call_once(move || {
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config))
            .with(file_layer);
        set_global_subscriber(subscriber);
    });
    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level with worker lifecycle detail.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("flock=debug,flock::worker=trace".to_string()),
        ..Default::default()
    });
}

/// JSON output without source locations.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        ..Default::default()
    });
}

/// Warnings and errors only, compact.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        show_thread_info: false,
        show_time: false,
        ..Default::default()
    });
}

/// Opens `path` for appending, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for directive in filters.split(',') {
            match directive.trim().parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("Ignoring log filter {:?}: {}", directive, e),
            }
        }
    }
    filter
}

fn console_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if config.json_format {
        return fmt::layer()
            .json()
            .flatten_event(true)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info)
            .boxed();
    }

    let layer = fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info);
    if config.show_time {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    }
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens a span carrying a worker id.
///
/// ```rust
/// use flock::worker_span;
/// use flock::WorkerId;
///
/// let worker = WorkerId::from("9b1d3f0a");
/// let span = worker_span!(worker);
/// let _guard = span.enter();
///
/// let span = worker_span!(worker, queue_len = 3);
/// ```
#[macro_export]
macro_rules! worker_span {
    ($worker:expr) => {
        tracing::info_span!("worker", id = %$worker)
    };
    ($worker:expr, $($fields:tt)*) => {
        tracing::info_span!("worker", id = %$worker, $($fields)*)
    };
}
