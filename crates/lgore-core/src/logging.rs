//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output always; a daily-rotating file (via `tracing-appender`) when a
//! directory is given. Thread ids are on by default since the interesting
//! question with pinned workers is usually "which thread said that".
//! `RUST_LOG` overrides the configured level.

use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

/// Logging settings, usually filled from CLI flags.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Default level if `RUST_LOG` is not set (e.g. `"info"`).
    pub level: &'a str,
    /// Directory for daily-rotating log files.
    pub dir: Option<&'a str>,
    /// Log file prefix.
    pub file_prefix: &'a str,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LogOptions<'_> {
    fn default() -> Self {
        Self { level: "info", dir: None, file_prefix: "lgore", json: false }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn console_layer(json: bool) -> BoxedLayer {
    let layer = fmt::layer().with_target(true).with_thread_ids(true);
    if json { layer.json().boxed() } else { layer.with_ansi(true).boxed() }
}

fn file_layer(dir: &str, prefix: &str, json: bool) -> BoxedLayer {
    let appender = tracing_appender::rolling::daily(dir, prefix);
    let layer = fmt::layer()
        .with_writer(appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);
    if json { layer.json().boxed() } else { layer.boxed() }
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(opts: &LogOptions<'_>) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(opts.level));

    let mut layers = vec![console_layer(opts.json)];
    if let Some(dir) = opts.dir {
        layers.push(file_layer(dir, opts.file_prefix, opts.json));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
}
