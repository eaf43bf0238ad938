//! Tracing subscriber setup.

use std::sync::OnceLock;

use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{Format, Logger};
use crate::errors::Error;
use crate::Result;

static FILE_APPENDER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const MODULE_WHITELIST: &[&str] = &["termclass"];

/// Builds the `EnvFilter` directive for a logger configuration.
///
/// `RUST_LOG` wins over `override_filter`, which wins over the configured
/// level applied to this crate.
#[must_use]
pub fn filter_directive(config: &Logger) -> String {
    if let Ok(from_env) = std::env::var("RUST_LOG") {
        if !from_env.is_empty() {
            return from_env;
        }
    }
    config.override_filter.clone().unwrap_or_else(|| {
        MODULE_WHITELIST
            .iter()
            .map(|module| format!("{module}={}", config.level))
            .collect::<Vec<_>>()
            .join(",")
    })
}

fn fmt_layer<S, W>(format: Format, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_ansi(ansi).with_writer(writer);
    match format {
        Format::Compact => layer.compact().boxed(),
        Format::Pretty => layer.pretty().boxed(),
        Format::Json => layer.json().boxed(),
    }
}

/// Installs the global subscriber described by `config`.
///
/// Does nothing when logging is disabled or a subscriber is already set.
///
/// # Errors
///
/// Returns an error when the filter directive is invalid.
pub fn init(config: &Logger) -> Result<()> {
    if !config.enable || tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = EnvFilter::try_new(filter_directive(config))
        .map_err(|err| Error::Message(format!("invalid log filter: {err}")))?;

    let mut layers = vec![fmt_layer(config.format, std::io::stderr, true)];
    if let Some(appender) = config.file_appender.as_ref().filter(|a| a.enable) {
        let file = tracing_appender::rolling::daily(&appender.dir, &appender.filename_prefix);
        let (writer, guard) = tracing_appender::non_blocking(file);
        // The writer stops once its guard drops.
        if FILE_APPENDER_GUARD.set(guard).is_ok() {
            layers.push(fmt_layer(config.format, writer, false));
        } else {
            debug!(dir = %appender.dir.display(), "file_appender_already_installed");
        }
    }

    // Another thread may have won the race since the check above.
    if let Err(err) = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
    {
        debug!(err.msg = %err, "logger_already_initialized");
    }
    Ok(())
}
