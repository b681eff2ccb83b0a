//! Tracing setup and per-invocation log buffering

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const ENV_LOG_BUFFERING: &str = "LOG_BUFFERING";

/// Logging options read before anything else is initialized
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Collect log lines in memory and emit them once per invocation
    pub log_buffering: bool,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            log_buffering: std::env::var(ENV_LOG_BUFFERING)
                .map(|value| parse_flag(&value))
                .unwrap_or(false),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// In-memory sink for formatted log lines
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything buffered so far, leaving the buffer empty
    pub fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Write buffered lines to `out`
    pub fn flush_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let contents = self.drain();
        if contents.is_empty() {
            return Ok(());
        }
        out.write_all(&contents)?;
        out.flush()
    }

    /// Write buffered lines to stdout, where the Lambda runtime picks them up
    pub fn flush_to_stdout(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.flush_to(&mut handle)
    }
}

/// Writer handed out to the fmt layer for each event
pub struct LogBufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogBufferWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Build the default filter: `info` globally, `debug` for this crate, AWS SDK internals capped
/// at `warn`
fn default_filter(service_name: &str) -> Result<EnvFilter> {
    let filter = EnvFilter::new("info")
        .add_directive(
            format!("{}=debug", service_name.replace('-', "_"))
                .parse()
                .context("Invalid crate log directive")?,
        )
        .add_directive("aws_config=warn".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?)
        .add_directive("aws_sdk_ssm=warn".parse()?)
        .add_directive("hyper=warn".parse()?);
    Ok(filter)
}

/// Install the global tracing subscriber.
///
/// Returns the buffer to flush after each invocation when buffering is enabled.
pub fn init_tracing(config: &TelemetryConfig) -> Result<Option<LogBuffer>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.service_name)?,
    };

    let buffer = config.log_buffering.then(LogBuffer::new);
    let writer = match &buffer {
        Some(buffer) => BoxMakeWriter::new(buffer.clone()),
        None => BoxMakeWriter::new(io::stdout),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        log_buffering = config.log_buffering,
        "Tracing initialized"
    );

    Ok(buffer)
}
