//! Event sinks.
//!
//! The [`Sink`] trait is the boundary between collection and whatever ships
//! events downstream. Publishing is fire-and-forget: a sink logs its own
//! failures and never reports back to the collector, so a collected file is
//! recorded in the registrar whether or not the sink accepted it.
//!
//! Two implementations are provided:
//!
//! - [`JsonLinesSink`]: one JSON object per line to any writer (stdout or an
//!   append-mode file, see [`open_sink`])
//! - [`ChannelSink`]: forwards events to a tokio channel, for embedding the
//!   agent in another async program
//!
//! # Examples
//!
//! ```
//! use lb_agent::{ChannelSink, Sink};
//!
//! let (mut sink, mut rx) = ChannelSink::new();
//! sink.close();
//! assert!(rx.try_recv().is_err());
//! ```

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};

use lb_core::{OutboundEvent, OutputConfig};
use tokio::sync::mpsc;

use crate::error::AgentError;

/// Destination for collected events.
///
/// Implementations must be [`Send`] because the scheduler moves its sink
/// into the blocking pool for every cycle.
pub trait Sink: Send {
    /// Hands one event to the sink. Failures are the sink's to log.
    fn publish(&mut self, event: OutboundEvent);

    /// Releases the sink. Called exactly once, when the agent stops.
    fn close(&mut self);
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn publish(&mut self, event: OutboundEvent) {
        (**self).publish(event);
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Writes events as JSON, one object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    pretty: bool,
    published: u64,
    failed: u64,
}

impl<W: Write + Send> std::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink")
            .field("pretty", &self.pretty)
            .field("published", &self.published)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Creates a sink writing compact JSON lines to `writer`.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
            published: 0,
            failed: 0,
        }
    }

    /// Switches to pretty-printed output.
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Number of events written successfully.
    #[inline]
    #[must_use]
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Number of events that could not be written.
    #[inline]
    #[must_use]
    pub const fn failed(&self) -> u64 {
        self.failed
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &OutboundEvent) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, event)?;
        } else {
            serde_json::to_writer(&mut self.writer, event)?;
        }
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn publish(&mut self, event: OutboundEvent) {
        match self.write_event(&event) {
            Ok(()) => self.published += 1,
            Err(e) => {
                self.failed += 1;
                tracing::error!(path = %event.path, error = %e, "Failed to write event");
            }
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(error = %e, "Failed to flush event output on close");
        }
        tracing::debug!(published = self.published, failed = self.failed, "Event sink closed");
    }
}

/// Forwards events to an unbounded tokio channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<OutboundEvent>>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    ///
    /// The receiver sees the channel close once [`Sink::close`] is called.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Returns `true` until the sink is closed.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.tx.is_some()
    }
}

impl Sink for ChannelSink {
    fn publish(&mut self, event: OutboundEvent) {
        let Some(tx) = &self.tx else {
            tracing::warn!(path = %event.path, "Event published after close, dropping");
            return;
        };
        if tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding event");
        }
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

/// Opens the sink described by `config`.
///
/// With no path, events go to stdout. Otherwise the file is created if
/// needed and appended to.
///
/// # Errors
///
/// Returns [`AgentError::Output`] if the output file cannot be opened.
pub fn open_sink(config: &OutputConfig) -> Result<JsonLinesSink<Box<dyn Write + Send>>, AgentError> {
    let writer: Box<dyn Write + Send> = match &config.path {
        None => Box::new(io::stdout()),
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| AgentError::output(path, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AgentError::output(path, e))?;
            tracing::info!(path = %path, "Writing events to file");
            Box::new(BufWriter::new(file))
        }
    };
    Ok(JsonLinesSink::new(writer).with_pretty(config.pretty))
}
