//! Result sinks: where completed probe results go.
//!
//! The coordinator never renders or stores anything itself. It calls every
//! registered [`ResultSink`] as results arrive, in completion order. A sink
//! that fails is reported and skipped; the scan and the other sinks carry on.
//!
//! Sinks are opened by their constructors (files are created before the scan
//! starts) and flushed in [`ResultSink::on_complete`].

mod channel;
mod console;
mod csv_sink;
mod json_sink;
mod log_file;

pub use channel::{ChannelSink, SinkEvent};
pub use console::ConsoleSink;
pub use csv_sink::CsvSink;
pub use json_sink::JsonSink;
pub use log_file::{default_log_path, LogFileSink};

use crate::error::SinkError;
use crate::scanner::{ProbeResult, ScanProgress, ScanSession};

/// Destination for scan events.
///
/// Results are passed by reference; a sink that keeps them clones what it
/// needs. Results arrive unordered with respect to port number.
pub trait ResultSink: Send {
    /// Short name used when reporting failures.
    fn name(&self) -> &str;

    /// Called once when the session starts running.
    fn on_start(&mut self, _session: &ScanSession) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called once per completed probe.
    fn on_result(&mut self, result: &ProbeResult) -> Result<(), SinkError>;

    /// Called after every completed probe.
    fn on_progress(&mut self, _progress: ScanProgress) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called once with the final (completed or cancelled) session.
    fn on_complete(&mut self, session: &ScanSession) -> Result<(), SinkError>;
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_start(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        (**self).on_start(session)
    }

    fn on_result(&mut self, result: &ProbeResult) -> Result<(), SinkError> {
        (**self).on_result(result)
    }

    fn on_progress(&mut self, progress: ScanProgress) -> Result<(), SinkError> {
        (**self).on_progress(progress)
    }

    fn on_complete(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        (**self).on_complete(session)
    }
}
