//! Plain-text scan log.
//!
//! Lines look like `2024-05-01 12:00:00,123 - INFO - Port 22/TCP: OPEN`.
//! This is the run's record for the operator, separate from `tracing`
//! diagnostics.

use super::ResultSink;
use crate::error::SinkError;
use crate::output::format_result_line;
use crate::scanner::{PortStatus, ProbeResult, ScanSession};
use chrono::Local;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// `dir/scan_YYYYmmdd_HHMMSS.log` for the current local time.
pub fn default_log_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref()
        .join(Local::now().format("scan_%Y%m%d_%H%M%S.log").to_string())
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Info,
    Warning,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Writes a timestamped line per reportable event.
pub struct LogFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    verbose: bool,
}

impl LogFileSink {
    /// Create the log file, and its parent directories if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            verbose: false,
        })
    }

    /// Also log closed and filtered ports.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn line(&mut self, level: Level, message: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "{} - {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            level.as_str(),
            message
        )
    }
}

impl ResultSink for LogFileSink {
    fn name(&self) -> &str {
        "log"
    }

    fn on_start(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        let target = session.target();
        self.line(
            Level::Info,
            &format!(
                "Starting {} scan on host: {} ({})",
                session.protocols(),
                target.original,
                target.ip
            ),
        )?;
        self.line(
            Level::Info,
            &format!(
                "Scanning {} ports ({} probes)",
                session.ports().len(),
                session.total_tasks()
            ),
        )?;
        self.line(Level::Info, &format!("Log file: {}", self.path.display()))?;
        Ok(())
    }

    fn on_result(&mut self, result: &ProbeResult) -> Result<(), SinkError> {
        if result.status == PortStatus::Error {
            self.line(Level::Warning, &format_result_line(result))?;
        } else if result.is_interesting() || self.verbose {
            self.line(Level::Info, &format_result_line(result))?;
        }
        Ok(())
    }

    fn on_complete(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        if session.is_cancelled() {
            self.line(Level::Warning, "Scan interrupted by user")?;
        }

        let elapsed = session.elapsed().unwrap_or_default();
        self.line(
            Level::Info,
            &format!("Scan completed in {:.2} seconds.", elapsed.as_secs_f64()),
        )?;

        let open = session.open_ports();
        let found = if open.is_empty() {
            "None".to_string()
        } else {
            open.join(", ")
        };
        self.line(Level::Info, &format!("Open ports found: {}", found))?;

        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Protocol, ProtocolSelection};
    use crate::types::{Port, PortSet, ScanTarget};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    #[test]
    fn test_default_log_path() {
        let path = default_log_path("logs");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(path.starts_with("logs"));
        assert!(name.starts_with("scan_"));
        assert!(name.ends_with(".log"));
        // scan_ + YYYYmmdd_HHMMSS + .log
        assert_eq!(name.len(), 5 + 15 + 4);
    }

    #[test]
    fn test_log_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scan.log");
        let mut sink = LogFileSink::create(&path).unwrap();

        let mut session = ScanSession::new(
            ScanTarget::new("localhost", IpAddr::V4(Ipv4Addr::LOCALHOST)),
            PortSet::resolve("22,80").unwrap(),
            ProtocolSelection::Tcp,
        );
        session.begin().unwrap();
        sink.on_start(&session).unwrap();

        let open = ProbeResult::new(Port::new(22).unwrap(), Protocol::Tcp, PortStatus::Open);
        let closed = ProbeResult::new(Port::new(80).unwrap(), Protocol::Tcp, PortStatus::Closed);
        sink.on_result(&open).unwrap();
        sink.on_result(&closed).unwrap();
        session.record(open);
        session.record(closed);
        session.finish(true, Duration::from_millis(250));
        sink.on_complete(&session).unwrap();

        let log = fs::read_to_string(&path).unwrap();
        assert!(log.contains(" - INFO - Starting TCP scan on host: localhost (127.0.0.1)"));
        assert!(log.contains(" - INFO - Port 22/TCP: OPEN"));
        assert!(!log.contains("Port 80/TCP"));
        assert!(log.contains(" - WARNING - Scan interrupted by user"));
        assert!(log.contains("Open ports found: 22/TCP"));
    }

    #[test]
    fn test_verbose_logs_closed_ports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.log");
        let mut sink = LogFileSink::create(&path).unwrap().verbose(true);

        let closed = ProbeResult::new(Port::new(80).unwrap(), Protocol::Tcp, PortStatus::Closed);
        sink.on_result(&closed).unwrap();
        sink.writer.flush().unwrap();

        assert!(fs::read_to_string(&path).unwrap().contains("Port 80/TCP: CLOSED"));
    }
}
