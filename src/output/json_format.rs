//! JSON output formatting.

use crate::scanner::{PortStatus, ProbeResult, Protocol, ScanSession, SessionState};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

/// The complete JSON export document.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub scan_metadata: ScanMetadata,
    pub results: Vec<JsonResult>,
}

/// Summary block at the top of a JSON export.
#[derive(Debug, Serialize)]
pub struct ScanMetadata {
    pub target: String,
    pub resolved_ip: String,
    pub timestamp: String,
    pub total_ports_scanned: usize,
    /// Definitely open only; `OPEN|FILTERED` is not counted.
    pub open_ports_count: usize,
    pub protocols: String,
    pub duration_ms: u64,
    pub state: SessionState,
}

/// One exported probe result.
#[derive(Debug, Serialize)]
pub struct JsonResult {
    pub timestamp: String,
    pub port: u16,
    pub protocol: Protocol,
    pub status: PortStatus,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub banner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ProbeResult> for JsonResult {
    fn from(result: &ProbeResult) -> Self {
        Self {
            timestamp: result
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            port: result.port.as_u16(),
            protocol: result.protocol,
            status: result.status,
            service: result.service.clone().unwrap_or_default(),
            version: result.version.clone(),
            banner: result.banner.clone().unwrap_or_default(),
            error: result.error.clone(),
        }
    }
}

impl JsonReport {
    /// Build the report for a finished session, results sorted by protocol
    /// then port.
    pub fn from_session(session: &ScanSession) -> Self {
        let target = session.target();
        let started = session.started_at().unwrap_or_else(Utc::now);

        Self {
            scan_metadata: ScanMetadata {
                target: target.original.clone(),
                resolved_ip: target.ip.to_string(),
                timestamp: started.to_rfc3339_opts(SecondsFormat::Secs, true),
                total_ports_scanned: session.results().len(),
                open_ports_count: session.open_count(),
                protocols: session.protocols().to_string(),
                duration_ms: session
                    .elapsed()
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or_default(),
                state: session.state(),
            },
            results: session
                .sorted_results()
                .into_iter()
                .map(JsonResult::from)
                .collect(),
        }
    }
}

/// Write a report as indented JSON.
pub fn write_json<W: Write>(writer: W, report: &JsonReport) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(writer, report)
}
