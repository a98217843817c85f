//! JSON report sink.

use super::ResultSink;
use crate::error::SinkError;
use crate::output::{write_json, JsonReport};
use crate::scanner::{ProbeResult, ScanSession};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes the whole report once the session is final.
///
/// The file is created up front so a bad path is reported before the scan
/// starts rather than after it.
pub struct JsonSink {
    path: PathBuf,
    file: Option<File>,
}

impl JsonSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonSink {
    fn name(&self) -> &str {
        "json"
    }

    // The report is built from the final session.
    fn on_result(&mut self, _result: &ProbeResult) -> Result<(), SinkError> {
        Ok(())
    }

    fn on_complete(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let mut writer = BufWriter::new(file);
        write_json(&mut writer, &JsonReport::from_session(session))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PortStatus, Protocol, ProtocolSelection};
    use crate::types::{Port, PortSet, ScanTarget};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    #[test]
    fn test_writes_report_on_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        let mut sink = JsonSink::create(&path).unwrap();

        let mut session = ScanSession::new(
            ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            PortSet::resolve("1-3").unwrap(),
            ProtocolSelection::Tcp,
        );
        session.begin().unwrap();
        for port in [3, 1] {
            session.record(ProbeResult::new(
                Port::new(port).unwrap(),
                Protocol::Tcp,
                PortStatus::Open,
            ));
        }
        session.finish(true, Duration::from_millis(5));
        sink.on_complete(&session).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["scan_metadata"]["state"], "cancelled");
        assert_eq!(value["scan_metadata"]["open_ports_count"], 2);
        let ports: Vec<u64> = value["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["port"].as_u64().unwrap())
            .collect();
        assert_eq!(ports, vec![1, 3]);
    }
}
