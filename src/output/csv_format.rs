//! CSV output formatting.

use crate::scanner::ProbeResult;
use crate::types::ScanTarget;
use chrono::SecondsFormat;

/// Column order of every CSV export.
pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "target",
    "resolved_ip",
    "port",
    "protocol",
    "status",
    "service",
    "banner",
];

/// One CSV row for a result, in [`CSV_HEADER`] order.
pub fn csv_record(target: &ScanTarget, result: &ProbeResult) -> [String; 8] {
    [
        result
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Micros, true),
        target.original.clone(),
        target.ip.to_string(),
        result.port.to_string(),
        result.protocol.to_string(),
        result.status.to_string(),
        result.service_label(),
        result.banner.clone().unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PortStatus, Protocol};
    use crate::types::Port;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_record_columns() {
        let target = ScanTarget::new("localhost", IpAddr::V4(Ipv4Addr::LOCALHOST));
        let result = ProbeResult::new(Port::new(22).unwrap(), Protocol::Tcp, PortStatus::Open)
            .with_banner(Some("SSH-2.0-OpenSSH_8.9".to_string()))
            .with_service(Some("SSH".to_string()), Some("OpenSSH 8.9".to_string()));

        let record = csv_record(&target, &result);
        assert_eq!(record.len(), CSV_HEADER.len());
        assert_eq!(&record[1..], &[
            "localhost".to_string(),
            "127.0.0.1".to_string(),
            "22".to_string(),
            "TCP".to_string(),
            "OPEN".to_string(),
            "SSH (OpenSSH 8.9)".to_string(),
            "SSH-2.0-OpenSSH_8.9".to_string(),
        ]);
        assert!(record[0].ends_with('Z'));
    }

    #[test]
    fn test_record_without_service_or_banner() {
        let target = ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let result = ProbeResult::new(Port::new(9999).unwrap(), Protocol::Udp, PortStatus::OpenOrFiltered);

        let record = csv_record(&target, &result);
        assert_eq!(record[5], "OPEN|FILTERED");
        assert_eq!(record[6], "");
        assert_eq!(record[7], "");
    }
}
