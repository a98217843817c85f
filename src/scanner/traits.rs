//! Probe trait abstraction and the records that flow through a scan.
//!
//! Defines a common interface for the TCP and UDP probes so the coordinator
//! can schedule either (or a test double) without knowing which it holds.

use crate::types::Port;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Status of a probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortStatus {
    /// Port is open (service listening).
    Open,
    /// Port is closed (connection refused or ICMP port unreachable).
    Closed,
    /// No answer before the timeout, likely dropped by a firewall (TCP).
    Filtered,
    /// No UDP reply: either open and silent or filtered.
    #[serde(rename = "OPEN|FILTERED")]
    OpenOrFiltered,
    /// The probe failed with an unexpected socket error.
    Error,
}

impl PortStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Filtered => "FILTERED",
            Self::OpenOrFiltered => "OPEN|FILTERED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport protocol of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
        }
    }
}

/// Which protocols a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolSelection {
    /// TCP connect probes only.
    #[default]
    Tcp,
    /// UDP datagram probes only.
    Udp,
    /// Every port once over TCP and once over UDP.
    Both,
}

impl ProtocolSelection {
    /// Protocols in scheduling order.
    pub fn protocols(self) -> &'static [Protocol] {
        match self {
            Self::Tcp => &[Protocol::Tcp],
            Self::Udp => &[Protocol::Udp],
            Self::Both => &[Protocol::Tcp, Protocol::Udp],
        }
    }
}

impl fmt::Display for ProtocolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.protocols().iter().map(|p| p.to_string()).collect();
        write!(f, "{}", names.join("/"))
    }
}

impl std::str::FromStr for ProtocolSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "both" | "all" => Ok(Self::Both),
            _ => Err(format!("unknown protocol selection: {}", s)),
        }
    }
}

/// One unit of work: probe `port` on `target` over `protocol`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTask {
    pub target: IpAddr,
    pub port: Port,
    pub protocol: Protocol,
    pub timeout: Duration,
    pub stealth: bool,
}

/// Result of probing a single port over a single protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// The port number that was probed.
    pub port: Port,
    pub protocol: Protocol,
    /// Status determined by the probe.
    pub status: PortStatus,
    /// Banner or response text captured from the service (if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Identified service label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Software version, when the banner carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Socket error detail for `PortStatus::Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Create a new result stamped with the current time.
    pub fn new(port: Port, protocol: Protocol, status: PortStatus) -> Self {
        Self {
            port,
            protocol,
            status,
            banner: None,
            service: None,
            version: None,
            error: None,
            response_time_ms: None,
            timestamp: Utc::now(),
        }
    }

    /// A result for a probe that failed with an unexpected socket error.
    pub fn failed(port: Port, protocol: Protocol, error: impl fmt::Display) -> Self {
        let mut result = Self::new(port, protocol, PortStatus::Error);
        result.error = Some(error.to_string());
        result
    }

    /// Set the banner.
    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        self.banner = banner;
        self
    }

    /// Attach the service identification.
    pub fn with_service(mut self, service: Option<String>, version: Option<String>) -> Self {
        self.service = service;
        self.version = version;
        self
    }

    /// Set the response time.
    pub fn with_response_time(mut self, time_ms: u64) -> Self {
        self.response_time_ms = Some(time_ms);
        self
    }

    /// Check if the port is definitely open.
    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }

    /// Open, or possibly open (UDP silence). These are always reported.
    pub fn is_interesting(&self) -> bool {
        matches!(self.status, PortStatus::Open | PortStatus::OpenOrFiltered)
    }

    /// Service label with the version appended, e.g. `SSH (OpenSSH 8.2p1)`.
    pub fn service_label(&self) -> String {
        match (&self.service, &self.version) {
            (Some(service), Some(version)) => format!("{} ({})", service, version),
            (Some(service), None) => service.clone(),
            (None, _) => String::new(),
        }
    }
}

/// Trait for per-port probe implementations.
///
/// A probe must produce exactly one result per call and must classify every
/// socket outcome into a status rather than returning an error.
#[async_trait]
pub trait Probe: Send + Sync {
    /// The protocol this probe speaks.
    fn protocol(&self) -> Protocol;

    /// Probe a single port.
    async fn probe(&self, task: &ProbeTask) -> ProbeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_status_display() {
        assert_eq!(PortStatus::Open.to_string(), "OPEN");
        assert_eq!(PortStatus::Closed.to_string(), "CLOSED");
        assert_eq!(PortStatus::Filtered.to_string(), "FILTERED");
        assert_eq!(PortStatus::OpenOrFiltered.to_string(), "OPEN|FILTERED");
        assert_eq!(PortStatus::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_status_serializes_like_display() {
        let json = serde_json::to_string(&PortStatus::OpenOrFiltered).unwrap();
        assert_eq!(json, "\"OPEN|FILTERED\"");
        let json = serde_json::to_string(&Protocol::Udp).unwrap();
        assert_eq!(json, "\"UDP\"");
    }

    #[test]
    fn test_protocol_selection() {
        assert_eq!("both".parse::<ProtocolSelection>().unwrap(), ProtocolSelection::Both);
        assert_eq!(ProtocolSelection::Both.protocols(), &[Protocol::Tcp, Protocol::Udp]);
        assert_eq!(ProtocolSelection::Udp.to_string(), "UDP");
        assert_eq!(ProtocolSelection::Both.to_string(), "TCP/UDP");
        assert!("sctp".parse::<ProtocolSelection>().is_err());
    }

    #[test]
    fn test_probe_result_builders() {
        let port = Port::new(22).unwrap();
        let result = ProbeResult::new(port, Protocol::Tcp, PortStatus::Open)
            .with_banner(Some("SSH-2.0-OpenSSH_8.9".to_string()))
            .with_service(Some("SSH".to_string()), Some("OpenSSH 8.9".to_string()))
            .with_response_time(15);

        assert!(result.is_open());
        assert_eq!(result.service_label(), "SSH (OpenSSH 8.9)");
        assert_eq!(result.response_time_ms, Some(15));
    }

    #[test]
    fn test_failed_result() {
        let port = Port::new(80).unwrap();
        let result = ProbeResult::failed(port, Protocol::Tcp, "network unreachable");
        assert_eq!(result.status, PortStatus::Error);
        assert_eq!(result.error.as_deref(), Some("network unreachable"));
        assert!(!result.is_interesting());
        assert_eq!(result.service_label(), "");
    }
}
