//! Scan session: the record of one run against one target.
//!
//! A session moves `Idle -> Running -> (Completed | Cancelled)` exactly once.
//! Results are appended while running; once finished the session is frozen
//! and only readable.

use crate::error::{ScanError, ScanResult};
use crate::scanner::traits::{PortStatus, ProbeResult, Protocol, ProtocolSelection};
use crate::types::{PortSet, ScanTarget};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl SessionState {
    /// Completed or cancelled.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Advisory progress counters, reported after every completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    pub open: usize,
}

/// Everything known about one scan.
#[derive(Debug, Clone)]
pub struct ScanSession {
    target: ScanTarget,
    ports: PortSet,
    protocols: ProtocolSelection,
    total_tasks: usize,
    results: Vec<ProbeResult>,
    open: usize,
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
    elapsed: Option<Duration>,
}

impl ScanSession {
    /// Create an idle session planning one probe per port and protocol.
    pub fn new(target: ScanTarget, ports: PortSet, protocols: ProtocolSelection) -> Self {
        let total_tasks = ports.len() * protocols.protocols().len();
        Self {
            target,
            ports,
            protocols,
            total_tasks,
            results: Vec::with_capacity(total_tasks),
            open: 0,
            state: SessionState::Idle,
            started_at: None,
            elapsed: None,
        }
    }

    /// Move from idle to running.
    pub fn begin(&mut self) -> ScanResult<()> {
        if self.state != SessionState::Idle {
            return Err(ScanError::InvalidState(self.state));
        }
        self.state = SessionState::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Append a completed probe result. Ignored once the session is final.
    pub fn record(&mut self, result: ProbeResult) {
        if self.state != SessionState::Running {
            return;
        }
        if result.is_open() {
            self.open += 1;
        }
        self.results.push(result);
    }

    /// Freeze the session, recording how long it ran.
    pub fn finish(&mut self, cancelled: bool, elapsed: Duration) {
        if self.state.is_final() {
            return;
        }
        self.state = if cancelled {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        };
        self.elapsed = Some(elapsed);
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            completed: self.results.len(),
            total: self.total_tasks,
            open: self.open,
        }
    }

    pub fn target(&self) -> &ScanTarget {
        &self.target
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn protocols(&self) -> ProtocolSelection {
        self.protocols
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn total_tasks(&self) -> usize {
        self.total_tasks
    }

    /// Results in completion order.
    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    /// Results ordered by protocol then port, for presentation.
    pub fn sorted_results(&self) -> Vec<&ProbeResult> {
        let mut sorted: Vec<&ProbeResult> = self.results.iter().collect();
        sorted.sort_by_key(|r| (r.protocol, r.port));
        sorted
    }

    /// Definitely open ports.
    pub fn open_count(&self) -> usize {
        self.open
    }

    /// Number of results with the given status.
    pub fn count_status(&self, status: PortStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// `port/PROTO` for every open or possibly-open result, sorted.
    pub fn open_ports(&self) -> Vec<String> {
        self.sorted_results()
            .into_iter()
            .filter(|r| r.is_interesting())
            .map(|r| format!("{}/{}", r.port, r.protocol))
            .collect()
    }

    /// Results for one protocol.
    pub fn results_for(&self, protocol: Protocol) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(move |r| r.protocol == protocol)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Wall-clock duration, set when the session finishes.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == SessionState::Cancelled
    }
}
