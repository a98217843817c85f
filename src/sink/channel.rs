//! Forwarding sink for consumers on another task or thread.

use super::ResultSink;
use crate::error::SinkError;
use crate::scanner::{ProbeResult, ScanProgress, ScanSession, SessionState};
use tokio::sync::mpsc;

/// An event forwarded by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Started { total: usize },
    Result(ProbeResult),
    Progress(ScanProgress),
    Completed { state: SessionState, open: usize },
}

/// Sends every scan event down an unbounded channel.
///
/// The receiving half may live on any thread, e.g. a UI event loop that
/// must not run scan work itself. Once the receiver is dropped every call
/// fails with [`SinkError::Disconnected`].
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving half.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: SinkEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Disconnected)
    }
}

impl ResultSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    fn on_start(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        self.send(SinkEvent::Started {
            total: session.total_tasks(),
        })
    }

    fn on_result(&mut self, result: &ProbeResult) -> Result<(), SinkError> {
        self.send(SinkEvent::Result(result.clone()))
    }

    fn on_progress(&mut self, progress: ScanProgress) -> Result<(), SinkError> {
        self.send(SinkEvent::Progress(progress))
    }

    fn on_complete(&mut self, session: &ScanSession) -> Result<(), SinkError> {
        self.send(SinkEvent::Completed {
            state: session.state(),
            open: session.open_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PortStatus, Protocol};
    use crate::types::Port;

    #[test]
    fn test_forwards_events() {
        let (mut sink, mut rx) = ChannelSink::channel();
        let result = ProbeResult::new(Port::new(22).unwrap(), Protocol::Tcp, PortStatus::Open);

        sink.on_result(&result).unwrap();
        sink.on_progress(ScanProgress {
            completed: 1,
            total: 2,
            open: 1,
        })
        .unwrap();

        assert!(matches!(rx.try_recv(), Ok(SinkEvent::Result(r)) if r.port.as_u16() == 22));
        assert!(matches!(rx.try_recv(), Ok(SinkEvent::Progress(p)) if p.completed == 1));
    }

    #[test]
    fn test_dropped_receiver_disconnects() {
        let (mut sink, rx) = ChannelSink::channel();
        drop(rx);
        let result = ProbeResult::new(Port::new(22).unwrap(), Protocol::Tcp, PortStatus::Open);
        assert!(matches!(sink.on_result(&result), Err(SinkError::Disconnected)));
    }
}
