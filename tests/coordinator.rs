//! Coordinator behaviour with instrumented probes.

use async_trait::async_trait;
use portscout::scanner::{
    PortStatus, Probe, ProbeResult, ProbeTask, Protocol, ProtocolSelection, ScanCoordinator,
    ScanJobConfig, SessionState,
};
use portscout::services::ServiceIdentifier;
use portscout::sink::{ChannelSink, ResultSink, SinkEvent};
use portscout::types::{PortSet, ScanTarget};
use portscout::SinkError;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Records how many probes run at once without touching the network.
struct CountingProbe {
    protocol: Protocol,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl CountingProbe {
    fn new(protocol: Protocol, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            protocol,
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Probe for CountingProbe {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn probe(&self, task: &ProbeTask) -> ProbeResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let status = if task.port.as_u16() % 10 == 0 {
            PortStatus::Open
        } else {
            PortStatus::Closed
        };
        ProbeResult::new(task.port, task.protocol, status)
    }
}

/// Panics on one port, answers every other.
struct PanicsOn(u16);

#[async_trait]
impl Probe for PanicsOn {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, task: &ProbeTask) -> ProbeResult {
        if task.port.as_u16() == self.0 {
            panic!("probe for port {} blew up", self.0);
        }
        ProbeResult::new(task.port, task.protocol, PortStatus::Closed)
    }
}

/// Cancels the scan once it has seen `after` results.
struct CancelAfter {
    token: CancellationToken,
    after: usize,
    seen: usize,
}

impl ResultSink for CancelAfter {
    fn name(&self) -> &str {
        "cancel-after"
    }

    fn on_result(&mut self, _result: &ProbeResult) -> Result<(), SinkError> {
        self.seen += 1;
        if self.seen == self.after {
            self.token.cancel();
        }
        Ok(())
    }

    fn on_complete(&mut self, _session: &portscout::ScanSession) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Always fails, to show one broken sink does not affect the others.
struct BrokenSink;

impl ResultSink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    fn on_result(&mut self, _result: &ProbeResult) -> Result<(), SinkError> {
        Err(SinkError::Disconnected)
    }

    fn on_complete(&mut self, _session: &portscout::ScanSession) -> Result<(), SinkError> {
        Err(SinkError::Disconnected)
    }
}

fn coordinator(spec: &str, job: impl FnOnce(ScanJobConfig) -> ScanJobConfig) -> ScanCoordinator {
    ScanCoordinator::with_identifier(
        ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        job(ScanJobConfig::new(PortSet::resolve(spec).unwrap())),
        Arc::new(ServiceIdentifier::builtin()),
    )
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let probe = CountingProbe::new(Protocol::Tcp, Duration::from_millis(10));
    let session = coordinator("1-200", |job| job.with_concurrency(8))
        .with_probe(probe.clone() as Arc<dyn Probe>)
        .run()
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.results().len(), 200);
    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak <= 8, "peak {} exceeded the limit", peak);
    assert!(peak > 1, "probes never overlapped");
}

#[tokio::test]
async fn test_one_result_per_task() {
    let tcp = CountingProbe::new(Protocol::Tcp, Duration::from_millis(1));
    let udp = CountingProbe::new(Protocol::Udp, Duration::from_millis(1));
    let session = coordinator("1-50", |job| {
        job.with_protocols(ProtocolSelection::Both).with_concurrency(16)
    })
    .with_probe(tcp.clone() as Arc<dyn Probe>)
    .with_probe(udp.clone() as Arc<dyn Probe>)
    .run()
    .await
    .unwrap();

    assert_eq!(session.total_tasks(), 100);
    assert_eq!(session.results().len(), 100);
    assert_eq!(tcp.started.load(Ordering::SeqCst), 50);
    assert_eq!(udp.started.load(Ordering::SeqCst), 50);

    let unique: HashSet<(u16, Protocol)> = session
        .results()
        .iter()
        .map(|r| (r.port.as_u16(), r.protocol))
        .collect();
    assert_eq!(unique.len(), 100);
    // Ports 10, 20, 30, 40, 50 on both protocols.
    assert_eq!(session.open_count(), 10);
}

#[tokio::test]
async fn test_cancellation_keeps_started_results() {
    let probe = CountingProbe::new(Protocol::Tcp, Duration::from_millis(20));
    let coordinator = coordinator("1-500", |job| job.with_concurrency(4));
    let token = coordinator.cancel_token();

    let session = coordinator
        .with_probe(probe.clone() as Arc<dyn Probe>)
        .with_sink(CancelAfter {
            token,
            after: 5,
            seen: 0,
        })
        .run()
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Cancelled);
    let delivered = session.results().len();
    assert!(delivered >= 5);
    assert!(delivered < 500);
    // Every probe that started reported exactly once.
    assert_eq!(delivered, probe.started.load(Ordering::SeqCst));

    let unique: HashSet<u16> = session.results().iter().map(|r| r.port.as_u16()).collect();
    assert_eq!(unique.len(), delivered);
}

#[tokio::test]
async fn test_cancel_through_handle() {
    let probe = CountingProbe::new(Protocol::Tcp, Duration::from_millis(50));
    let handle = coordinator("1-1000", |job| job.with_concurrency(2))
        .with_probe(probe.clone() as Arc<dyn Probe>)
        .spawn();

    tokio::time::sleep(Duration::from_millis(120)).await;
    handle.cancel();
    let session = handle.join().await.unwrap();

    assert!(session.is_cancelled());
    assert_eq!(session.results().len(), probe.started.load(Ordering::SeqCst));
    assert!(session.elapsed().is_some());
}

#[tokio::test]
async fn test_sinks_receive_every_event() {
    let probe = CountingProbe::new(Protocol::Tcp, Duration::from_millis(1));
    let (sink, mut rx) = ChannelSink::channel();

    let session = coordinator("1-30", |job| job.with_concurrency(5))
        .with_probe(probe as Arc<dyn Probe>)
        .with_sink(BrokenSink)
        .with_sink(sink)
        .run()
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(SinkEvent::Started { total: 30 })));
    assert!(matches!(
        events.last(),
        Some(SinkEvent::Completed {
            state: SessionState::Completed,
            open: 3
        })
    ));

    let results = events
        .iter()
        .filter(|e| matches!(e, SinkEvent::Result(_)))
        .count();
    assert_eq!(results, 30);

    let last_progress = events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(last_progress.completed, 30);
    assert_eq!(last_progress.total, 30);
    assert_eq!(session.open_count(), 3);
}

#[tokio::test]
async fn test_rate_limit_paces_admission() {
    let probe = CountingProbe::new(Protocol::Tcp, Duration::ZERO);
    let start = std::time::Instant::now();

    let session = coordinator("1-5", |job| job.with_rate_limit(20))
        .with_probe(probe as Arc<dyn Probe>)
        .run()
        .await
        .unwrap();

    // Five admissions at 20/s are spread over at least 200ms.
    assert_eq!(session.results().len(), 5);
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_panicking_worker_reports_error_and_completes() {
    let session = coordinator("1-10", |job| job.with_concurrency(3))
        .with_probe(Arc::new(PanicsOn(4)) as Arc<dyn Probe>)
        .run()
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.results().len(), 10);
    let failed = session
        .results()
        .iter()
        .find(|r| r.port.as_u16() == 4)
        .unwrap();
    assert_eq!(failed.status, PortStatus::Error);
    assert!(failed.error.is_some());
    assert_eq!(session.count_status(PortStatus::Closed), 9);
}
