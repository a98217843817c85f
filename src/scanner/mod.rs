//! Scanner module - coordinates probes across a worker pool.
//!
//! The [`ScanCoordinator`] expands a port set into one [`ProbeTask`] per
//! port and protocol, admits them in order into a pool bounded by a
//! semaphore, and hands every result to the registered sinks as it lands.
//!
//! Workers never touch the session. They send results over a channel to the
//! coordinator loop, which is the only writer of the session and its
//! counters.

pub mod rate_limiter;
pub mod session;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use rate_limiter::RateLimiter;
pub use session::{ScanProgress, ScanSession, SessionState};
pub use tcp::TcpProbe;
pub use traits::{PortStatus, Probe, ProbeResult, ProbeTask, Protocol, ProtocolSelection};
pub use udp::UdpProbe;

use crate::error::{ScanError, ScanResult, SinkError};
use crate::services::ServiceIdentifier;
use crate::sink::ResultSink;
use crate::types::{Port, PortSet, ScanTarget};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for a scan job.
#[derive(Debug, Clone)]
pub struct ScanJobConfig {
    /// Ports to probe.
    pub ports: PortSet,
    /// Protocols to probe each port over.
    pub protocols: ProtocolSelection,
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Per-probe connect/response timeout.
    pub timeout: Duration,
    /// Separate bound for the TCP banner exchange.
    pub banner_timeout: Duration,
    /// Datagrams sent per UDP port before giving up.
    pub udp_attempts: u32,
    /// Randomised delay before each TCP connect.
    pub stealth: bool,
    /// Maximum probes started per second, 0 for unlimited.
    pub rate_limit: u32,
}

impl ScanJobConfig {
    pub const DEFAULT_CONCURRENCY: usize = 200;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// Create a TCP job over `ports` with default settings.
    pub fn new(ports: PortSet) -> Self {
        Self {
            ports,
            protocols: ProtocolSelection::Tcp,
            concurrency: Self::DEFAULT_CONCURRENCY,
            timeout: Self::DEFAULT_TIMEOUT,
            banner_timeout: crate::banner::BANNER_TIMEOUT,
            udp_attempts: 1,
            stealth: false,
            rate_limit: 0,
        }
    }

    pub fn with_protocols(mut self, protocols: ProtocolSelection) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_banner_timeout(mut self, banner_timeout: Duration) -> Self {
        self.banner_timeout = banner_timeout;
        self
    }

    pub fn with_udp_attempts(mut self, attempts: u32) -> Self {
        self.udp_attempts = attempts;
        self
    }

    pub fn with_stealth(mut self, stealth: bool) -> Self {
        self.stealth = stealth;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Reject settings the pool cannot run with.
    pub fn validate(&self) -> ScanResult<()> {
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(ScanError::InvalidConfig(format!(
                "concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// The probe used for each protocol.
#[derive(Clone)]
struct ProbeSet {
    tcp: Arc<dyn Probe>,
    udp: Arc<dyn Probe>,
}

impl ProbeSet {
    fn for_protocol(&self, protocol: Protocol) -> Arc<dyn Probe> {
        match protocol {
            Protocol::Tcp => Arc::clone(&self.tcp),
            Protocol::Udp => Arc::clone(&self.udp),
        }
    }
}

/// Runs one scan session against one target.
pub struct ScanCoordinator {
    target: ScanTarget,
    job: ScanJobConfig,
    probes: ProbeSet,
    sinks: Vec<Box<dyn ResultSink>>,
    cancel: CancellationToken,
}

impl ScanCoordinator {
    /// Create a coordinator whose probes consult the platform service
    /// database as well as the built-in tables.
    pub fn new(target: ScanTarget, job: ScanJobConfig) -> Self {
        Self::with_identifier(target, job, Arc::new(ServiceIdentifier::with_system_db()))
    }

    /// Create a coordinator with a specific service identifier.
    pub fn with_identifier(
        target: ScanTarget,
        job: ScanJobConfig,
        identifier: Arc<ServiceIdentifier>,
    ) -> Self {
        let tcp = TcpProbe::new(Arc::clone(&identifier)).with_banner_timeout(job.banner_timeout);
        let udp = UdpProbe::new(identifier).with_attempts(job.udp_attempts);

        Self {
            target,
            job,
            probes: ProbeSet {
                tcp: Arc::new(tcp),
                udp: Arc::new(udp),
            },
            sinks: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the probe for the protocol `probe` speaks.
    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        match probe.protocol() {
            Protocol::Tcp => self.probes.tcp = probe,
            Protocol::Udp => self.probes.udp = probe,
        }
        self
    }

    /// Register a result sink.
    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Register an already boxed result sink.
    pub fn add_sink(&mut self, sink: Box<dyn ResultSink>) {
        self.sinks.push(sink);
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this scan when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The full task list in submission order: every port over TCP, then
    /// every port over UDP.
    pub fn tasks(&self) -> Vec<ProbeTask> {
        let target = self.target.ip;
        let timeout = self.job.timeout;
        let stealth = self.job.stealth;
        let ports = &self.job.ports;

        self.job
            .protocols
            .protocols()
            .iter()
            .flat_map(move |&protocol| {
                ports.iter().map(move |port| ProbeTask {
                    target,
                    port,
                    protocol,
                    timeout,
                    stealth,
                })
            })
            .collect()
    }

    /// Run the scan to completion or cancellation.
    ///
    /// Consumes the coordinator, so a session can only ever run once.
    /// Per-port failures never surface here; only invalid configuration does.
    pub async fn run(mut self) -> ScanResult<ScanSession> {
        self.job.validate()?;

        let tasks = self.tasks();
        let mut session = ScanSession::new(
            self.target.clone(),
            self.job.ports.clone(),
            self.job.protocols,
        );
        session.begin()?;
        let start = Instant::now();

        info!(
            target = %self.target,
            tasks = tasks.len(),
            concurrency = self.job.concurrency,
            stealth = self.job.stealth,
            "starting scan"
        );
        notify(&mut self.sinks, "start", |sink| sink.on_start(&session));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(
            tasks,
            self.probes.clone(),
            self.job.concurrency,
            RateLimiter::new(self.job.rate_limit),
            self.cancel.clone(),
            tx,
        ));

        while let Some(result) = rx.recv().await {
            session.record(result);
            let progress = session.progress();
            if let Some(latest) = session.results().last() {
                notify(&mut self.sinks, "result", |sink| sink.on_result(latest));
            }
            notify(&mut self.sinks, "progress", |sink| sink.on_progress(progress));
        }

        let dispatch_failure = dispatcher.await.err();
        if let Some(e) = &dispatch_failure {
            error!(error = %e, "probe dispatcher stopped abnormally");
        }

        let cancelled =
            self.cancel.is_cancelled() && session.progress().completed < session.total_tasks();
        session.finish(cancelled, start.elapsed());

        info!(
            target = %self.target,
            state = %session.state(),
            completed = session.progress().completed,
            open = session.open_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scan finished"
        );
        notify(&mut self.sinks, "complete", |sink| sink.on_complete(&session));

        match dispatch_failure {
            Some(e) => Err(ScanError::TaskFailed(e.to_string())),
            None => Ok(session),
        }
    }

    /// Run the scan on the tokio runtime, returning a handle that can
    /// cancel it and collect the session from another task or thread.
    pub fn spawn(self) -> ScanHandle {
        let cancel = self.cancel_token();
        ScanHandle {
            cancel,
            join: tokio::spawn(self.run()),
        }
    }
}

/// Handle to a scan running in the background.
pub struct ScanHandle {
    cancel: CancellationToken,
    join: JoinHandle<ScanResult<ScanSession>>,
}

impl ScanHandle {
    /// Stop admitting new probes. Results gathered so far are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the session to finish.
    pub async fn join(self) -> ScanResult<ScanSession> {
        self.join
            .await
            .map_err(|e| ScanError::TaskFailed(e.to_string()))?
    }
}

/// Deliver one event to every sink, reporting failures without stopping.
fn notify<F>(sinks: &mut [Box<dyn ResultSink>], event: &'static str, mut deliver: F)
where
    F: FnMut(&mut dyn ResultSink) -> Result<(), SinkError>,
{
    for sink in sinks.iter_mut() {
        if let Err(e) = deliver(sink.as_mut()) {
            warn!(sink = sink.name(), event, error = %e, "result sink failed");
        }
    }
}

/// Admit tasks into the pool in order until they run out or the scan is
/// cancelled, then wait for every started probe to report.
async fn dispatch(
    tasks: Vec<ProbeTask>,
    probes: ProbeSet,
    concurrency: usize,
    rate_limiter: Option<RateLimiter>,
    cancel: CancellationToken,
    results: mpsc::UnboundedSender<ProbeResult>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut workers = JoinSet::new();
    let mut running: HashMap<tokio::task::Id, (Port, Protocol)> = HashMap::new();
    let total = tasks.len();
    let mut started = 0usize;

    for task in tasks {
        if let Some(limiter) = &rate_limiter {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = limiter.wait() => {}
            }
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let probe = probes.for_protocol(task.protocol);
        let key = (task.port, task.protocol);
        let results = results.clone();
        started += 1;

        let handle = workers.spawn(async move {
            let result = probe.probe(&task).await;
            drop(permit);
            // The coordinator loop outlives every sender.
            let _ = results.send(result);
        });
        running.insert(handle.id(), key);
    }

    if started < total {
        debug!(started, skipped = total - started, "scan cancelled, remaining tasks discarded");
    }

    while let Some(joined) = workers.join_next_with_id().await {
        match joined {
            Ok((id, ())) => {
                running.remove(&id);
            }
            // A probe that panicked still owes its task a result.
            Err(e) => {
                warn!(error = %e, "probe worker panicked");
                if let Some((port, protocol)) = running.remove(&e.id()) {
                    let _ = results.send(ProbeResult::failed(port, protocol, "probe task panicked"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn coordinator(spec: &str, protocols: ProtocolSelection) -> ScanCoordinator {
        let job = ScanJobConfig::new(PortSet::resolve(spec).unwrap()).with_protocols(protocols);
        ScanCoordinator::with_identifier(
            ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            job,
            Arc::new(ServiceIdentifier::builtin()),
        )
    }

    #[test]
    fn test_tasks_in_submission_order() {
        let tasks = coordinator("443,22,80", ProtocolSelection::Both).tasks();
        let order: Vec<(u16, Protocol)> = tasks
            .iter()
            .map(|t| (t.port.as_u16(), t.protocol))
            .collect();
        assert_eq!(
            order,
            vec![
                (22, Protocol::Tcp),
                (80, Protocol::Tcp),
                (443, Protocol::Tcp),
                (22, Protocol::Udp),
                (80, Protocol::Udp),
                (443, Protocol::Udp),
            ]
        );
    }

    #[test]
    fn test_tasks_carry_job_settings() {
        let job = ScanJobConfig::new(PortSet::resolve("80").unwrap())
            .with_timeout(Duration::from_millis(250))
            .with_stealth(true);
        let coordinator = ScanCoordinator::with_identifier(
            ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            job,
            Arc::new(ServiceIdentifier::builtin()),
        );
        let task = &coordinator.tasks()[0];
        assert_eq!(task.timeout, Duration::from_millis(250));
        assert!(task.stealth);
        assert_eq!(task.target, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_job_validation() {
        let ports = PortSet::resolve("80").unwrap();
        assert!(ScanJobConfig::new(ports.clone()).validate().is_ok());
        assert!(ScanJobConfig::new(ports.clone())
            .with_concurrency(0)
            .validate()
            .is_err());
        assert!(ScanJobConfig::new(ports.clone())
            .with_concurrency(Semaphore::MAX_PERMITS)
            .validate()
            .is_ok());
        assert!(ScanJobConfig::new(ports.clone())
            .with_concurrency(usize::MAX)
            .validate()
            .is_err());
        assert!(ScanJobConfig::new(ports)
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_invalid_job_fails_before_scanning() {
        let job = ScanJobConfig::new(PortSet::resolve("80").unwrap()).with_concurrency(0);
        let coordinator = ScanCoordinator::with_identifier(
            ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            job,
            Arc::new(ServiceIdentifier::builtin()),
        );
        assert!(matches!(coordinator.run().await, Err(ScanError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_oversized_pool_is_rejected_not_cancelled() {
        let job = ScanJobConfig::new(PortSet::resolve("80").unwrap()).with_concurrency(usize::MAX);
        let coordinator = ScanCoordinator::with_identifier(
            ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            job,
            Arc::new(ServiceIdentifier::builtin()),
        );
        assert!(matches!(coordinator.run().await, Err(ScanError::InvalidConfig(_))));
    }
}
