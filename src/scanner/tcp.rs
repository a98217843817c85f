//! TCP connect probe.
//!
//! Performs standard TCP connect probes using the operating system's
//! socket API, then grabs a banner from anything that accepts. This is the
//! most reliable method but also the most detectable, as it completes the
//! full handshake; stealth mode only spreads probes out in time.

use crate::banner::{grab_banner, BANNER_TIMEOUT};
use crate::scanner::traits::{PortStatus, Probe, ProbeResult, ProbeTask, Protocol};
use crate::services::ServiceIdentifier;
use async_trait::async_trait;
use rand::Rng;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Shortest stealth delay before a connect.
pub const STEALTH_JITTER_MIN: Duration = Duration::from_millis(100);
/// Longest stealth delay before a connect.
pub const STEALTH_JITTER_MAX: Duration = Duration::from_millis(500);

/// Pick a stealth delay, uniformly distributed in
/// [`STEALTH_JITTER_MIN`, `STEALTH_JITTER_MAX`].
pub fn stealth_jitter() -> Duration {
    let min = STEALTH_JITTER_MIN.as_millis() as u64;
    let max = STEALTH_JITTER_MAX.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// How a connect attempt ended.
#[derive(Debug)]
enum ConnectOutcome<S = TcpStream> {
    Connected(S),
    Refused,
    TimedOut,
    Failed(io::Error),
}

/// Classify a connect bounded by `timeout`. Only an expired deadline or a
/// kernel-reported timeout count as timed out.
fn classify_connect<S>(attempt: Result<io::Result<S>, Elapsed>) -> ConnectOutcome<S> {
    match attempt {
        Ok(Ok(stream)) => ConnectOutcome::Connected(stream),
        Ok(Err(e)) => match e.kind() {
            io::ErrorKind::ConnectionRefused => ConnectOutcome::Refused,
            io::ErrorKind::TimedOut => ConnectOutcome::TimedOut,
            _ => ConnectOutcome::Failed(e),
        },
        Err(_) => ConnectOutcome::TimedOut,
    }
}

/// TCP connect probe.
///
/// Does not require elevated privileges.
pub struct TcpProbe {
    identifier: Arc<ServiceIdentifier>,
    banner_timeout: Duration,
}

impl TcpProbe {
    /// Create a new TCP probe using `identifier` for service names.
    pub fn new(identifier: Arc<ServiceIdentifier>) -> Self {
        Self {
            identifier,
            banner_timeout: BANNER_TIMEOUT,
        }
    }

    /// Bound the banner exchange separately from the connect timeout.
    pub fn with_banner_timeout(mut self, banner_timeout: Duration) -> Self {
        self.banner_timeout = banner_timeout;
        self
    }

    /// Attempt to connect to the target address.
    async fn attempt_connect(addr: SocketAddr, limit: Duration) -> ConnectOutcome {
        classify_connect(timeout(limit, TcpStream::connect(addr)).await)
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, task: &ProbeTask) -> ProbeResult {
        let port = task.port;
        let addr = SocketAddr::new(task.target, port.as_u16());

        if task.stealth {
            let delay = stealth_jitter();
            trace!(%port, delay_ms = delay.as_millis() as u64, "stealth delay");
            tokio::time::sleep(delay).await;
        }

        let start = Instant::now();
        match Self::attempt_connect(addr, task.timeout).await {
            ConnectOutcome::Connected(mut stream) => {
                let response_time = start.elapsed().as_millis() as u64;
                let banner = grab_banner(&mut stream, self.banner_timeout).await;
                drop(stream);

                let found = self
                    .identifier
                    .identify(port.as_u16(), Protocol::Tcp, banner.as_deref());

                ProbeResult::new(port, Protocol::Tcp, PortStatus::Open)
                    .with_banner(banner)
                    .with_service(found.service, found.version)
                    .with_response_time(response_time)
            }
            ConnectOutcome::Refused => ProbeResult::new(port, Protocol::Tcp, PortStatus::Closed),
            ConnectOutcome::TimedOut => ProbeResult::new(port, Protocol::Tcp, PortStatus::Filtered),
            ConnectOutcome::Failed(e) => {
                debug!(%addr, error = %e, "tcp probe failed");
                ProbeResult::failed(port, Protocol::Tcp, e)
            }
        }
    }
}
