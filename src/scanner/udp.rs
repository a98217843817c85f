//! UDP probe implementation.
//!
//! Sends protocol-appropriate payloads and classifies the reply (or lack of
//! one). UDP probing is inherently less conclusive than TCP because there is
//! no handshake to observe.
//!
//! # Detection Methods
//!
//! 1. **UDP Response**: any datagram back means the port is open
//! 2. **ICMP Port Unreachable**: surfaced by the OS as a refused error on the
//!    connected socket, the port is closed
//! 3. **No Response**: the port is either open or filtered (ambiguous)

use crate::banner::{decode_banner, MAX_BANNER_SIZE};
use crate::scanner::traits::{PortStatus, Probe, ProbeResult, ProbeTask, Protocol};
use crate::services::ServiceIdentifier;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

/// A payload for a well-known UDP service.
struct UdpPayload {
    port: u16,
    payload: &'static [u8],
}

/// Payloads that elicit an answer from common UDP services.
const UDP_PAYLOADS: &[UdpPayload] = &[
    // DNS: TXT query for version.bind in the CHAOS class
    UdpPayload {
        port: 53,
        payload: b"\x12\x34\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\x07version\x04bind\x00\x00\x10\x00\x03",
    },
    // TFTP read request
    UdpPayload {
        port: 69,
        payload: b"\x00\x01test\x00netascii\x00",
    },
    // NTP v3 client request
    UdpPayload {
        port: 123,
        payload: &NTP_CLIENT_REQUEST,
    },
    // NetBIOS name query
    UdpPayload {
        port: 137,
        payload: b"\x80\xf0\x00\x10\x00\x01\x00\x00\x00\x00\x00\x00\x20CKAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\x00\x00\x21\x00\x01",
    },
    // SNMPv1 get-request for sysDescr.0, community "public"
    UdpPayload {
        port: 161,
        payload: b"\x30\x29\x02\x01\x00\x04\x06public\xa0\x1c\x02\x04\x00\x00\x00\x01\x02\x01\x00\x02\x01\x00\x30\x0e\x30\x0c\x06\x08\x2b\x06\x01\x02\x01\x01\x01\x00\x05\x00",
    },
    // SSDP discovery
    UdpPayload {
        port: 1900,
        payload: b"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 1\r\nST: ssdp:all\r\n\r\n",
    },
    // memcached stats over the UDP frame header
    UdpPayload {
        port: 11211,
        payload: b"\x00\x01\x00\x00\x00\x01\x00\x00stats\r\n",
    },
];

const NTP_CLIENT_REQUEST: [u8; 48] = {
    let mut packet = [0u8; 48];
    packet[0] = 0x1b;
    packet
};

/// Default payload for unknown ports.
pub const DEFAULT_PAYLOAD: &[u8] = b"\x00";

/// Get the appropriate payload for a port.
pub fn payload_for_port(port: u16) -> &'static [u8] {
    UDP_PAYLOADS
        .iter()
        .find(|p| p.port == port)
        .map(|p| p.payload)
        .unwrap_or(DEFAULT_PAYLOAD)
}

/// What came back from a probe exchange.
enum Reply {
    Data(Vec<u8>),
    Refused,
    Silent,
}

/// UDP probe for detecting open UDP ports.
pub struct UdpProbe {
    identifier: Arc<ServiceIdentifier>,
    attempts: u32,
}

impl UdpProbe {
    /// Create a new UDP probe that sends a single datagram per port.
    pub fn new(identifier: Arc<ServiceIdentifier>) -> Self {
        Self {
            identifier,
            attempts: 1,
        }
    }

    /// Send up to `attempts` datagrams, each waiting the full timeout.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Send the payload and wait for a response.
    async fn exchange(&self, addr: SocketAddr, limit: Duration) -> io::Result<Reply> {
        let local_addr = match addr.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };

        let socket = UdpSocket::bind(local_addr).await?;
        // Connecting lets the OS report ICMP port unreachable back to us.
        socket.connect(addr).await?;

        let payload = payload_for_port(addr.port());
        let mut buf = vec![0u8; MAX_BANNER_SIZE];

        for attempt in 1..=self.attempts {
            match socket.send(payload).await {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => return Ok(Reply::Refused),
                Err(e) => return Err(e),
            }

            match timeout(limit, socket.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    buf.truncate(n);
                    return Ok(Reply::Data(buf));
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    return Ok(Reply::Refused)
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => debug!(%addr, attempt, "no udp reply before timeout"),
            }
        }

        Ok(Reply::Silent)
    }
}

#[async_trait]
impl Probe for UdpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn probe(&self, task: &ProbeTask) -> ProbeResult {
        let port = task.port;
        let addr = SocketAddr::new(task.target, port.as_u16());
        let start = Instant::now();

        match self.exchange(addr, task.timeout).await {
            Ok(Reply::Data(data)) => {
                let response_time = start.elapsed().as_millis() as u64;
                let banner = decode_banner(&data);
                let found = self
                    .identifier
                    .identify(port.as_u16(), Protocol::Udp, banner.as_deref());

                ProbeResult::new(port, Protocol::Udp, PortStatus::Open)
                    .with_banner(banner)
                    .with_service(found.service, found.version)
                    .with_response_time(response_time)
            }
            Ok(Reply::Refused) => ProbeResult::new(port, Protocol::Udp, PortStatus::Closed),
            Ok(Reply::Silent) => {
                let found = self.identifier.identify(port.as_u16(), Protocol::Udp, None);
                ProbeResult::new(port, Protocol::Udp, PortStatus::OpenOrFiltered)
                    .with_service(found.service, found.version)
            }
            Err(e) => {
                debug!(%addr, error = %e, "udp probe failed");
                ProbeResult::failed(port, Protocol::Udp, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Port;

    fn task(port: u16, timeout: Duration) -> ProbeTask {
        ProbeTask {
            target: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: Port::new(port).unwrap(),
            protocol: Protocol::Udp,
            timeout,
            stealth: false,
        }
    }

    fn probe() -> UdpProbe {
        UdpProbe::new(Arc::new(ServiceIdentifier::builtin()))
    }

    #[test]
    fn test_payload_selection() {
        assert_eq!(&payload_for_port(53)[12..20], b"\x07version");
        assert_eq!(payload_for_port(123).len(), 48);
        assert_eq!(payload_for_port(123)[0], 0x1b);
        assert_eq!(payload_for_port(12345), DEFAULT_PAYLOAD);
    }

    #[test]
    fn test_snmp_payload_length_matches_header() {
        let snmp = payload_for_port(161);
        assert_eq!(snmp[0], 0x30);
        assert_eq!(snmp[1] as usize, snmp.len() - 2);
    }

    #[tokio::test]
    async fn test_reply_means_open() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = responder.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (_, peer) = responder.recv_from(&mut buf).await.unwrap();
            responder.send_to(b"SSH-2.0-udp-echo\r\n", peer).await.unwrap();
        });

        let result = probe().probe(&task(port, Duration::from_secs(1))).await;
        assert_eq!(result.status, PortStatus::Open);
        assert_eq!(result.banner.as_deref(), Some("SSH-2.0-udp-echo"));
        assert_eq!(result.service.as_deref(), Some("SSH"));
    }

    #[tokio::test]
    async fn test_silence_means_open_or_filtered() {
        // Bound but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let result = probe().probe(&task(port, Duration::from_millis(200))).await;
        assert_eq!(result.status, PortStatus::OpenOrFiltered);
        assert_eq!(result.banner, None);
        drop(silent);
    }

    #[tokio::test]
    async fn test_retries_each_wait_the_timeout() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let start = Instant::now();
        let result = probe()
            .with_attempts(2)
            .probe(&task(port, Duration::from_millis(150)))
            .await;
        assert_eq!(result.status, PortStatus::OpenOrFiltered);
        assert!(start.elapsed() >= Duration::from_millis(300));
        drop(silent);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_socket_failure_is_error() {
        // Broadcast needs SO_BROADCAST, so the exchange fails outright.
        let task = ProbeTask {
            target: IpAddr::V4(Ipv4Addr::BROADCAST),
            ..task(9999, Duration::from_millis(200))
        };
        let result = probe().probe(&task).await;
        assert_eq!(result.status, PortStatus::Error);
        assert!(result.error.is_some());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_port_unreachable_means_closed() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        drop(socket);

        let result = probe().probe(&task(port, Duration::from_secs(1))).await;
        assert_eq!(result.status, PortStatus::Closed);
    }
}
