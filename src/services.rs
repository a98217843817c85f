//! Service identification from port numbers and banners.
//!
//! Lookups run in a fixed order and the first hit wins:
//!
//! 1. banner signatures, which can also yield a version string
//! 2. the built-in table of well-known `(port, protocol)` pairs
//! 3. the platform service database (`/etc/services`), when loaded
//!
//! Finding nothing is a normal outcome, not an error.

use crate::scanner::Protocol;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Location of the platform service-name database.
pub const SYSTEM_SERVICES_PATH: &str = "/etc/services";

/// Outcome of identification. Both fields are absent when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMatch {
    pub service: Option<String>,
    pub version: Option<String>,
}

impl ServiceMatch {
    fn named(service: &str) -> Self {
        Self {
            service: Some(service.to_string()),
            version: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.service.is_none()
    }
}

/// A known software signature in a banner.
struct BannerSignature {
    service: &'static str,
    detect: Regex,
    /// First capture group is the version text.
    version: Option<Regex>,
}

impl BannerSignature {
    fn new(service: &'static str, detect: &str, version: Option<&str>) -> Self {
        Self {
            service,
            detect: Regex::new(detect).expect("banner signature must compile"),
            version: version.map(|v| Regex::new(v).expect("version pattern must compile")),
        }
    }

    fn extract_version(&self, banner: &str) -> Option<String> {
        let captures = self.version.as_ref()?.captures(banner)?;
        let version = captures.get(1)?.as_str().trim().replace('_', " ");
        (!version.is_empty()).then_some(version)
    }
}

/// Banner signatures in priority order.
static BANNER_SIGNATURES: LazyLock<Vec<BannerSignature>> = LazyLock::new(|| {
    vec![
        BannerSignature::new("SSH", r"^SSH-\d", Some(r"^SSH-[\d.]+-(\S+)")),
        BannerSignature::new("HTTP", r"(?m)^HTTP/\d", Some(r"(?mi)^server:[ \t]*(.+?)[ \t]*$")),
        BannerSignature::new(
            "SMTP",
            r"(?i)^220[ -].*(smtp|postfix|exim|sendmail)",
            Some(r"(?i)((?:exim|sendmail)[ /][\d.]+\S*)"),
        ),
        BannerSignature::new(
            "FTP",
            r"^220[ -]",
            Some(r"(?i)((?:vsftpd|proftpd|pure-ftpd|filezilla server)[ /]v?[\d.]+\w*)"),
        ),
        BannerSignature::new("POP3", r"^\+OK", Some(r"(?i)(dovecot)")),
        BannerSignature::new("IMAP", r"^\* OK", Some(r"(?i)(dovecot|courier-imap|cyrus)")),
        BannerSignature::new("VNC", r"^RFB \d{3}\.\d{3}", Some(r"^RFB (\d{3}\.\d{3})")),
        BannerSignature::new("MySQL", r"(?i)mysql|mariadb", Some(r"(\d+\.\d+\.\d+[\w.\-]*)")),
        BannerSignature::new("Redis", r"^-(?:ERR|NOAUTH|DENIED)\b", None),
        BannerSignature::new("AMQP", r"^AMQP", None),
    ]
});

/// Where a well-known service listens.
#[derive(Clone, Copy)]
enum On {
    Tcp,
    Udp,
    Both,
}

/// Well-known services, checked after banner signatures.
const WELL_KNOWN: &[(u16, On, &str)] = &[
    (20, On::Tcp, "FTP-Data"),
    (21, On::Tcp, "FTP"),
    (22, On::Tcp, "SSH"),
    (23, On::Tcp, "Telnet"),
    (25, On::Tcp, "SMTP"),
    (53, On::Both, "DNS"),
    (67, On::Udp, "DHCP-Server"),
    (68, On::Udp, "DHCP-Client"),
    (69, On::Udp, "TFTP"),
    (80, On::Tcp, "HTTP"),
    (88, On::Both, "Kerberos"),
    (110, On::Tcp, "POP3"),
    (111, On::Both, "RPCBind"),
    (119, On::Tcp, "NNTP"),
    (123, On::Udp, "NTP"),
    (135, On::Tcp, "MSRPC"),
    (137, On::Udp, "NetBIOS-NS"),
    (138, On::Udp, "NetBIOS-DGM"),
    (139, On::Tcp, "NetBIOS-SSN"),
    (143, On::Tcp, "IMAP"),
    (161, On::Udp, "SNMP"),
    (162, On::Udp, "SNMPTrap"),
    (179, On::Tcp, "BGP"),
    (389, On::Both, "LDAP"),
    (443, On::Tcp, "HTTPS"),
    (445, On::Tcp, "SMB"),
    (465, On::Tcp, "SMTPS"),
    (500, On::Udp, "ISAKMP"),
    (514, On::Udp, "Syslog"),
    (520, On::Udp, "RIP"),
    (554, On::Tcp, "RTSP"),
    (587, On::Tcp, "Submission"),
    (631, On::Tcp, "IPP"),
    (636, On::Tcp, "LDAPS"),
    (873, On::Tcp, "Rsync"),
    (993, On::Tcp, "IMAPS"),
    (995, On::Tcp, "POP3S"),
    (1080, On::Tcp, "SOCKS"),
    (1194, On::Udp, "OpenVPN"),
    (1433, On::Tcp, "MSSQL"),
    (1434, On::Udp, "MSSQL-Monitor"),
    (1521, On::Tcp, "Oracle"),
    (1701, On::Udp, "L2TP"),
    (1723, On::Tcp, "PPTP"),
    (1812, On::Udp, "RADIUS"),
    (1883, On::Tcp, "MQTT"),
    (1900, On::Udp, "SSDP"),
    (2049, On::Both, "NFS"),
    (2375, On::Tcp, "Docker"),
    (2376, On::Tcp, "Docker-TLS"),
    (3128, On::Tcp, "Squid"),
    (3306, On::Tcp, "MySQL"),
    (3389, On::Tcp, "RDP"),
    (4500, On::Udp, "IPsec-NAT-T"),
    (5060, On::Both, "SIP"),
    (5353, On::Udp, "mDNS"),
    (5432, On::Tcp, "PostgreSQL"),
    (5672, On::Tcp, "AMQP"),
    (5900, On::Tcp, "VNC"),
    (6379, On::Tcp, "Redis"),
    (6443, On::Tcp, "Kubernetes-API"),
    (8080, On::Tcp, "HTTP-Proxy"),
    (8443, On::Tcp, "HTTPS-Alt"),
    (9042, On::Tcp, "Cassandra"),
    (9092, On::Tcp, "Kafka"),
    (9200, On::Tcp, "Elasticsearch"),
    (11211, On::Both, "Memcached"),
    (27017, On::Tcp, "MongoDB"),
];

/// Static map of well-known `(port, protocol)` pairs to service labels.
static PORT_SERVICES: LazyLock<HashMap<(u16, Protocol), &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    for &(port, on, label) in WELL_KNOWN {
        if matches!(on, On::Tcp | On::Both) {
            m.insert((port, Protocol::Tcp), label);
        }
        if matches!(on, On::Udp | On::Both) {
            m.insert((port, Protocol::Udp), label);
        }
    }
    m
});

/// Look up the well-known service for a port, ignoring any banner.
pub fn well_known_service(port: u16, protocol: Protocol) -> Option<&'static str> {
    PORT_SERVICES.get(&(port, protocol)).copied()
}

/// Maps ports to names using the layered lookup described in the module docs.
#[derive(Debug, Clone, Default)]
pub struct ServiceIdentifier {
    system: HashMap<(u16, Protocol), String>,
}

impl ServiceIdentifier {
    /// Banner signatures and the built-in table only.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Also consult `/etc/services`. A missing or unreadable database is
    /// not an error; that layer is simply skipped.
    pub fn with_system_db() -> Self {
        match Self::with_services_file(SYSTEM_SERVICES_PATH) {
            Ok(identifier) => identifier,
            Err(e) => {
                debug!(path = SYSTEM_SERVICES_PATH, error = %e, "platform service database unavailable");
                Self::builtin()
            }
        }
    }

    /// Load a services database in `/etc/services` format.
    pub fn with_services_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self {
            system: parse_services_db(&content),
        })
    }

    /// Number of entries loaded from the platform database.
    pub fn system_entries(&self) -> usize {
        self.system.len()
    }

    /// Identify the service on `port`, optionally using its banner.
    pub fn identify(&self, port: u16, protocol: Protocol, banner: Option<&str>) -> ServiceMatch {
        if let Some(found) = banner.and_then(match_banner) {
            return found;
        }

        if let Some(label) = well_known_service(port, protocol) {
            return ServiceMatch::named(label);
        }

        if let Some(name) = self.system.get(&(port, protocol)) {
            return ServiceMatch::named(name);
        }

        ServiceMatch::default()
    }
}

/// Run the banner signatures against a banner.
fn match_banner(banner: &str) -> Option<ServiceMatch> {
    let banner = banner.trim_start();
    if banner.is_empty() {
        return None;
    }

    BANNER_SIGNATURES
        .iter()
        .find(|sig| sig.detect.is_match(banner))
        .map(|sig| ServiceMatch {
            service: Some(sig.service.to_string()),
            version: sig.extract_version(banner),
        })
}

/// Parse `/etc/services` lines: `name  port/proto  [aliases...]  [# comment]`.
fn parse_services_db(content: &str) -> HashMap<(u16, Protocol), String> {
    let mut services = HashMap::new();

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((port, proto)) = port_proto.split_once('/') else {
            continue;
        };
        let Ok(port) = port.parse::<u16>() else {
            continue;
        };
        let protocol = match proto {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => continue,
        };
        // First entry wins, matching getservbyport.
        services
            .entry((port, protocol))
            .or_insert_with(|| name.to_string());
    }

    services
}
