//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` keeps the ranges exactly as the operator wrote them, and
//! `PortSet` is the canonical, ascending, duplicate-free expansion the
//! scanner works from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| PortError::OutOfRange {
            token: value.to_string(),
            value: u32::from(value),
        })
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port specification parsing.
///
/// Every variant carries the offending token so the operator can see which
/// part of the specification was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("invalid port specification '{0}': not a port number or range")]
    InvalidToken(String),
    #[error("invalid port specification '{token}': {value} is outside 1-65535")]
    OutOfRange { token: String, value: u32 },
    #[error("invalid port range '{token}': start {start} is greater than end {end}")]
    InvalidRange { token: String, start: u16, end: u16 },
    #[error("empty port specification")]
    Empty,
}

/// A range of ports (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    start: Port,
    end: Port,
}

impl PortRange {
    /// Create a new port range.
    pub fn new(start: Port, end: Port) -> Result<Self, PortError> {
        if start > end {
            Err(PortError::InvalidRange {
                token: format!("{}-{}", start, end),
                start: start.0,
                end: end.0,
            })
        } else {
            Ok(Self { start, end })
        }
    }

    /// Create a range containing a single port.
    pub const fn single(port: Port) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    /// Get the number of ports in this range.
    pub const fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize + 1
    }

    /// A valid range always holds at least one port.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over all ports in this range.
    pub fn iter(&self) -> impl Iterator<Item = Port> {
        (self.start.0..=self.end.0).map(Port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A port specification as written by the operator, e.g. `80,443,1000-2000`.
///
/// Parsing is atomic: one bad token rejects the whole specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    ranges: Vec<PortRange>,
}

impl PortSpec {
    /// The ranges in the order they were written.
    pub fn ranges(&self) -> &[PortRange] {
        &self.ranges
    }

    /// Expand into the canonical port set.
    pub fn to_port_set(&self) -> PortSet {
        let mut ports: Vec<Port> = self.ranges.iter().flat_map(|r| r.iter()).collect();
        ports.sort_unstable();
        ports.dedup();
        PortSet { ports }
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(PortError::Empty);
        }

        let ranges = s
            .split(',')
            .map(|token| parse_token(token.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { ranges })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Parse one comma-separated token: either `N` or `A-B`.
fn parse_token(token: &str) -> Result<PortRange, PortError> {
    if token.is_empty() {
        return Err(PortError::InvalidToken(token.to_string()));
    }

    match token.split_once('-') {
        Some((start, end)) => {
            let start = parse_port(start.trim(), token)?;
            let end = parse_port(end.trim(), token)?;
            if start > end {
                return Err(PortError::InvalidRange {
                    token: token.to_string(),
                    start: start.0,
                    end: end.0,
                });
            }
            PortRange::new(start, end)
        }
        None => parse_port(token, token).map(PortRange::single),
    }
}

fn parse_port(number: &str, token: &str) -> Result<Port, PortError> {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortError::InvalidToken(token.to_string()));
    }

    // Anything longer than u32 is certainly out of range.
    let value: u32 = number.parse().unwrap_or(u32::MAX);
    u16::try_from(value)
        .ok()
        .and_then(Port::new)
        .ok_or_else(|| PortError::OutOfRange {
            token: token.to_string(),
            value,
        })
}

/// The canonical set of ports to scan: strictly ascending, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortSet {
    ports: Vec<Port>,
}

impl PortSet {
    /// Resolve a textual specification into a port set.
    ///
    /// ```
    /// use portscout::types::PortSet;
    ///
    /// let set = PortSet::resolve("80,443,20-22").unwrap();
    /// let ports: Vec<u16> = set.iter().map(|p| p.as_u16()).collect();
    /// assert_eq!(ports, vec![20, 21, 22, 80, 443]);
    /// ```
    pub fn resolve(spec: &str) -> Result<Self, PortError> {
        spec.parse::<PortSpec>().map(|spec| spec.to_port_set())
    }

    pub fn iter(&self) -> impl Iterator<Item = Port> + '_ {
        self.ports.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn contains(&self, port: Port) -> bool {
        self.ports.binary_search(&port).is_ok()
    }
}

impl FromStr for PortSet {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl FromIterator<Port> for PortSet {
    fn from_iter<I: IntoIterator<Item = Port>>(iter: I) -> Self {
        let mut ports: Vec<Port> = iter.into_iter().collect();
        ports.sort_unstable();
        ports.dedup();
        Self { ports }
    }
}
