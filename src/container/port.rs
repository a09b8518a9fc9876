// Container port declarations and resolved endpoint bindings

use crate::errors::{Result, TlcError};
use std::fmt;
use std::str::FromStr;

/// Host every resolved endpoint is reachable on
pub const LOCALHOST: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
        }
    }
}

/// A port the process inside the container listens on, e.g. `4566/tcp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerPort {
    pub number: u16,
    pub protocol: Protocol,
}

impl ContainerPort {
    pub const fn tcp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Tcp,
        }
    }

    /// Parse `"4566/tcp"` or a bare `"4566"` (protocol defaults to tcp)
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = |reason: &str| TlcError::InvalidPort(s.to_string(), reason.to_string());

        let (number, protocol) = match trimmed.split_once('/') {
            Some((number, proto)) => {
                let protocol = match proto.to_lowercase().as_str() {
                    "tcp" => Protocol::Tcp,
                    "udp" => Protocol::Udp,
                    "sctp" => Protocol::Sctp,
                    _ => return Err(invalid("unknown protocol")),
                };
                (number, protocol)
            }
            None => (trimmed, Protocol::Tcp),
        };

        let number: u16 = number
            .parse()
            .map_err(|_| invalid("port must be a number between 1 and 65535"))?;
        if number == 0 {
            return Err(invalid("port must be a number between 1 and 65535"));
        }

        Ok(Self { number, protocol })
    }
}

impl FromStr for ContainerPort {
    type Err = TlcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol.as_str())
    }
}

/// Host-reachable address of a container port, computed fresh on each lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointBinding {
    pub internal_port: ContainerPort,
    pub external_port: u16,
    pub host: &'static str,
}

impl EndpointBinding {
    pub fn new(internal_port: ContainerPort, external_port: u16) -> Self {
        Self {
            internal_port,
            external_port,
            host: LOCALHOST,
        }
    }

    /// `localhost:<external>`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.external_port)
    }
}

impl fmt::Display for EndpointBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.external_port)
    }
}
