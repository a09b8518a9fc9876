// Declarative description of a container to launch

use crate::container::port::ContainerPort;
use crate::errors::{Result, TlcError};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Readiness condition checked after the runtime reports the container started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFor {
    /// `message` appears in the combined log stream at least `occurrences` times
    Log { message: String, occurrences: usize },
    /// The port is published and accepts a TCP connection on localhost
    Port(ContainerPort),
    /// Fixed delay after start
    Duration(Duration),
    /// Ready as soon as the container is running
    Nothing,
}

impl WaitFor {
    pub fn log(message: impl Into<String>) -> Self {
        WaitFor::Log {
            message: message.into(),
            occurrences: 1,
        }
    }

    pub fn log_times(message: impl Into<String>, occurrences: usize) -> Self {
        WaitFor::Log {
            message: message.into(),
            occurrences: occurrences.max(1),
        }
    }
}

impl fmt::Display for WaitFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitFor::Log {
                message,
                occurrences,
            } if *occurrences > 1 => write!(f, "log contains {:?} x{}", message, occurrences),
            WaitFor::Log { message, .. } => write!(f, "log contains {:?}", message),
            WaitFor::Port(port) => write!(f, "port {} accepts connections", port),
            WaitFor::Duration(d) => write!(f, "{}ms elapsed", d.as_millis()),
            WaitFor::Nothing => write!(f, "container running"),
        }
    }
}

/// Everything the runtime needs to create and start one container
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub exposed_ports: Vec<ContainerPort>,
    pub env: BTreeMap<String, String>,
    pub wait_for: WaitFor,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            exposed_ports: Vec::new(),
            env: BTreeMap::new(),
            wait_for: WaitFor::Nothing,
        }
    }

    pub fn with_exposed_port(mut self, port: ContainerPort) -> Self {
        self.exposed_ports.push(port);
        self
    }

    /// Add ports given as `"port/protocol"` strings
    pub fn with_exposed_ports<I, S>(mut self, ports: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for port in ports {
            self.exposed_ports.push(ContainerPort::parse(port.as_ref())?);
        }
        Ok(self)
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_wait_for(mut self, wait_for: WaitFor) -> Self {
        self.wait_for = wait_for;
        self
    }

    /// Reject specs the runtime could never satisfy
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(TlcError::MissingField("image"));
        }
        if self.exposed_ports.is_empty() {
            return Err(TlcError::MissingField("exposed ports"));
        }
        Ok(())
    }
}
