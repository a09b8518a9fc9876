// Container lifecycle: start, wait for readiness, resolve ports, terminate

use crate::container::port::{ContainerPort, EndpointBinding};
use crate::container::runtime::ContainerRuntime;
use crate::container::spec::{ContainerSpec, WaitFor};
use crate::context::Context;
use crate::errors::{Result, TlcError};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lines of log kept in errors for containers that die while starting
const EXIT_LOG_TAIL: usize = 20;

/// Lifecycle of a container handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Unstarted,
    Starting,
    Ready,
    Failed,
    Terminated,
}

/// Handle to a container that passed its readiness check.
///
/// Port lookups always go back to the runtime since bindings change on every
/// start. Dropping the handle does not remove the container; call
/// [`RunningContainer::terminate`].
pub struct RunningContainer {
    id: String,
    image: String,
    runtime: Arc<dyn ContainerRuntime>,
    state: Mutex<ContainerState>,
}

impl std::fmt::Debug for RunningContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningContainer")
            .field("id", &self.id)
            .field("image", &self.image)
            .field("state", &self.state())
            .finish()
    }
}

impl RunningContainer {
    /// Wrap a container that some earlier process started and readied
    pub fn attach(runtime: Arc<dyn ContainerRuntime>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: String::new(),
            runtime,
            state: Mutex::new(ContainerState::Ready),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn state(&self) -> ContainerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ContainerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Host port bound to `port` (`"4566"` or `"4566/tcp"`)
    pub fn mapped_port(&self, ctx: &Context, port: &str) -> Result<u16> {
        let port = ContainerPort::parse(port)?;
        self.mapped_container_port(ctx, &port)
    }

    pub fn mapped_container_port(&self, ctx: &Context, port: &ContainerPort) -> Result<u16> {
        if self.state() == ContainerState::Terminated {
            return Err(TlcError::ContainerTerminated(self.id.clone()));
        }
        ctx.check()?;

        self.runtime
            .mapped_port(ctx, &self.id, port)?
            .ok_or_else(|| TlcError::PortNotMapped {
                container: self.id.clone(),
                port: port.to_string(),
            })
    }

    /// `localhost:<external>` binding for `port`
    pub fn endpoint(&self, ctx: &Context, port: &ContainerPort) -> Result<EndpointBinding> {
        let external = self.mapped_container_port(ctx, port)?;
        Ok(EndpointBinding::new(*port, external))
    }

    /// Stop and remove the container. Runtime errors, including removing a
    /// container that is already gone, are returned as-is.
    pub fn terminate(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;
        self.runtime.remove(ctx, &self.id)?;
        self.set_state(ContainerState::Terminated);
        tracing::info!(container = %short_id(&self.id), "terminated");
        Ok(())
    }
}

/// Stop and remove `container`
pub fn terminate(ctx: &Context, container: &RunningContainer) -> Result<()> {
    container.terminate(ctx)
}

/// Starts containers on a runtime and blocks until they are ready
#[derive(Clone)]
pub struct Launcher {
    runtime: Arc<dyn ContainerRuntime>,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("ready_timeout", &self.ready_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Launcher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn runtime(&self) -> Arc<dyn ContainerRuntime> {
        Arc::clone(&self.runtime)
    }

    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    /// Validate `spec`, start it and wait for its readiness condition.
    ///
    /// A container that fails to become ready is removed before the error is
    /// returned, so callers only ever see ready handles.
    pub fn launch(&self, ctx: &Context, spec: &ContainerSpec) -> Result<RunningContainer> {
        spec.validate()?;
        ctx.check()?;

        let container = RunningContainer {
            id: String::new(),
            image: spec.image.clone(),
            runtime: Arc::clone(&self.runtime),
            state: Mutex::new(ContainerState::Unstarted),
        };

        tracing::info!(image = %spec.image, "starting container");
        container.set_state(ContainerState::Starting);

        let id = match self.runtime.run(ctx, spec) {
            Ok(id) => id,
            Err(e) => {
                container.set_state(ContainerState::Failed);
                return Err(e);
            }
        };
        let container = RunningContainer { id, ..container };

        if let Err(e) = self.wait_until_ready(ctx, &container.id, &spec.wait_for) {
            container.set_state(ContainerState::Failed);
            self.discard(&container);
            return Err(e);
        }

        container.set_state(ContainerState::Ready);
        tracing::info!(
            container = %short_id(&container.id),
            image = %spec.image,
            "container ready"
        );
        Ok(container)
    }

    /// Best-effort removal of a container nobody will get a handle to
    pub(crate) fn discard(&self, container: &RunningContainer) {
        // The caller's context may be the reason we are here, so use a fresh one
        let ctx = Context::background().with_timeout(Duration::from_secs(30));
        match self.runtime.remove(&ctx, &container.id) {
            Ok(()) => container.set_state(ContainerState::Terminated),
            Err(e) => tracing::warn!(
                container = %short_id(&container.id),
                error = %e,
                "failed to remove container"
            ),
        }
    }

    fn wait_until_ready(&self, ctx: &Context, id: &str, wait_for: &WaitFor) -> Result<()> {
        let start = ctx.now();
        tracing::debug!(container = %short_id(id), condition = %wait_for, "waiting for readiness");

        loop {
            ctx.check()?;

            if self.is_ready(ctx, id, wait_for, start)? {
                return Ok(());
            }

            if !self.runtime.is_running(ctx, id)? {
                let logs = self.runtime.logs(ctx, id).unwrap_or_default();
                return Err(TlcError::ContainerExited {
                    id: id.to_string(),
                    logs: tail(&logs, EXIT_LOG_TAIL),
                });
            }

            if ctx.now().duration_since(start) >= self.ready_timeout {
                return Err(TlcError::ReadinessTimeout {
                    id: id.to_string(),
                    condition: wait_for.to_string(),
                    timeout_secs: self.ready_timeout.as_secs(),
                });
            }

            ctx.sleep(self.poll_interval)?;
        }
    }

    fn is_ready(&self, ctx: &Context, id: &str, wait_for: &WaitFor, start: Instant) -> Result<bool> {
        match wait_for {
            WaitFor::Nothing => Ok(true),
            WaitFor::Duration(delay) => Ok(ctx.now().duration_since(start) >= *delay),
            WaitFor::Log {
                message,
                occurrences,
            } => {
                let logs = self.runtime.logs(ctx, id)?;
                Ok(logs.matches(message.as_str()).count() >= *occurrences)
            }
            WaitFor::Port(port) => match self.runtime.mapped_port(ctx, id, port)? {
                Some(external) => {
                    let addr = SocketAddr::from(([127, 0, 0, 1], external));
                    Ok(TcpStream::connect_timeout(&addr, Duration::from_secs(1)).is_ok())
                }
                None => Ok(false),
            },
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn tail(logs: &str, lines: usize) -> String {
    let all: Vec<&str> = logs.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
