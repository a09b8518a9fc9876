// Fixed backing-service profiles: LocalStack and MongoDB
// Each one launches its container and resolves its service port in one call

use crate::container::{ContainerPort, ContainerSpec, Launcher, RunningContainer, WaitFor};
use crate::context::Context;
use crate::errors::{Result, TlcError};

pub const LOCALSTACK_IMAGE: &str = "localstack/localstack:latest";
pub const LOCALSTACK_PORT: ContainerPort = ContainerPort::tcp(4566);
pub const LOCALSTACK_READY_LOG: &str = "Ready";

pub const MONGODB_IMAGE: &str = "mongo:latest";
pub const MONGODB_PORT: ContainerPort = ContainerPort::tcp(27017);
pub const MONGODB_READY_LOG: &str = "ready for start up.";

/// A named container configuration for one backing service
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: &'static str,
    pub spec: ContainerSpec,
    pub service_port: ContainerPort,
}

impl Profile {
    /// LocalStack with the given default region and comma-separated service list
    pub fn localstack(region: &str, services: &str) -> Self {
        let spec = ContainerSpec::new(LOCALSTACK_IMAGE)
            .with_exposed_port(LOCALSTACK_PORT)
            .with_wait_for(WaitFor::log(LOCALSTACK_READY_LOG))
            .with_env("DEFAULT_REGION", region)
            .with_env("SERVICES", services)
            .with_env("KINESIS_PROVIDER", "kinesalite")
            .with_env("DOCKER_HOST", "unix:///var/run/docker.sock")
            .with_env("DATA_DIR", "/tmp/localstack/data")
            .with_env("DEBUG", "1");

        Self {
            name: "localstack",
            spec,
            service_port: LOCALSTACK_PORT,
        }
    }

    /// MongoDB with a root user
    pub fn mongodb(username: &str, password: &str) -> Self {
        let spec = ContainerSpec::new(MONGODB_IMAGE)
            .with_exposed_port(MONGODB_PORT)
            .with_wait_for(WaitFor::log(MONGODB_READY_LOG))
            .with_env("MONGO_INITDB_ROOT_USERNAME", username)
            .with_env("MONGO_INITDB_ROOT_PASSWORD", password);

        Self {
            name: "mongo",
            spec,
            service_port: MONGODB_PORT,
        }
    }

    /// Swap the image tag, e.g. to pin a LocalStack version
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.spec.image = image.into();
        self
    }

    /// Launch the container and resolve its service port.
    ///
    /// Returns both or neither: if the port cannot be resolved the container
    /// is removed before the error is returned.
    pub fn start(&self, ctx: &Context, launcher: &Launcher) -> Result<(RunningContainer, String)> {
        let container = launcher
            .launch(ctx, &self.spec)
            .map_err(|cause| TlcError::ContainerCreate {
                profile: self.name.to_string(),
                cause: Box::new(cause),
            })?;

        match container.mapped_container_port(ctx, &self.service_port) {
            Ok(port) => {
                tracing::info!(
                    profile = self.name,
                    container = %container.id(),
                    port,
                    "backing service up"
                );
                Ok((container, port.to_string()))
            }
            Err(e) => {
                launcher.discard(&container);
                Err(TlcError::PortResolution(Box::new(e)))
            }
        }
    }
}

/// Start LocalStack and return it with the host port for 4566/tcp
pub fn new_localstack_container(
    ctx: &Context,
    launcher: &Launcher,
    region: &str,
    services: &str,
) -> Result<(RunningContainer, String)> {
    Profile::localstack(region, services).start(ctx, launcher)
}

/// Start MongoDB and return it with the host port for 27017/tcp
pub fn new_mongodb_container(
    ctx: &Context,
    launcher: &Launcher,
    username: &str,
    password: &str,
) -> Result<(RunningContainer, String)> {
    Profile::mongodb(username, password).start(ctx, launcher)
}
