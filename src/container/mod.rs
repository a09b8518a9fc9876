// Container launching, port resolution and termination

pub mod launcher;
pub mod port;
pub mod runtime;
pub mod spec;

pub use launcher::{terminate, ContainerState, Launcher, RunningContainer};
pub use port::{ContainerPort, EndpointBinding, Protocol};
pub use runtime::{ContainerRuntime, DockerCli};
pub use spec::{ContainerSpec, WaitFor};
