// Library interface for terralocacon
// Ephemeral backing-service containers and localstack.tf endpoint patching

pub mod cli;
pub mod config;
pub mod container;
pub mod context;
pub mod errors;
pub mod patch;
pub mod process;
pub mod profiles;
pub mod terraform;

pub use container::{terminate, ContainerSpec, Launcher, RunningContainer, WaitFor};
pub use context::Context;
pub use errors::{Result, TlcError};
pub use patch::{patch_localstack_config, PatchOptions, PatchedConfig};
pub use profiles::{new_localstack_container, new_mongodb_container, Profile};
