// Container runtime seam and the docker CLI backend
// Every call blocks and shells out, no command goes through a shell

use crate::container::port::ContainerPort;
use crate::container::spec::ContainerSpec;
use crate::context::Context;
use crate::errors::{Result, TlcError};
use crate::process::{self, CommandOutput};

/// Label attached to every container we start, used for cleanup
pub const DEFAULT_LABEL: &str = "org.terralocacon.managed=true";

/// Operations the launcher needs from a container runtime
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container, returning its id
    fn run(&self, ctx: &Context, spec: &ContainerSpec) -> Result<String>;

    /// Host port bound to `port`, or `None` if it is not published
    fn mapped_port(&self, ctx: &Context, id: &str, port: &ContainerPort) -> Result<Option<u16>>;

    /// Everything the container has written to stdout and stderr so far
    fn logs(&self, ctx: &Context, id: &str) -> Result<String>;

    fn is_running(&self, ctx: &Context, id: &str) -> Result<bool>;

    /// Stop and remove the container and its anonymous volumes
    fn remove(&self, ctx: &Context, id: &str) -> Result<()>;
}

/// Runtime backed by the `docker` binary
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    label: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            label: DEFAULT_LABEL.to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Check if the docker daemon answers
    pub fn is_available(&self, ctx: &Context) -> bool {
        let args = vec![
            "version".to_string(),
            "--format".to_string(),
            "{{.Server.Version}}".to_string(),
        ];
        process::run(ctx, &self.binary, &args, None)
            .map(|output| output.success())
            .unwrap_or(false)
    }

    /// Build `docker run` arguments (safe from injection)
    pub fn build_run_args(&self, spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-d".to_string()];

        if !self.label.is_empty() {
            args.push("--label".to_string());
            args.push(self.label.clone());
        }

        // No host port given, so docker picks a free ephemeral one
        for port in &spec.exposed_ports {
            args.push("--publish".to_string());
            args.push(port.to_string());
        }

        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(spec.image.clone());
        args
    }

    fn docker(&self, ctx: &Context, args: &[String]) -> Result<CommandOutput> {
        process::run(ctx, &self.binary, args, None)
    }

    fn docker_checked(&self, ctx: &Context, args: &[String]) -> Result<CommandOutput> {
        let output = self.docker(ctx, args)?;
        if !output.success() {
            return Err(TlcError::Docker(format!(
                "`{} {}` failed: {}",
                self.binary,
                args.first().map(String::as_str).unwrap_or_default(),
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl ContainerRuntime for DockerCli {
    fn run(&self, ctx: &Context, spec: &ContainerSpec) -> Result<String> {
        let args = self.build_run_args(spec);
        let output = self.docker_checked(ctx, &args)?;

        // Pull progress can precede the id, which is always the last line
        let id = output
            .stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| TlcError::Docker("`docker run` printed no container id".to_string()))?;

        Ok(id.to_string())
    }

    fn mapped_port(&self, ctx: &Context, id: &str, port: &ContainerPort) -> Result<Option<u16>> {
        let args = vec!["port".to_string(), id.to_string(), port.to_string()];
        let output = self.docker(ctx, &args)?;

        if !output.success() {
            if output.stderr.contains("No public port") || output.stderr.contains("no public port")
            {
                return Ok(None);
            }
            return Err(TlcError::Docker(format!(
                "`{} port` failed: {}",
                self.binary,
                output.stderr.trim()
            )));
        }

        Ok(parse_port_output(&output.stdout))
    }

    fn logs(&self, ctx: &Context, id: &str) -> Result<String> {
        let args = vec!["logs".to_string(), id.to_string()];
        let output = self.docker_checked(ctx, &args)?;
        Ok(output.combined())
    }

    fn is_running(&self, ctx: &Context, id: &str) -> Result<bool> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Running}}".to_string(),
            id.to_string(),
        ];
        let output = self.docker_checked(ctx, &args)?;
        Ok(output.stdout.trim() == "true")
    }

    fn remove(&self, ctx: &Context, id: &str) -> Result<()> {
        let args = vec![
            "rm".to_string(),
            "--force".to_string(),
            "--volumes".to_string(),
            id.to_string(),
        ];
        self.docker_checked(ctx, &args)?;
        Ok(())
    }
}

/// Extract the host port from `docker port` output.
///
/// Output has one binding per line (`0.0.0.0:32768`, `[::]:32768`); the
/// first parseable one wins.
pub fn parse_port_output(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse::<u16>().ok())
}
