// Commands against a container that is already running
use crate::config::Config;
use crate::container::{DockerCli, RunningContainer};
use crate::context::Context;
use crate::errors::Result;
use crate::patch::patch_localstack_config;
use colored::Colorize;
use std::sync::Arc;

fn attach(config: &Config, id: &str) -> RunningContainer {
    let runtime = DockerCli::new(&config.docker.binary).with_label(&config.docker.label);
    RunningContainer::attach(Arc::new(runtime), id)
}

/// Print the host port mapped to `port` inside container `id`
pub fn port(ctx: &Context, config: &Config, id: &str, port: &str) -> Result<()> {
    let container = attach(config, id);
    let external = container.mapped_port(ctx, port)?;
    println!("{}", external);
    Ok(())
}

/// Patch localstack.tf against the LocalStack container `id`
pub fn patch(ctx: &Context, config: &Config, id: &str, source: Option<&str>) -> Result<()> {
    let container = attach(config, id);
    let patched = patch_localstack_config(
        ctx,
        &container,
        source.unwrap_or_default(),
        &config.patch.options(),
    )?;

    println!("{} Patched {}", "✓".bright_green(), patched.source_path.display());
    println!("  Endpoint: {}", patched.endpoint.bright_cyan());
    println!("  Output:   {}", patched.output_path.display());
    Ok(())
}

/// Stop and remove container `id`
pub fn terminate(ctx: &Context, config: &Config, id: &str) -> Result<()> {
    let container = attach(config, id);
    container.terminate(ctx)?;
    println!("{} Terminated {}", "✓".bright_green(), id);
    Ok(())
}
