// Start a backing service container and report where it listens
use crate::config::Config;
use crate::container::RunningContainer;
use crate::context::Context;
use crate::errors::{Result, TlcError};
use crate::patch::{patch_localstack_config, PatchedConfig};
use crate::profiles::Profile;
use colored::Colorize;
use serde::Serialize;

/// What a started service looks like to scripts (`--json`)
#[derive(Debug, Serialize)]
pub struct ServiceSummary {
    pub profile: String,
    pub container_id: String,
    pub image: String,
    pub external_port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patched_dir: Option<String>,
}

impl ServiceSummary {
    fn new(profile: &Profile, container: &RunningContainer, port: String) -> Self {
        Self {
            profile: profile.name.to_string(),
            container_id: container.id().to_string(),
            image: container.image().to_string(),
            external_port: port,
            endpoint: None,
            patched_dir: None,
        }
    }

    fn with_patch(mut self, patched: &PatchedConfig) -> Self {
        self.endpoint = Some(patched.endpoint.clone());
        self.patched_dir = Some(patched.output_dir.display().to_string());
        self
    }
}

/// Start LocalStack, optionally patching a localstack.tf against it
pub fn localstack(
    ctx: &Context,
    config: &Config,
    region: &str,
    services: &str,
    patch_source: Option<&str>,
    json: bool,
) -> Result<()> {
    let launcher = config.docker.available_launcher(ctx)?;
    let profile = Profile::localstack(region, services).with_image(&config.images.localstack);

    if !json {
        println!("Starting {} ({})...", profile.name, profile.spec.image);
    }
    let (container, port) = profile.start(ctx, &launcher)?;
    let mut summary = ServiceSummary::new(&profile, &container, port);

    if let Some(source) = patch_source {
        match patch_localstack_config(ctx, &container, source, &config.patch.options()) {
            Ok(patched) => summary = summary.with_patch(&patched),
            Err(e) => {
                // Don't leave a container behind that nobody knows the id of
                if let Err(cleanup) = container.terminate(ctx) {
                    tracing::warn!(error = %cleanup, "failed to remove container after patch error");
                }
                return Err(e);
            }
        }
    }

    print_summary(&summary, json)
}

/// Start MongoDB with a root user
pub fn mongodb(
    ctx: &Context,
    config: &Config,
    username: &str,
    password: &str,
    json: bool,
) -> Result<()> {
    let launcher = config.docker.available_launcher(ctx)?;
    let profile = Profile::mongodb(username, password).with_image(&config.images.mongodb);

    if !json {
        println!("Starting {} ({})...", profile.name, profile.spec.image);
    }
    let (container, port) = profile.start(ctx, &launcher)?;

    print_summary(&ServiceSummary::new(&profile, &container, port), json)
}

fn print_summary(summary: &ServiceSummary, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(summary)
            .map_err(|e| TlcError::ConfigError(format!("Failed to serialize summary: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{} {} is ready", "✓".bright_green(), summary.profile);
    println!("  Container: {}", summary.container_id.bright_cyan());
    println!("  Port:      {}", summary.external_port.bright_cyan());
    if let Some(endpoint) = &summary.endpoint {
        println!("  Endpoint:  {}", endpoint);
    }
    if let Some(dir) = &summary.patched_dir {
        println!("  Patched:   {}", dir);
    }
    println!(
        "\nStop it with: {}",
        format!("tlc terminate {}", summary.container_id).bright_cyan()
    );

    Ok(())
}
