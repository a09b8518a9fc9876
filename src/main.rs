use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use terralocacon::cli;
use terralocacon::config::Config;
use terralocacon::context::Context;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tlc")]
#[command(about = "Ephemeral LocalStack and MongoDB containers for Terraform tests", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding .terralocacon.yml (defaults to the current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Give up on any single command after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a LocalStack container
    Localstack {
        #[arg(long, default_value = "eu-west-1")]
        region: String,
        /// Comma-separated AWS services to enable
        #[arg(long, default_value = "dynamodb")]
        services: String,
        /// Also patch this localstack.tf (empty for the default location)
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        patch: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Start a MongoDB container
    Mongodb {
        #[arg(long, default_value = "root")]
        username: String,
        #[arg(long, env = "TLC_MONGO_PASSWORD")]
        password: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the host port mapped to a container port
    Port { container: String, port: String },
    /// Rewrite localhost:4566 in localstack.tf for a running LocalStack container
    Patch {
        container: String,
        #[arg(long)]
        source: Option<String>,
    },
    /// Stop and remove a container
    Terminate { container: String },
    /// terraform init + apply in a directory
    Apply {
        dir: PathBuf,
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// terraform destroy in a directory
    Destroy {
        dir: PathBuf,
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Create a .terralocacon.yml template
    Init,
    /// Check .terralocacon.yml
    Validate,
    /// Print the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("terralocacon=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let config = Config::load(&config_dir)
        .with_context(|| format!("failed to load config from {}", config_dir.display()))?;

    let mut ctx = Context::background();
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(std::time::Duration::from_secs(secs));
    }

    match cli.command {
        Commands::Localstack {
            region,
            services,
            patch,
            json,
        } => cli::service::localstack(&ctx, &config, &region, &services, patch.as_deref(), json)?,
        Commands::Mongodb {
            username,
            password,
            json,
        } => cli::service::mongodb(&ctx, &config, &username, &password, json)?,
        Commands::Port { container, port } => cli::container::port(&ctx, &config, &container, &port)?,
        Commands::Patch { container, source } => {
            cli::container::patch(&ctx, &config, &container, source.as_deref())?
        }
        Commands::Terminate { container } => cli::container::terminate(&ctx, &config, &container)?,
        Commands::Apply { dir, max_retries } => {
            cli::terraform::apply(&ctx, &config, &dir, max_retries)?
        }
        Commands::Destroy { dir, max_retries } => {
            cli::terraform::destroy(&ctx, &config, &dir, max_retries)?
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init => cli::config_cmd::init(&config_dir)?,
            ConfigCommands::Validate => cli::config_cmd::validate(&config_dir)?,
            ConfigCommands::Show => cli::config_cmd::show(&config)?,
        },
    }

    Ok(())
}
