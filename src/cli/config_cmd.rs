// Config command: create, validate and show .terralocacon.yml
use crate::config::{Config, CONFIG_FILE};
use crate::errors::{Result, TlcError};
use colored::Colorize;
use std::fs;
use std::path::Path;

const TEMPLATE_CONFIG: &str = r#"# terralocacon configuration file
#
# Every setting is optional; missing keys fall back to the defaults below.
# TLC_DOCKER_BIN, TLC_READY_TIMEOUT, TLC_TERRAFORM_BIN, TLC_LOCALSTACK_IMAGE
# and TLC_MONGODB_IMAGE override the matching keys at runtime.

docker:
  binary: docker
  # How long a container may take to log its ready line ("90s", "2m")
  ready_timeout: 60s
  poll_interval_ms: 250
  # Label attached to every container started by tlc
  label: org.terralocacon.managed=true

images:
  localstack: localstack/localstack:latest
  mongodb: mongo:latest

patch:
  # Original file whose localhost:4566 endpoint gets rewritten
  default_source: ./local/localstack.tf
  # conventional: always read default_source (the path argument is only checked)
  # given: read the path argument itself
  source_resolution: conventional
  # temp_parent: /tmp/terralocacon

terraform:
  binary: terraform
  max_retries: 3
  retry_delay: 5s
"#;

/// Write a commented config template into `dir`
pub fn init(dir: &Path) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE);

    if config_path.exists() {
        return Err(TlcError::ConfigError(format!(
            "{} already exists. Remove it first or edit manually.",
            CONFIG_FILE
        )));
    }

    fs::write(&config_path, TEMPLATE_CONFIG)?;

    println!("{}", "✓ Configuration file created!".bright_green());
    println!("\nCreated: {}", config_path.display().to_string().bright_cyan());
    println!(
        "\nValidate your config anytime with: {}",
        "tlc config validate".bright_cyan()
    );

    Ok(())
}

/// Parse the config file in `dir` and report problems
pub fn validate(dir: &Path) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE);

    if !config_path.exists() {
        println!("{}", "⚠ No configuration file found".bright_yellow());
        println!("  • Create one: {}", "tlc config init".bright_cyan());
        println!("  • Defaults are used without a config file");
        return Ok(());
    }

    let config = Config::load(dir)?;

    // Durations are strings in the file, so check they parse too
    config.docker.ready_timeout()?;
    config.terraform.retry_delay()?;

    println!("{}", "✓ Configuration is valid!".bright_green().bold());
    println!("  • Docker binary: {}", config.docker.binary);
    println!("  • Ready timeout: {}", config.docker.ready_timeout);
    println!("  • LocalStack image: {}", config.images.localstack);
    println!("  • MongoDB image: {}", config.images.mongodb);
    println!(
        "  • Patch source: {} ({:?})",
        config.patch.default_source.display(),
        config.patch.source_resolution
    );

    Ok(())
}

/// Print the effective configuration, env overrides included
pub fn show(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = serde_yml::from_str(TEMPLATE_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        init(temp.path()).unwrap();
        assert!(temp.path().join(CONFIG_FILE).exists());

        let result = init(temp.path());
        assert!(matches!(result, Err(TlcError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "docker:\n  ready_timeout: eventually\n",
        )
        .unwrap();

        assert!(validate(temp.path()).is_err());
    }
}
