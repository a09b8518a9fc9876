use crate::container::runtime::{DockerCli, DEFAULT_LABEL};
use crate::container::Launcher;
use crate::context::Context;
use crate::errors::{Result, TlcError};
use crate::patch::{PatchOptions, SourceResolution, DEFAULT_SOURCE};
use crate::profiles::{LOCALSTACK_IMAGE, MONGODB_IMAGE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_FILE: &str = ".terralocacon.yml";

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub patch: PatchConfig,
    #[serde(default)]
    pub terraform: TerraformConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DockerConfig {
    pub binary: String,
    /// How long a container may take to satisfy its readiness check ("60s", "2m")
    pub ready_timeout: String,
    pub poll_interval_ms: u64,
    pub label: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            ready_timeout: "60s".to_string(),
            poll_interval_ms: 250,
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ImagesConfig {
    pub localstack: String,
    pub mongodb: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            localstack: LOCALSTACK_IMAGE.to_string(),
            mongodb: MONGODB_IMAGE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PatchConfig {
    /// Conventional location of the original localstack.tf
    pub default_source: PathBuf,
    pub source_resolution: SourceResolution,
    /// Parent for the per-run output directories (system temp dir if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_parent: Option<PathBuf>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            default_source: PathBuf::from(DEFAULT_SOURCE),
            source_resolution: SourceResolution::default(),
            temp_parent: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TerraformConfig {
    pub binary: String,
    pub max_retries: u32,
    pub retry_delay: String,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            max_retries: 3,
            retry_delay: "5s".to_string(),
        }
    }
}

impl Config {
    /// Load config from .terralocacon.yml in `dir`, then apply env overrides
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(&dir.join(CONFIG_FILE))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file, returning defaults when it doesn't exist
    pub fn load_file(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path)?;
        let config: Config = serde_yml::from_str(&content)
            .map_err(|e| TlcError::ConfigError(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Override settings from TLC_* variables; `lookup` is `std::env::var` outside tests
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(binary) = lookup("TLC_DOCKER_BIN") {
            self.docker.binary = binary;
        }
        if let Some(timeout) = lookup("TLC_READY_TIMEOUT") {
            self.docker.ready_timeout = timeout;
        }
        if let Some(binary) = lookup("TLC_TERRAFORM_BIN") {
            self.terraform.binary = binary;
        }
        if let Some(image) = lookup("TLC_LOCALSTACK_IMAGE") {
            self.images.localstack = image;
        }
        if let Some(image) = lookup("TLC_MONGODB_IMAGE") {
            self.images.mongodb = image;
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self)
            .map_err(|e| TlcError::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}

impl DockerConfig {
    pub fn ready_timeout(&self) -> Result<Duration> {
        parse_duration(&self.ready_timeout)
    }

    /// Launcher on the docker CLI configured from this section
    pub fn launcher(&self) -> Result<Launcher> {
        let runtime = DockerCli::new(&self.binary).with_label(&self.label);
        Ok(Launcher::new(Arc::new(runtime))
            .with_ready_timeout(self.ready_timeout()?)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms.max(10))))
    }

    /// Like [`DockerConfig::launcher`], but fails up front if the daemon does not answer
    pub fn available_launcher(&self, ctx: &Context) -> Result<Launcher> {
        let runtime = DockerCli::new(&self.binary);
        if !runtime.is_available(ctx) {
            ctx.check()?;
            return Err(TlcError::Docker(format!(
                "Docker is not available via '{}'. Please install Docker or set TLC_DOCKER_BIN.",
                self.binary
            )));
        }
        self.launcher()
    }
}

impl PatchConfig {
    pub fn options(&self) -> PatchOptions {
        PatchOptions {
            default_source: self.default_source.clone(),
            resolution: self.source_resolution,
            temp_parent: self.temp_parent.clone(),
        }
    }
}

impl TerraformConfig {
    pub fn retry_delay(&self) -> Result<Duration> {
        parse_duration(&self.retry_delay)
    }
}

/// Parse a duration string ("500ms", "30s", "2m", bare seconds)
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let invalid = || TlcError::ConfigError(format!("Invalid duration value: {}", value));

    if let Some(num) = value.strip_suffix("ms") {
        num.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
    } else if let Some(num) = value.strip_suffix('s') {
        num.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    } else if let Some(num) = value.strip_suffix('m') {
        let minutes = num.trim().parse::<u64>().map_err(|_| invalid())?;
        minutes.checked_mul(60).map(Duration::from_secs).ok_or_else(invalid)
    } else {
        // Default to seconds if no unit specified
        value.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.docker.binary, "docker");
        assert_eq!(config.images.localstack, "localstack/localstack:latest");
        assert_eq!(config.images.mongodb, "mongo:latest");
        assert_eq!(config.patch.source_resolution, SourceResolution::Conventional);
        assert_eq!(config.terraform.max_retries, 3);
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_file(&temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE);

        let yaml = r#"
docker:
  ready_timeout: 2m
images:
  localstack: localstack/localstack:3.8
patch:
  source_resolution: given
  temp_parent: /tmp/tlc
terraform:
  max_retries: 5
"#;
        fs::write(&config_path, yaml).unwrap();

        let config = Config::load_file(&config_path).unwrap();
        assert_eq!(config.docker.binary, "docker");
        assert_eq!(config.docker.ready_timeout().unwrap(), Duration::from_secs(120));
        assert_eq!(config.images.localstack, "localstack/localstack:3.8");
        assert_eq!(config.images.mongodb, "mongo:latest");
        assert_eq!(config.patch.source_resolution, SourceResolution::Given);
        assert_eq!(config.patch.temp_parent, Some(PathBuf::from("/tmp/tlc")));
        assert_eq!(config.terraform.max_retries, 5);
        assert_eq!(config.terraform.binary, "terraform");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "docker: [unclosed").unwrap();

        let result = Config::load_file(&config_path);
        assert!(matches!(result, Err(TlcError::ConfigError(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TLC_DOCKER_BIN", "podman"),
            ("TLC_READY_TIMEOUT", "90s"),
            ("TLC_TERRAFORM_BIN", "tofu"),
            ("TLC_MONGODB_IMAGE", "mongo:7.0"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.docker.binary, "podman");
        assert_eq!(config.docker.ready_timeout().unwrap(), Duration::from_secs(90));
        assert_eq!(config.terraform.binary, "tofu");
        assert_eq!(config.images.localstack, LOCALSTACK_IMAGE);
        assert_eq!(config.images.mongodb, "mongo:7.0");
    }

    #[test]
    fn test_env_overrides_localstack_image() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| {
            (key == "TLC_LOCALSTACK_IMAGE").then(|| "localstack/localstack:3.8".to_string())
        });

        assert_eq!(config.images.localstack, "localstack/localstack:3.8");
        assert_eq!(config.images.mongodb, MONGODB_IMAGE);
    }

    #[test]
    fn test_parse_duration_rejects_overflowing_minutes() {
        let huge = format!("{}m", u64::MAX / 2);
        assert!(matches!(parse_duration(&huge), Err(TlcError::ConfigError(_))));
    }

    #[test]
    fn test_available_launcher_fails_without_docker() {
        let docker = DockerConfig {
            binary: "definitely-not-docker-tlc".to_string(),
            ..DockerConfig::default()
        };

        let err = docker.available_launcher(&Context::background()).unwrap_err();
        assert!(matches!(err, TlcError::Docker(_)));
        assert!(err.to_string().contains("definitely-not-docker-tlc"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration(" 45 ").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_yaml_round_trips_defaults() {
        let yaml = Config::default().to_yaml().unwrap();
        let parsed: Config = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
