// Terraform runner for patched LocalStack configurations
// init/apply/destroy with retries on known transient provider errors

use crate::config::TerraformConfig;
use crate::context::Context;
use crate::errors::{Result, TlcError};
use crate::process::{self, CommandOutput};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transient failures worth another attempt, pattern -> description
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (
        ".*read: connection reset by peer.*",
        "Failed to reach helm charts repository.",
    ),
    (".*handshake timeout.*", "Failed to reach Terraform Registry."),
    (
        "(?s).*Error installing provider.*tcp.*connection reset by peer.*",
        "Provider registry connection reset by peer.",
    ),
    (
        "(?s).*Error installing provider.*tcp.*i/o timeout.*",
        "Provider registry timed out.",
    ),
    (
        ".*Error configuring the backend.*TLS handshake timeout.*",
        "Backend TLS handshake timeout.",
    ),
    (
        "(?s).*Failed to query available provider packages.*",
        "Provider registry unreachable.",
    ),
    (
        ".*timeout while waiting for plugin to start.*",
        "Failed to start provider plugin.",
    ),
    (
        ".*timed out waiting for server handshake.*",
        "Provider plugin handshake timed out.",
    ),
    (
        "(?s).*Could not download module.*The requested URL returned error: 429.*",
        "Module download was rate limited.",
    ),
    (
        "(?s).*connection refused.*localhost.*",
        "LocalStack endpoint not accepting connections yet.",
    ),
];

/// Options for one Terraform working directory
#[derive(Debug, Clone, PartialEq)]
pub struct TerraformOptions {
    pub dir: PathBuf,
    pub max_retries: u32,
    pub time_between_retries: Duration,
    pub retryable_errors: BTreeMap<String, String>,
    pub binary: String,
    pub no_color: bool,
}

impl TerraformOptions {
    pub fn new(dir: impl Into<PathBuf>, max_retries: u32) -> Self {
        Self {
            dir: dir.into(),
            max_retries,
            time_between_retries: Duration::from_secs(5),
            retryable_errors: BTreeMap::new(),
            binary: "terraform".to_string(),
            no_color: true,
        }
    }

    /// Options for `dir` using the binary and retry settings from config
    pub fn from_config(dir: impl Into<PathBuf>, config: &TerraformConfig) -> Result<Self> {
        let mut options = Self::new(dir, config.max_retries).with_default_retryable_errors();
        options.binary = config.binary.clone();
        options.time_between_retries = config.retry_delay()?;
        Ok(options)
    }

    /// Add the well-known transient errors, keeping any already set
    pub fn with_default_retryable_errors(mut self) -> Self {
        for (pattern, description) in DEFAULT_RETRYABLE_ERRORS {
            self.retryable_errors
                .entry(pattern.to_string())
                .or_insert_with(|| description.to_string());
        }
        self
    }

    pub fn with_retryable_error(
        mut self,
        pattern: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.retryable_errors.insert(pattern.into(), description.into());
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_time_between_retries(mut self, delay: Duration) -> Self {
        self.time_between_retries = delay;
        self
    }
}

/// Compiled view of [`TerraformOptions`] that runs commands
pub struct Terraform {
    options: TerraformOptions,
    retryable: Vec<(Regex, String)>,
}

impl Terraform {
    pub fn new(options: TerraformOptions) -> Result<Self> {
        let retryable = options
            .retryable_errors
            .iter()
            .map(|(pattern, description)| {
                Regex::new(pattern)
                    .map(|re| (re, description.clone()))
                    .map_err(|e| {
                        TlcError::ConfigError(format!(
                            "Invalid retryable error pattern '{}': {}",
                            pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { options, retryable })
    }

    pub fn dir(&self) -> &Path {
        &self.options.dir
    }

    /// `terraform init` followed by `terraform apply`; returns apply's stdout
    pub fn init_and_apply(&self, ctx: &Context) -> Result<String> {
        self.init(ctx)?;
        self.apply(ctx)
    }

    pub fn init(&self, ctx: &Context) -> Result<String> {
        self.run_with_retry(ctx, self.init_args())
    }

    pub fn apply(&self, ctx: &Context) -> Result<String> {
        self.run_with_retry(ctx, self.apply_args())
    }

    pub fn destroy(&self, ctx: &Context) -> Result<String> {
        self.run_with_retry(ctx, self.destroy_args())
    }

    pub fn init_args(&self) -> Vec<String> {
        self.with_color_flag(vec![
            "init".to_string(),
            "-upgrade=false".to_string(),
            "-input=false".to_string(),
        ])
    }

    pub fn apply_args(&self) -> Vec<String> {
        self.with_color_flag(vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ])
    }

    pub fn destroy_args(&self) -> Vec<String> {
        self.with_color_flag(vec![
            "destroy".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ])
    }

    fn with_color_flag(&self, mut args: Vec<String>) -> Vec<String> {
        if self.options.no_color {
            args.push("-no-color".to_string());
        }
        args
    }

    /// Description of the first retryable pattern found in `output`
    pub fn retryable_reason(&self, output: &str) -> Option<&str> {
        self.retryable
            .iter()
            .find(|(re, _)| re.is_match(output))
            .map(|(_, description)| description.as_str())
    }

    fn run_with_retry(&self, ctx: &Context, args: Vec<String>) -> Result<String> {
        let subcommand = args.first().cloned().unwrap_or_default();
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!(
                dir = %self.options.dir.display(),
                attempt,
                "terraform {}",
                subcommand
            );

            let output = self.run_once(ctx, &args)?;
            if output.success() {
                return Ok(output.stdout);
            }

            let combined = output.combined();
            let reason = self.retryable_reason(&combined);

            match reason {
                Some(reason) if attempt <= self.options.max_retries => {
                    tracing::warn!(
                        attempt,
                        max_retries = self.options.max_retries,
                        reason,
                        "terraform {} failed with a retryable error",
                        subcommand
                    );
                    ctx.sleep(self.options.time_between_retries)?;
                }
                _ => {
                    return Err(TlcError::Terraform(format!(
                        "'terraform {}' failed after {} attempt(s) with exit code {}\nStdout: {}\nStderr: {}",
                        subcommand,
                        attempt,
                        output.code.unwrap_or(-1),
                        output.stdout,
                        output.stderr
                    )));
                }
            }
        }
    }

    fn run_once(&self, ctx: &Context, args: &[String]) -> Result<CommandOutput> {
        process::run(ctx, &self.options.binary, args, Some(&self.options.dir))
    }
}

/// Run init and apply for `options`
pub fn init_and_apply(ctx: &Context, options: &TerraformOptions) -> Result<String> {
    Terraform::new(options.clone())?.init_and_apply(ctx)
}

/// Run destroy for `options`
pub fn destroy(ctx: &Context, options: &TerraformOptions) -> Result<String> {
    Terraform::new(options.clone())?.destroy(ctx)
}
