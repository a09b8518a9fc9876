// Rewrite the LocalStack endpoint in localstack.tf for a running container
// The patched copy goes to a fresh temp directory so parallel runs never collide

use crate::container::{EndpointBinding, RunningContainer};
use crate::context::Context;
use crate::errors::{Result, TlcError};
use crate::profiles::LOCALSTACK_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name every patched copy is written under
pub const LOCALSTACK_FILE: &str = "localstack.tf";

/// Where the original localstack.tf lives by convention
pub const DEFAULT_SOURCE: &str = "./local/localstack.tf";

/// Endpoint baked into localstack.tf that gets replaced
pub const PLACEHOLDER_ENDPOINT: &str = "localhost:4566";

const TEMP_DIR_PREFIX: &str = "terralocacon-";

/// Which file the patcher reads once the path argument passed validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceResolution {
    /// Always read the conventional default source; the argument is only
    /// checked for the localstack.tf name. Existing callers rely on this.
    #[default]
    Conventional,
    /// Read the path that was passed in
    Given,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOptions {
    pub default_source: PathBuf,
    pub resolution: SourceResolution,
    pub temp_parent: Option<PathBuf>,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            default_source: PathBuf::from(DEFAULT_SOURCE),
            resolution: SourceResolution::default(),
            temp_parent: None,
        }
    }
}

/// Result of one patch run. The directory outlives this value; remove it
/// with [`PatchedConfig::cleanup`] when the Terraform run is done.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchedConfig {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub output_path: PathBuf,
    pub endpoint: String,
}

impl PatchedConfig {
    pub fn cleanup(&self) -> Result<()> {
        fs::remove_dir_all(&self.output_dir)?;
        Ok(())
    }
}

/// Validate the path argument and pick the file to read.
///
/// Blank means the conventional default. Anything else must name
/// localstack.tf; this is a naming check, not an existence check.
pub fn resolve_source_path(source: &str, options: &PatchOptions) -> Result<PathBuf> {
    let given = if source.trim().is_empty() {
        options.default_source.clone()
    } else {
        PathBuf::from(source)
    };

    if !given.to_string_lossy().contains(LOCALSTACK_FILE) {
        return Err(TlcError::ConfigFileNotFound(source.to_string()));
    }

    Ok(match options.resolution {
        SourceResolution::Conventional => options.default_source.clone(),
        SourceResolution::Given => given,
    })
}

/// Replace the first `placeholder` on every line that has one.
///
/// Lines are split and re-joined on `\n`, so everything else, including
/// `\r` and a trailing newline, comes back byte for byte. The content does
/// not have to be UTF-8.
pub fn substitute_endpoint_bytes(content: &[u8], placeholder: &str, endpoint: &str) -> Vec<u8> {
    let placeholder = placeholder.as_bytes();
    let mut out = Vec::with_capacity(content.len());

    for (i, line) in content.split(|b| *b == b'\n').enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        match find(line, placeholder) {
            Some(at) => {
                out.extend_from_slice(&line[..at]);
                out.extend_from_slice(endpoint.as_bytes());
                out.extend_from_slice(&line[at + placeholder.len()..]);
            }
            None => out.extend_from_slice(line),
        }
    }
    out
}

/// [`substitute_endpoint_bytes`] for text already in memory
pub fn substitute_endpoint(content: &str, placeholder: &str, endpoint: &str) -> String {
    let patched = substitute_endpoint_bytes(content.as_bytes(), placeholder, endpoint);
    // UTF-8 in, UTF-8 out: only whole UTF-8 strings are spliced
    String::from_utf8_lossy(&patched).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Patch `source` against the LocalStack port of `container`.
pub fn patch_localstack_config(
    ctx: &Context,
    container: &RunningContainer,
    source: &str,
    options: &PatchOptions,
) -> Result<PatchedConfig> {
    let source_path = resolve_source_path(source, options)?;

    let raw = fs::read(&source_path).map_err(|e| TlcError::ReadFile {
        path: source_path.display().to_string(),
        source: e,
    })?;

    let binding = container.endpoint(ctx, &LOCALSTACK_PORT)?;

    write_patched(&source_path, &raw, &binding, options)
}

/// Substitute `binding` into `raw` and write it under a fresh temp directory
pub fn write_patched(
    source_path: &Path,
    raw: &[u8],
    binding: &EndpointBinding,
    options: &PatchOptions,
) -> Result<PatchedConfig> {
    let endpoint = binding.address();
    let patched = substitute_endpoint_bytes(raw, PLACEHOLDER_ENDPOINT, &endpoint);

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_DIR_PREFIX);
    let temp_dir = match &options.temp_parent {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(TlcError::TempDir)?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    }
    .map_err(TlcError::TempDir)?;

    let output_path = temp_dir.path().join(LOCALSTACK_FILE);
    fs::write(&output_path, patched).map_err(|e| TlcError::WriteFile {
        path: output_path.display().to_string(),
        source: e,
    })?;

    set_owner_read_write(&output_path).map_err(|e| TlcError::Permissions {
        path: output_path.display().to_string(),
        source: e,
    })?;

    // Only persist the directory once everything in it is in place
    let output_dir = temp_dir.keep();

    tracing::info!(
        source = %source_path.display(),
        output = %output_path.display(),
        endpoint = %endpoint,
        "patched localstack config"
    );

    Ok(PatchedConfig {
        source_path: source_path.to_path_buf(),
        output_dir,
        output_path,
        endpoint,
    })
}

#[cfg(unix)]
fn set_owner_read_write(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_read_write(path: &Path) -> std::io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}
