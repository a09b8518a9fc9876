// Child process execution for the docker and terraform collaborators
// Output goes to temp files and the wait loop honours the caller's context

use crate::context::Context;
use crate::errors::{Result, TlcError};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished child process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, the way a terminal would interleave them
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }
}

/// Run `program` with `args` to completion.
///
/// A non-zero exit status is not an error here; callers inspect
/// [`CommandOutput::success`]. Cancellation or an expired deadline kills the
/// child and returns the context error.
pub fn run(
    ctx: &Context,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<CommandOutput> {
    ctx.check()?;

    // Pipes fill up at 64KB and would deadlock a chatty child, so use files
    let stdout_file = tempfile::NamedTempFile::new()?;
    let stderr_file = tempfile::NamedTempFile::new()?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(File::create(stdout_file.path())?)
        .stderr(File::create(stderr_file.path())?);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    tracing::debug!(program, args = %args.join(" "), "spawning");

    let mut child = command.spawn().map_err(|source| TlcError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let status = wait_with_context(&mut child, ctx)?;

    Ok(CommandOutput {
        code: status.code(),
        stdout: read_lossy(stdout_file.path())?,
        stderr: read_lossy(stderr_file.path())?,
    })
}

/// Container logs and terraform output are not guaranteed to be UTF-8
fn read_lossy(path: &Path) -> Result<String> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Poll the child until it exits, killing it if the context gives up first
fn wait_with_context(child: &mut Child, ctx: &Context) -> Result<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if let Err(e) = ctx.check() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e);
                }
                ctx.clock().sleep(POLL_INTERVAL);
            }
            Err(e) => {
                // Try to clean up anyway to prevent an orphan
                let _ = child.kill();
                let _ = child.wait();
                return Err(TlcError::Io(e));
            }
        }
    }
}
