//! Subprocess runner shared by every toolchain adapter.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use super::ToolError;

/// Longest stderr excerpt kept in error messages.
const STDERR_EXCERPT_CHARS: usize = 500;

/// An external executable resolved by name, optionally pinned to a path.
#[derive(Debug, Clone)]
pub struct ToolBinary {
    name: &'static str,
    program: PathBuf,
}

impl ToolBinary {
    /// Resolve `name` through `PATH` at invocation time.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            program: PathBuf::from(name),
        }
    }

    /// Use an explicit executable path instead of a `PATH` lookup.
    pub fn at(name: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            name,
            program: program.into(),
        }
    }

    /// Tool name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the executable can be found.
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Run the tool to completion, capturing stdout and stderr.
    ///
    /// The child is killed when `limit` elapses. A missing executable maps to
    /// [`ToolError::NotInstalled`] and a non-zero exit to [`ToolError::Failed`].
    pub async fn run<I, S>(&self, args: I, limit: Duration) -> Result<Output, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        tracing::debug!(tool = self.name, command = ?command.as_std(), "Running toolchain command");

        let child = command.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotInstalled { tool: self.name }
            } else {
                ToolError::Io {
                    tool: self.name,
                    source: err,
                }
            }
        })?;

        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(ToolError::Io {
                    tool: self.name,
                    source: err,
                });
            }
            // The child was moved into wait_with_output; dropping it kills the process.
            Err(_) => {
                return Err(ToolError::TimedOut {
                    tool: self.name,
                    secs: limit.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: self.name,
                code: output.status.code(),
                stderr: stderr_excerpt(&output.stderr),
            });
        }

        Ok(output)
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.chars().count() <= STDERR_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut excerpt: String = trimmed.chars().take(STDERR_EXCERPT_CHARS).collect();
    excerpt.push('…');
    excerpt
}

/// Write an executable shell script standing in for a real tool.
#[cfg(all(test, unix))]
pub(crate) fn fake_tool(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
