//! External tool invocation with a hard deadline.
//!
//! Every subprocess the pipeline starts (repair tool, interpreters, package
//! installer) goes through [`Tool::run`], which captures both streams and
//! kills the child if it outlives its timeout.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Captured result of a finished tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short diagnostic for a failed run: the last non-empty stderr line,
    /// falling back to stdout, falling back to the exit code.
    pub fn diagnostic(&self) -> String {
        last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            .map_or_else(
                || match self.code {
                    Some(code) => format!("exited with status {code}"),
                    None => "terminated by signal".to_string(),
                },
                ToString::to_string,
            )
    }
}

/// Last non-blank line of `text`, trimmed.
pub fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

/// A subprocess to run.
#[derive(Debug, Clone)]
pub struct Tool {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl Tool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Short name used in diagnostics (`auditwheel`, `python`).
    pub fn name(&self) -> String {
        self.program.file_name().map_or_else(
            || self.program.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        )
    }

    /// Run to completion, or kill the child once `timeout` elapses.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ToolOutput::success`].
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if the program does not exist,
    /// [`ToolError::TimedOut`] if the deadline passes, and
    /// [`ToolError::Spawn`] for any other launch failure.
    pub async fn run(&self, timeout: Duration) -> Result<ToolOutput, ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %self.program.display(), args = ?self.args, "running tool");

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound {
                    program: self.program.display().to_string(),
                });
            }
            Ok(Err(source)) => {
                return Err(ToolError::Spawn {
                    program: self.name(),
                    source,
                });
            }
            // Dropping the output future drops the child, which kills it.
            Err(_) => {
                return Err(ToolError::TimedOut {
                    program: self.name(),
                    timeout,
                });
            }
        };

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line_skips_trailing_blanks() {
        assert_eq!(last_line("a\nb  \n\n  \n"), Some("b"));
        assert_eq!(last_line("\n \n"), None);
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let out = ToolOutput {
            code: Some(1),
            stdout: "out line\n".into(),
            stderr: "warning\nerror: bad wheel\n".into(),
        };
        assert_eq!(out.diagnostic(), "error: bad wheel");

        let out = ToolOutput {
            code: Some(2),
            stdout: "only stdout\n".into(),
            stderr: String::new(),
        };
        assert_eq!(out.diagnostic(), "only stdout");

        let out = ToolOutput {
            code: Some(3),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(out.diagnostic(), "exited with status 3");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let err = Tool::new("/nonexistent/wheelfix-tool")
            .run(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_code() {
        let out = Tool::new("sh")
            .args(["-c", "echo hello; echo oops >&2; exit 4"])
            .run(Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(out.code, Some(4));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.diagnostic(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let err = Tool::new("sleep")
            .arg("30")
            .run(Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "sleep timed out after 200ms");
    }
}
