use crate::{Result, WatchdogError};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::time::timeout;

/// A program plus its argument vector. Arguments are passed straight to the
/// process, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs a command and yields its trimmed stdout on exit code 0.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<String>;
}

/// Spawns real processes, each bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<String> {
        let child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(WatchdogError::transient(
                    command.to_string(),
                    err.to_string(),
                ))
            }
            Err(_) => {
                return Err(WatchdogError::transient(
                    command.to_string(),
                    format!("timed out after {}s", self.timeout.as_secs()),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            return Err(WatchdogError::transient(
                command.to_string(),
                format!("exit status {code}: {stderr}"),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Runs `command`, logging and absorbing any failure.
pub async fn read_stdout(runner: &dyn CommandRunner, command: &CommandSpec) -> Option<String> {
    match runner.run(command).await {
        Ok(stdout) => Some(stdout),
        Err(err) => {
            log::warn!("Command failed: {err}");
            None
        }
    }
}
