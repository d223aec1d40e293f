//! Visual regeneration through a user-supplied shell command.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;
use vv_core::{RegenerationError, Visuals};
use vv_view::{VisualsSource, parse_visuals};

/// Runs `sh -c <command>` with the code context on stdin and parses the
/// visuals payload it prints.
#[derive(Debug, Clone)]
pub struct CommandVisualsSource {
    command: Option<String>,
    timeout: Duration,
}

impl CommandVisualsSource {
    pub fn new(command: Option<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

fn failed(message: impl Into<String>) -> RegenerationError {
    RegenerationError::Failed {
        message: message.into(),
    }
}

#[async_trait]
impl VisualsSource for CommandVisualsSource {
    async fn regenerate_visuals(&self, code_context: &str) -> Result<Visuals, RegenerationError> {
        let Some(command) = &self.command else {
            return Err(failed("no regeneration command configured"));
        };
        debug!(command = %command, "running regeneration command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| failed(format!("failed to run `{command}`: {err}")))?;

        // The write runs alongside the wait: a command may fill its stdout
        // before it drains stdin, or never read stdin at all.
        let stdin = child.stdin.take();
        let send = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(code_context.as_bytes()).await {
                // Commands that ignore their input may exit before reading it.
                Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
                result => result,
            }
        };
        let run = async { tokio::join!(send, child.wait_with_output()) };

        let (sent, output) = timeout(self.timeout, run)
            .await
            .map_err(|_| failed(format!("`{command}` timed out")))?;
        let output = output.map_err(|err| failed(format!("`{command}` failed: {err}")))?;
        if let Err(err) = sent {
            return Err(failed(format!("failed to send code to `{command}`: {err}")));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().map(str::trim).find(|line| !line.is_empty());
            return Err(failed(match reason {
                Some(reason) => format!("`{command}` exited with {}: {reason}", output.status),
                None => format!("`{command}` exited with {}", output.status),
            }));
        }

        parse_visuals(&String::from_utf8_lossy(&output.stdout))
    }
}
