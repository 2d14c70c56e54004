//! Shell execution tool. One short-lived `sh -c` child per call, workspace
//! cwd, hard timeout, and a denylist for obviously destructive commands.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use burrow_core::ToolResult;

use crate::sandbox::Sandbox;
use crate::tools::AgentTool;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

static DANGER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"rm\s+-rf\s+/",
        r"del\s+/f",
        r"rmdir\s+/s",
        r"format\b",
        r"mkfs\b",
        r"diskpart\b",
        r"dd\s+if=",
        r"shutdown\b",
        r"reboot\b",
        r"poweroff\b",
        r":\(\)\{\s+:\|:&\s+\};:",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

fn is_command_safe(cmd: &str) -> bool {
    !DANGER_PATTERNS.iter().any(|re| re.is_match(cmd))
}

enum RunOutcome {
    Done(std::io::Result<std::process::ExitStatus>),
    Timeout,
    Cancelled,
}

pub struct ExecTool {
    pub sandbox: Sandbox,
}

#[async_trait]
impl AgentTool for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command inside the workspace"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute"},
                "timeout": {"type": "integer", "description": "Timeout in seconds, default 30"}
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let cmd = args.get("command").and_then(Value::as_str).unwrap_or_default();

        if !is_command_safe(cmd) {
            warn!(command = cmd, "rejected dangerous command");
            return ToolResult::error("Error: command rejected due to safety sandbox restrictions.");
        }

        let timeout_secs = match args.get("timeout").and_then(Value::as_u64) {
            Some(t) if t > 0 => t,
            _ => DEFAULT_TIMEOUT_SECS,
        };

        let spawned = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(self.sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Error: {e}\nOutput: ")),
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf: Vec<u8> = Vec::new();
        let mut err_buf: Vec<u8> = Vec::new();

        // The run future borrows the child and the buffers; when the timeout
        // or cancel branch wins, dropping it releases the borrows so the
        // child can be killed while keeping whatever output was captured.
        let outcome = {
            let run = async {
                // Drain both pipes concurrently. Reading them in sequence
                // deadlocks once the unread pipe's buffer fills: the child
                // blocks on the full pipe and the read never reaches EOF.
                let drain_out = async {
                    if let Some(out) = stdout.as_mut() {
                        let _ = out.read_to_end(&mut out_buf).await;
                    }
                };
                let drain_err = async {
                    if let Some(err) = stderr.as_mut() {
                        let _ = err.read_to_end(&mut err_buf).await;
                    }
                };
                tokio::join!(drain_out, drain_err);
                child.wait().await
            };
            tokio::select! {
                _ = cancel.cancelled() => RunOutcome::Cancelled,
                _ = tokio::time::sleep(Duration::from_secs(timeout_secs)) => RunOutcome::Timeout,
                status = run => RunOutcome::Done(status),
            }
        };

        let mut combined = String::from_utf8_lossy(&out_buf).into_owned();
        combined.push_str(&String::from_utf8_lossy(&err_buf));

        match outcome {
            RunOutcome::Timeout => {
                let _ = child.kill().await;
                ToolResult::error(format!(
                    "Timeout after {timeout_secs} seconds.\nOutput: {combined}"
                ))
            }
            RunOutcome::Cancelled => {
                let _ = child.kill().await;
                ToolResult::error(format!("Command cancelled.\nOutput: {combined}"))
            }
            RunOutcome::Done(Err(e)) => ToolResult::error(format!("Error: {e}\nOutput: {combined}")),
            RunOutcome::Done(Ok(status)) => {
                if status.success() {
                    ToolResult::ok(format!("Command exited successfully.\nOutput: {combined}"))
                } else {
                    ToolResult::error(format!("Error: {status}\nOutput: {combined}"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn tool(dir: &std::path::Path) -> ExecTool {
        ExecTool {
            sandbox: Sandbox::new(dir, true),
        }
    }

    #[tokio::test]
    async fn captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .execute(&CancellationToken::new(), &args(json!({"command": "echo hi"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "Command exited successfully.\nOutput: hi\n");
    }

    #[tokio::test]
    async fn runs_in_workspace_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        let result = tool(dir.path())
            .execute(&CancellationToken::new(), &args(json!({"command": "ls"})))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("marker.txt"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_error_with_nonempty_text() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .execute(&CancellationToken::new(), &args(json!({"command": "exit 1"})))
            .await;
        assert!(result.is_error);
        assert!(!result.content.is_empty());
        assert!(result.content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn dangerous_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": "rm -rf / --no-preserve-root"})),
            )
            .await;
        assert!(result.is_error);
        assert_eq!(
            result.content,
            "Error: command rejected due to safety sandbox restrictions."
        );
    }

    #[tokio::test]
    async fn timeout_kills_child_and_returns_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": "echo started; sleep 30", "timeout": 1})),
            )
            .await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Timeout after 1 seconds."));
        assert!(result.content.contains("started"));
    }

    #[tokio::test]
    async fn large_stderr_does_not_stall_the_command() {
        // Writes far more than one pipe buffer to stderr while stdout is
        // still open; must finish promptly rather than hit the timeout.
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": "seq 1 100000 >&2; echo done", "timeout": 10})),
            )
            .await;
        assert!(!result.is_error, "{}", result.content);
        assert!(result.content.starts_with("Command exited successfully."));
        assert!(result.content.contains("done\n"));
        assert!(result.content.contains("100000"));
    }

    #[tokio::test]
    async fn cancellation_stops_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let result = tool(dir.path())
            .execute(&cancel, &args(json!({"command": "sleep 30"})))
            .await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Command cancelled."));
    }

    #[test]
    fn danger_patterns_match_known_bad_commands() {
        assert!(!is_command_safe("sudo shutdown -h now"));
        assert!(!is_command_safe("dd if=/dev/zero of=/dev/sda"));
        assert!(!is_command_safe("mkfs.ext4 /dev/sda1"));
        assert!(is_command_safe("cargo build --release"));
        assert!(is_command_safe("rm -rf target"));
    }
}
