//! `exec_cmd` — run a shell command and capture its combined output.
//!
//! Runs through a real shell (`sh -c` / PowerShell on Windows) so pipes and
//! redirects work; consequently shell meta-characters are not neutralised by
//! the command allowlist, which only inspects the first token
//! (`Constraints::validate_command`, run by the registry before this is
//! reached). Defend by choosing a read-only allowlist.

use super::{BoxFuture, ToolOutput, ToolProvider};
use crate::llm::ToolCall;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

#[derive(Clone)]
pub struct ExecCmdTool {
    timeout_secs: u64,
    working_dir: Option<std::path::PathBuf>,
}

impl ExecCmdTool {
    pub fn new() -> Self {
        Self {
            timeout_secs: 30,
            working_dir: None,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_working_dir(mut self, dir: std::path::PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    fn combine_output(stdout: &str, stderr: &str) -> String {
        if stderr.is_empty() {
            stdout.to_string()
        } else {
            format!("{}\n[stderr]\n{}", stdout, stderr)
        }
    }

    /// Run `command` with `timeout_sec` (already clamped by
    /// `Constraints::effective_timeout`), overriding the tool's own default.
    pub async fn run(&self, command: &str, timeout_sec: u64) -> Result<ToolOutput, ToolOutput> {
        self.run_in(command, timeout_sec, self.working_dir.as_deref()).await
    }

    /// Same as `run`, but `cwd` overrides the tool's configured
    /// `working_dir` for this one call - used by the Tool Runner, which
    /// injects the active `Constraints::allowed_root` per call rather than
    /// baking it into the tool at registration time.
    async fn run_in(
        &self,
        command: &str,
        timeout_sec: u64,
        cwd: Option<&Path>,
    ) -> Result<ToolOutput, ToolOutput> {
        if command.trim().is_empty() {
            return Err(ToolOutput {
                content: "command cannot be empty".to_string(),
                exit_code: None,
            });
        }

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("powershell");
            c.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| ToolOutput {
            content: format!("failed to spawn command: {}", e),
            exit_code: None,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| ToolOutput {
            content: "failed to capture stdout".to_string(),
            exit_code: None,
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ToolOutput {
            content: "failed to capture stderr".to_string(),
            exit_code: None,
        })?;

        let stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut reader = tokio::io::BufReader::new(stdout);
            reader.read_to_end(&mut buf).await.map(|_| buf)
        });
        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut reader = tokio::io::BufReader::new(stderr);
            reader.read_to_end(&mut buf).await.map(|_| buf)
        });

        let timeout = Duration::from_secs(timeout_sec);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(result) => result.map_err(|e| ToolOutput {
                content: format!("command execution failed: {}", e),
                exit_code: None,
            })?,
            Err(_) => {
                let _ = child.kill().await;
                let _ = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
                return Err(ToolOutput {
                    content: "timeout".to_string(),
                    exit_code: None,
                });
            }
        };

        let stdout_bytes = stdout_handle.await.map_err(|e| ToolOutput {
            content: format!("failed to join stdout reader: {}", e),
            exit_code: None,
        })?;
        let stdout_bytes = stdout_bytes.unwrap_or_default();
        let stderr_bytes = stderr_handle.await.map_err(|e| ToolOutput {
            content: format!("failed to join stderr reader: {}", e),
            exit_code: None,
        })?;
        let stderr_bytes = stderr_bytes.unwrap_or_default();

        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let stderr = String::from_utf8_lossy(&stderr_bytes);
        let combined = Self::combine_output(&stdout, &stderr);
        let exit_code = status.code();

        if status.success() {
            Ok(ToolOutput {
                content: combined,
                exit_code,
            })
        } else {
            Err(ToolOutput {
                content: combined,
                exit_code,
            })
        }
    }
}

impl Default for ExecCmdTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProvider for ExecCmdTool {
    fn name(&self) -> &str {
        "exec_cmd"
    }

    fn brief(&self) -> &str {
        "Run a shell command and return its combined stdout/stderr."
    }

    fn full_description(&self) -> String {
        let os = std::env::consts::OS;
        let (shell_name, rules) = if os == "windows" {
            ("PowerShell", "Commands run under PowerShell.")
        } else {
            ("sh", "Commands run under sh -c (supports pipes, redirects).")
        };
        format!(
            "Execute a shell command and return its output.\n{}\nCurrent OS: {}\nShell: {}",
            rules, os, shell_name
        )
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute."
                },
                "timeout": {
                    "type": "integer",
                    "description": "Optional timeout in seconds, capped by the configured maximum."
                }
            },
            "required": ["command"]
        })
    }

    fn is_command_tool(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<ToolOutput, ToolOutput>> {
        Box::pin(async move {
            let command = call
                .args
                .get("command")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolOutput {
                    content: "missing 'command' argument".to_string(),
                    exit_code: None,
                })?;
            let requested = call.args.get("timeout").and_then(|v| v.as_u64());
            let timeout = requested.unwrap_or(self.timeout_secs).min(self.timeout_secs);
            let cwd = call
                .args
                .get("cwd")
                .and_then(|v| v.as_str())
                .map(Path::new)
                .or(self.working_dir.as_deref());
            self.run_in(command, timeout, cwd).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "t1".to_string(),
            tool_name: "exec_cmd".to_string(),
            args,
        }
    }

    #[tokio::test]
    async fn test_simple_command() {
        let tool = ExecCmdTool::new();
        let result = tool.run("echo hello", 5).await;
        assert!(result.is_ok());
        assert!(result.unwrap().content.contains("hello"));
    }

    #[tokio::test]
    async fn test_command_with_error() {
        let tool = ExecCmdTool::new();
        let result = tool.run("exit 1", 5).await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_timeout() {
        let tool = ExecCmdTool::new();
        let result = tool.run("sleep 10", 1).await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.content, "timeout");
        assert!(err.exit_code.is_none());
    }

    #[tokio::test]
    async fn test_via_tool_call() {
        let tool = ExecCmdTool::new();
        let result = tool.execute(&call(json!({"command": "echo hi"}))).await;
        assert!(result.is_ok());
        assert!(result.unwrap().content.contains("hi"));
    }

    #[tokio::test]
    async fn test_missing_command_arg() {
        let tool = ExecCmdTool::new();
        let result = tool.execute(&call(json!({}))).await;
        assert!(result.is_err());
    }
}
