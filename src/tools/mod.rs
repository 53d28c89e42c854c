//! The six tool primitives the agent can invoke: `list_dir`, `read_file`,
//! `write_file`, `edit_file`, `exec_cmd`, `grep`.
//!
//! Each tool implements [`ToolProvider`]; the [`crate::llm::registry::ToolRegistry`]
//! wraps them with the security [`crate::constraints::Constraints`] envelope
//! before anything touches the filesystem or a shell.

pub mod bash;
pub mod edit;
pub mod fs_tools;
pub mod grep;

pub use bash::ExecCmdTool;
pub use edit::EditFileTool;
pub use fs_tools::{ListDirTool, ReadFileTool, WriteFileTool};
pub use grep::GrepTool;

use crate::llm::ToolCall;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of one tool execution, before the Tool Runner wraps it into a
/// `ToolResult`. `exit_code` is only ever `Some` for `exec_cmd`; the other
/// five primitives have no process exit code and leave it `None`.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            exit_code: None,
        }
    }

    pub fn err(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            exit_code: None,
        }
    }
}

/// A tool the Planner can request and the Tool Runner can execute.
///
/// Implementors must not perform their own path/command validation — the
/// registry runs `Constraints::validate_path`/`validate_command` on every
/// call before `execute` is reached, so a tool body can assume its arguments
/// already passed the security envelope.
pub trait ToolProvider: Send + Sync {
    /// Stable name sent to the LLM and matched against `ToolCall.name`.
    fn name(&self) -> &str;

    /// Short description shown when only a brief catalogue is needed.
    fn brief(&self) -> &str;

    /// Full usage description (falls back to `brief()` if not overridden).
    fn full_description(&self) -> String {
        self.brief().to_string()
    }

    /// JSON Schema for `args`.
    fn parameters(&self) -> serde_json::Value;

    /// Path-bearing argument names this tool reads, for the registry to
    /// validate with `Constraints::validate_path` before `execute` runs.
    /// Empty for tools with no path arguments (e.g. `exec_cmd`).
    fn path_args(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether this tool needs `validate_command` run on its `command` arg.
    fn is_command_tool(&self) -> bool {
        false
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<ToolOutput, ToolOutput>>;
}

/// All built-in tools, ready for `ToolRegistry::register_all_builtin`.
pub fn all_tools() -> Vec<std::sync::Arc<dyn ToolProvider>> {
    vec![
        std::sync::Arc::new(ListDirTool::new()),
        std::sync::Arc::new(ReadFileTool::new()),
        std::sync::Arc::new(WriteFileTool::new()),
        std::sync::Arc::new(EditFileTool::new()),
        std::sync::Arc::new(ExecCmdTool::new()),
        std::sync::Arc::new(GrepTool::new()),
    ]
}
