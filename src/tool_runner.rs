//! Tool Runner: executes tool calls under the security envelope and emits
//! one audit entry per call. Nothing here ever aborts the loop - every
//! failure becomes a `ToolResult { success: false, .. }` and flows back to
//! the Responder (§4.2, §7).

use crate::audit::AuditEntry;
use crate::audit::AuditLog;
use crate::constraints::{truncate_output, Constraints};
use crate::llm::{ToolCall, ToolRegistry, ToolResult};
use crate::tools::ToolOutput;
use chrono::Utc;
use std::time::Instant;

pub struct ToolRunner<'a> {
    registry: &'a ToolRegistry,
    constraints: &'a Constraints,
    audit: &'a AuditLog,
}

impl<'a> ToolRunner<'a> {
    pub fn new(registry: &'a ToolRegistry, constraints: &'a Constraints, audit: &'a AuditLog) -> Self {
        Self {
            registry,
            constraints,
            audit,
        }
    }

    /// Tool calls inside one Planner batch execute sequentially, in the
    /// order emitted, so the Responder observes a deterministic sequence
    /// and the audit log stays in strict execution order.
    pub async fn execute_batch(&self, calls: &[ToolCall], loop_id: u32) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call, loop_id).await);
        }
        results
    }

    pub async fn execute(&self, call: &ToolCall, loop_id: u32) -> ToolResult {
        let start = Instant::now();

        let result = match self.run_validated(call).await {
            Ok(output) => self.finish(call, Ok(output), start),
            Err(output) => self.finish(call, Err(output), start),
        };

        self.emit_audit(loop_id, &result);
        result
    }

    async fn run_validated(&self, call: &ToolCall) -> Result<ToolOutput, ToolOutput> {
        let tool = self.registry.get(&call.tool_name).ok_or_else(|| {
            ToolOutput::err(format!("unknown tool: {}", call.tool_name))
        })?;

        let mut effective_call = call.clone();

        // Rewrite every path argument to the resolved, confined path before
        // the tool ever touches the filesystem - the tool must not see the
        // Planner's raw string, or a relative path resolves against this
        // process's own cwd instead of `allowed_root`.
        for path_arg in tool.path_args() {
            let value = effective_call
                .args
                .get(*path_arg)
                .and_then(|v| v.as_str())
                .map(str::to_string);
            if let Some(value) = value {
                let (ok, reason, resolved) = self.constraints.validate_path(&value);
                if !ok {
                    return Err(ToolOutput::err(reason));
                }
                if let Some(obj) = effective_call.args.as_object_mut() {
                    obj.insert(
                        (*path_arg).to_string(),
                        serde_json::json!(resolved.to_string_lossy().into_owned()),
                    );
                }
            }
        }

        if tool.is_command_tool() {
            if !self.constraints.exec_enabled {
                return Err(ToolOutput::err("exec_cmd disabled by configuration".to_string()));
            }
            if let Some(command) = effective_call.args.get("command").and_then(|v| v.as_str()) {
                let (ok, reason) = self.constraints.validate_command(command);
                if !ok {
                    return Err(ToolOutput::err(reason));
                }
            }
        }

        let requested_timeout = effective_call.args.get("timeout").and_then(|v| v.as_u64());
        let effective_timeout = self.constraints.effective_timeout(requested_timeout);
        if let Some(obj) = effective_call.args.as_object_mut() {
            obj.insert("timeout".to_string(), serde_json::json!(effective_timeout));

            // `exec_cmd` has no path argument to rewrite, but still needs to
            // be confined to the workspace root (spec §4.2: "cwd = allowed_root").
            if tool.is_command_tool() {
                obj.insert(
                    "cwd".to_string(),
                    serde_json::json!(self.constraints.allowed_root.to_string_lossy().into_owned()),
                );
            }
        }

        tool.execute(&effective_call).await
    }

    fn finish(
        &self,
        call: &ToolCall,
        outcome: Result<ToolOutput, ToolOutput>,
        start: Instant,
    ) -> ToolResult {
        let duration_sec = start.elapsed().as_secs_f64();

        let (success, content, exit_code, error) = match outcome {
            Ok(out) => (true, out.content, out.exit_code, String::new()),
            Err(out) => {
                let error = match (out.content.as_str(), out.exit_code) {
                    ("timeout", None) => "timeout".to_string(),
                    (_, Some(code)) => format!("command exited with status {}", code),
                    (content, None) => content.to_string(),
                };
                (false, out.content, out.exit_code, error)
            }
        };

        let output_length = content.len();
        let output = truncate_output(&content, self.constraints.max_output_size);

        ToolResult {
            tool_name: call.tool_name.clone(),
            args_echo: call.args.clone(),
            success,
            output,
            error,
            exit_code,
            duration_sec,
            output_length,
        }
    }

    fn emit_audit(&self, loop_id: u32, result: &ToolResult) {
        let entry = AuditEntry::from_tool_result(loop_id, result, Utc::now().to_rfc3339());
        if let Err(e) = self.audit.append(&entry) {
            crate::applog::log(format!("failed to write audit entry: {}", e));
        }
    }
}
