//! Crate-level integration tests exercising the Loop Controller against a
//! deterministic scripted provider — no network, no real LLM endpoint.
//! Covers the literal end-to-end scenarios of the control-loop design.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vllm_agent_core::audit::AuditLog;
use vllm_agent_core::constraints::Constraints;
use vllm_agent_core::llm::{ChatRequest, ChatResponse, FinishReason, LLMProvider, Message, ProviderError, TokenUsage, ToolRegistry};
use vllm_agent_core::memory::Memory;
use vllm_agent_core::loop_controller::LoopController;

/// Returns one scripted reply per call, in order; repeats the last one once
/// exhausted so a controller that calls more times than scripted doesn't panic.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let replies = self.replies.lock().unwrap();
        let content = replies.get(idx).cloned().unwrap_or_else(|| replies.last().cloned().unwrap_or_default());
        Ok(ChatResponse {
            message: Message::assistant(content),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
        })
    }
}

fn build_controller(
    provider: Arc<dyn LLMProvider>,
    root: &std::path::Path,
    allowed_commands: HashSet<String>,
    timeout_sec: u64,
    max_output_size: usize,
    max_loops: u32,
) -> LoopController {
    let registry = Arc::new(ToolRegistry::new().register_all_builtin());
    let constraints = Constraints::new(root, allowed_commands, timeout_sec, max_output_size, true);
    let audit = Arc::new(AuditLog::new(root.join("audit.jsonl")));
    let memory = Arc::new(Memory::load(root.join("memory.json")).unwrap());
    LoopController::new(provider, registry, constraints, audit, memory, 0.7, 4096, false, max_loops, 0.0)
}

#[tokio::test]
async fn scenario_single_read() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hi\n").unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"need_tools": true, "tool_calls": [{"name": "read_file", "args": {"path": "hello.txt"}}], "reason_brief": "reading file", "stop_condition": ""}"#,
        r#"The file contains: hi {"is_final_answer": true}"#,
    ]));

    let controller = build_controller(provider, dir.path(), HashSet::new(), 30, 10_000, 5);
    let response = controller.run("Show the contents of hello.txt").await.unwrap();
    assert!(response.contains("hi"));

    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let entries = audit.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].tool_name, "read_file");
    assert!(entries[0].success);
}

#[tokio::test]
async fn scenario_path_traversal_blocked() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hi\n").unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"need_tools": true, "tool_calls": [{"name": "read_file", "args": {"path": "../../etc/passwd"}}], "reason_brief": "reading", "stop_condition": ""}"#,
        r#"That path is outside the allowed workspace. {"is_final_answer": true}"#,
    ]));

    let controller = build_controller(provider, dir.path(), HashSet::new(), 30, 10_000, 5);
    let response = controller.run("Read ../../etc/passwd").await.unwrap();
    assert!(response.contains("outside"));

    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let entries = audit.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
}

#[tokio::test]
async fn scenario_command_not_allowed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("temp.log"), "scratch\n").unwrap();

    let mut allow = HashSet::new();
    allow.insert("ls".to_string());
    allow.insert("cat".to_string());

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"need_tools": true, "tool_calls": [{"name": "exec_cmd", "args": {"command": "rm temp.log"}}], "reason_brief": "deleting", "stop_condition": ""}"#,
        r#"I can't run that command. {"is_final_answer": true}"#,
    ]));

    let controller = build_controller(provider, dir.path(), allow, 30, 10_000, 5);
    controller.run("Delete temp.log").await.unwrap();

    assert!(dir.path().join("temp.log").exists());

    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let entries = audit.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
}

#[tokio::test]
async fn scenario_timeout() {
    let dir = tempfile::tempdir().unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"need_tools": true, "tool_calls": [{"name": "exec_cmd", "args": {"command": "sleep 10"}}], "reason_brief": "sleeping", "stop_condition": ""}"#,
        r#"That command timed out. {"is_final_answer": true}"#,
    ]));

    let controller = build_controller(provider, dir.path(), HashSet::new(), 2, 10_000, 5);
    controller.run("run a slow command").await.unwrap();

    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let entries = audit.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
    assert!(entries[0].duration_sec >= 2.0 && entries[0].duration_sec < 4.0);
}

#[tokio::test]
async fn scenario_output_truncation() {
    let dir = tempfile::tempdir().unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"need_tools": true, "tool_calls": [{"name": "exec_cmd", "args": {"command": "yes x | head -c 10000"}}], "reason_brief": "printing", "stop_condition": ""}"#,
        r#"Here is the (truncated) output. {"is_final_answer": true}"#,
    ]));

    let controller = build_controller(provider, dir.path(), HashSet::new(), 30, 1000, 5);
    controller.run("print a lot of text").await.unwrap();

    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let entries = audit.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].success);
    assert_eq!(entries[0].output_length, 10_000);
}

#[tokio::test]
async fn scenario_loop_limit() {
    let dir = tempfile::tempdir().unwrap();

    let looping_plan = r#"{"need_tools": true, "tool_calls": [{"name": "list_dir", "args": {"path": "."}}], "reason_brief": "listing again", "stop_condition": ""}"#;
    let not_final = "Still gathering information.";

    let provider = Arc::new(ScriptedProvider::new(vec![
        looping_plan,
        not_final,
        looping_plan,
        not_final,
        looping_plan,
        not_final,
        "Limit reached. Facts gathered so far, remaining tasks listed, see the audit log.",
    ]));

    let controller = build_controller(provider, dir.path(), HashSet::new(), 30, 10_000, 3);
    let response = controller.run("keep exploring").await.unwrap();
    assert!(response.contains("Limit reached"));

    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let entries = audit.read_all().unwrap();
    assert_eq!(entries.len(), 3);
}
