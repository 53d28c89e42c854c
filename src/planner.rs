//! First LLM call per loop. Produces a `PlannerOutput` as strict JSON,
//! accepting either the structured `tool_calls` channel or a text response
//! carrying JSON (possibly inside `TOOL_CALL: {...}` markers).

use crate::llm::{
    complete_with_retry, ChatRequest, FinishReason, LLMProvider, LoopAction, LoopDetector,
    Message, ToolCall, ToolRegistry,
};
use crate::parsing::{find_first_json_object, find_tool_call_blocks};
use crate::state::State;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerOutput {
    pub need_tools: bool,
    pub tool_calls: Vec<ToolCall>,
    pub reason_brief: String,
    pub stop_condition: String,
    #[serde(default)]
    pub new_facts: Vec<String>,
    #[serde(default)]
    pub resolved_tasks: Vec<String>,
    #[serde(default)]
    pub added_tasks: Vec<String>,
}

impl PlannerOutput {
    fn parse_failed(raw: impl Into<String>) -> Self {
        Self {
            need_tools: false,
            tool_calls: Vec::new(),
            reason_brief: raw.into(),
            stop_condition: "parse_failed".to_string(),
            new_facts: Vec::new(),
            resolved_tasks: Vec::new(),
            added_tasks: Vec::new(),
        }
    }
}

/// The on-wire JSON shape the Planner asks the LLM for. Distinct from
/// `PlannerOutput` only in that `tool_calls` here uses the textual
/// protocol's `{name, args}` keys rather than `ToolCall`'s `{tool_name, args}`.
#[derive(Debug, Deserialize)]
struct RawPlannerJson {
    need_tools: bool,
    #[serde(default)]
    tool_calls: Vec<RawToolCall>,
    #[serde(default)]
    reason_brief: String,
    #[serde(default)]
    stop_condition: String,
    #[serde(default)]
    new_facts: Vec<String>,
    #[serde(default)]
    resolved_tasks: Vec<String>,
    #[serde(default)]
    added_tasks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

pub struct Planner {
    provider: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    temperature: f32,
    max_tokens: u32,
    enable_function_calling: bool,
    /// Supplemental to `detect_history_loop`: catches oscillating A→B→A→B
    /// patterns the simple history check misses. Lives for the whole
    /// conversation, across every `plan` call.
    loop_detector: Mutex<LoopDetector>,
}

impl Planner {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        temperature: f32,
        max_tokens: u32,
        enable_function_calling: bool,
    ) -> Self {
        Self {
            provider,
            registry,
            temperature,
            max_tokens,
            enable_function_calling,
            loop_detector: Mutex::new(LoopDetector::new()),
        }
    }

    pub async fn plan(
        &self,
        request: &str,
        memory_rendered: &str,
        state: &State,
        loop_id: u32,
    ) -> Result<PlannerOutput, crate::llm::ProviderError> {
        if let Some(stalled) = detect_history_loop(state) {
            return Ok(PlannerOutput {
                need_tools: false,
                tool_calls: Vec::new(),
                reason_brief: stalled,
                stop_condition: "loop_detected".to_string(),
                new_facts: Vec::new(),
                resolved_tasks: Vec::new(),
                added_tasks: Vec::new(),
            });
        }

        let system_prompt = self.build_system_prompt(memory_rendered, state, loop_id);
        let user_message = self.build_user_message(request, state, loop_id);

        let messages = vec![Message::system(system_prompt), Message::user(user_message)];

        let tools = if self.enable_function_calling {
            Some(self.registry.get_tools_for_llm())
        } else {
            None
        };

        let response = complete_with_retry(
            self.provider.as_ref(),
            ChatRequest {
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools,
            },
        )
        .await?;

        let output = if response.finish_reason == FinishReason::ToolCalls {
            if let Some(calls) = &response.message.tool_calls {
                PlannerOutput {
                    need_tools: true,
                    tool_calls: calls.clone(),
                    reason_brief: response.message.content.clone(),
                    stop_condition: String::new(),
                    new_facts: Vec::new(),
                    resolved_tasks: Vec::new(),
                    added_tasks: Vec::new(),
                }
            } else {
                self.parse_text_response(&response.message.content)
            }
        } else {
            self.parse_text_response(&response.message.content)
        };

        let mut output = self.validate(output);
        self.apply_loop_detector(&mut output);
        Ok(output)
    }

    /// Feed every proposed tool call through the oscillating-pattern
    /// detector; a third-strike `Terminate` verdict overrides the output the
    /// same way `detect_history_loop` does, so either mechanism can end the
    /// run.
    fn apply_loop_detector(&self, output: &mut PlannerOutput) {
        if !output.need_tools {
            return;
        }

        let mut detector = self.loop_detector.lock().expect("loop detector lock poisoned");
        for call in &output.tool_calls {
            if let Some(detection) = detector.check(call) {
                if detection.action == LoopAction::Terminate {
                    output.need_tools = false;
                    output.tool_calls.clear();
                    output.stop_condition = "loop_detected".to_string();
                    output.reason_brief = detection.suggestion;
                    return;
                }
            }
        }
    }

    fn parse_text_response(&self, text: &str) -> PlannerOutput {
        if let Some(json_str) = find_first_json_object(text) {
            if let Ok(raw) = serde_json::from_str::<RawPlannerJson>(json_str) {
                return PlannerOutput {
                    need_tools: raw.need_tools,
                    tool_calls: raw
                        .tool_calls
                        .into_iter()
                        .map(|c| ToolCall {
                            id: format!("textual-{}", c.name),
                            tool_name: c.name,
                            args: c.args,
                        })
                        .collect(),
                    reason_brief: raw.reason_brief,
                    stop_condition: raw.stop_condition,
                    new_facts: raw.new_facts,
                    resolved_tasks: raw.resolved_tasks,
                    added_tasks: raw.added_tasks,
                };
            }
        }

        let blocks = find_tool_call_blocks(text);
        if !blocks.is_empty() {
            let tool_calls: Vec<ToolCall> = blocks
                .iter()
                .filter_map(|block| serde_json::from_str::<RawToolCall>(block).ok())
                .map(|c| ToolCall {
                    id: format!("textual-{}", c.name),
                    tool_name: c.name,
                    args: c.args,
                })
                .collect();
            if !tool_calls.is_empty() {
                return PlannerOutput {
                    need_tools: true,
                    tool_calls,
                    reason_brief: String::new(),
                    stop_condition: String::new(),
                    new_facts: Vec::new(),
                    resolved_tasks: Vec::new(),
                    added_tasks: Vec::new(),
                };
            }
        }

        PlannerOutput::parse_failed(text.to_string())
    }

    /// Drop unknown tool names and unknown argument keys.
    fn validate(&self, mut output: PlannerOutput) -> PlannerOutput {
        output.tool_calls.retain_mut(|call| {
            let Some(tool) = self.registry.get(&call.tool_name) else {
                crate::applog::log(format!("planner: dropping unknown tool '{}'", call.tool_name));
                return false;
            };

            if let Some(known_keys) = tool
                .parameters()
                .get("properties")
                .and_then(|p| p.as_object())
                .map(|o| o.keys().cloned().collect::<std::collections::HashSet<_>>())
            {
                if let Some(obj) = call.args.as_object_mut() {
                    obj.retain(|k, _| known_keys.contains(k));
                }
            }
            true
        });

        if output.tool_calls.is_empty() {
            output.need_tools = false;
        }

        output
    }

    fn build_system_prompt(&self, memory_rendered: &str, state: &State, loop_id: u32) -> String {
        format!(
            "You are the planning stage of a tool-using assistant.\n\n\
             Available tools:\n{}\n\n\
             Memory:\n{}\n\n\
             State: loop {}, facts:{:?}, remaining:{:?}\n\n\
             Respond with strict JSON: {{\"need_tools\": bool, \"tool_calls\": [{{\"name\": string, \"args\": object}}], \
             \"reason_brief\": string, \"stop_condition\": string}}.",
            self.registry.render_catalogue(),
            memory_rendered,
            loop_id,
            state.facts,
            state.remaining_tasks,
        )
    }

    fn build_user_message(&self, request: &str, state: &State, loop_id: u32) -> String {
        if loop_id > 1 {
            format!("{}\n\nPrior loop transcript:\n{}", request, state.render_transcript())
        } else {
            request.to_string()
        }
    }
}

/// Inspect `state.history` for an identical `(tool_name, args)` pair
/// repeated three times with the same result, to prevent Planner-driven
/// livelock. Returns a diagnostic message when a stall is found.
fn detect_history_loop(state: &State) -> Option<String> {
    let mut signatures: std::collections::HashMap<(String, String), (usize, String)> =
        std::collections::HashMap::new();

    for record in &state.history {
        for result in &record.tool_results {
            let key = (result.tool_name.clone(), result.args_echo.to_string());
            let entry = signatures
                .entry(key)
                .or_insert((0, result.output.clone()));
            if entry.1 == result.output {
                entry.0 += 1;
            } else {
                entry.1 = result.output.clone();
                entry.0 = 1;
            }
        }
    }

    signatures
        .into_iter()
        .find(|(_, (count, _))| *count >= 3)
        .map(|((tool_name, _), (count, _))| {
            format!(
                "tool '{}' returned an identical result {} times in a row; stopping to avoid livelock",
                tool_name, count
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolResult;
    use crate::state::LoopRecord;

    fn record_with_result(loop_id: u32, output: &str) -> LoopRecord {
        LoopRecord {
            loop_id,
            planner_output: PlannerOutput {
                need_tools: true,
                tool_calls: vec![],
                reason_brief: String::new(),
                stop_condition: String::new(),
                new_facts: vec![],
                resolved_tasks: vec![],
                added_tasks: vec![],
            },
            tool_results: vec![ToolResult {
                tool_name: "read_file".to_string(),
                args_echo: serde_json::json!({"path": "a.txt"}),
                success: true,
                output: output.to_string(),
                error: String::new(),
                exit_code: None,
                duration_sec: 0.01,
                output_length: output.len(),
            }],
            responder_output: None,
        }
    }

    #[test]
    fn test_detect_history_loop_triggers_after_three_identical_results() {
        let mut state = State::new();
        state.history.push(record_with_result(1, "same"));
        state.history.push(record_with_result(2, "same"));
        assert!(detect_history_loop(&state).is_none());
        state.history.push(record_with_result(3, "same"));
        assert!(detect_history_loop(&state).is_some());
    }

    #[test]
    fn test_detect_history_loop_ignores_varying_results() {
        let mut state = State::new();
        state.history.push(record_with_result(1, "a"));
        state.history.push(record_with_result(2, "b"));
        state.history.push(record_with_result(3, "c"));
        assert!(detect_history_loop(&state).is_none());
    }

    struct FixedToolCallProvider;

    #[async_trait::async_trait]
    impl LLMProvider for FixedToolCallProvider {
        async fn complete(
            &self,
            _request: ChatRequest,
        ) -> Result<crate::llm::ChatResponse, crate::llm::ProviderError> {
            Ok(crate::llm::ChatResponse {
                message: Message::assistant(
                    r#"{"need_tools": true, "tool_calls": [{"name": "list_dir", "args": {"path": "."}}], "reason_brief": "listing", "stop_condition": ""}"#,
                ),
                finish_reason: FinishReason::Stop,
                usage: crate::llm::TokenUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_oscillating_tool_calls_eventually_terminate_via_loop_detector() {
        let planner = Planner::new(
            Arc::new(FixedToolCallProvider),
            Arc::new(ToolRegistry::new().register_all_builtin()),
            0.7,
            4096,
            false,
        );

        let state = State::new();
        let mut last = None;
        // The detector warns on its first two detections (calls 4 and 5) and
        // only terminates on the third (call 6) — six identical proposals are
        // needed to reach `LoopAction::Terminate` under the default policy.
        for loop_id in 1..=6 {
            last = Some(planner.plan("do something", "", &state, loop_id).await.unwrap());
        }

        let output = last.unwrap();
        assert!(!output.need_tools);
        assert_eq!(output.stop_condition, "loop_detected");
    }
}
