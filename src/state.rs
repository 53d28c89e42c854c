//! Per-conversation scratchpad. Owned by one invocation of the loop
//! controller and discarded when that invocation returns - never shared
//! across requests, never persisted.

use crate::llm::ToolResult;
use crate::planner::PlannerOutput;
use crate::responder::ResponderOutput;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct LoopRecord {
    pub loop_id: u32,
    pub planner_output: PlannerOutput,
    pub tool_results: Vec<ToolResult>,
    pub responder_output: Option<ResponderOutput>,
}

#[derive(Debug, Clone, Default)]
pub struct State {
    pub loop_count: u32,
    pub history: Vec<LoopRecord>,
    pub facts: Vec<String>,
    pub remaining_tasks: Vec<String>,
    pub last_tool_results: HashMap<String, ToolResult>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge Planner-reported deltas, deduplicating by exact string match
    /// and preserving insertion order.
    pub fn apply_deltas(&mut self, new_facts: &[String], resolved_tasks: &[String], added_tasks: &[String]) {
        for fact in new_facts {
            if !self.facts.contains(fact) {
                self.facts.push(fact.clone());
            }
        }
        self.remaining_tasks.retain(|t| !resolved_tasks.contains(t));
        for task in added_tasks {
            if !self.remaining_tasks.contains(task) {
                self.remaining_tasks.push(task.clone());
            }
        }
    }

    pub fn record_loop(&mut self, record: LoopRecord) {
        for result in &record.tool_results {
            self.last_tool_results
                .insert(result.tool_name.clone(), result.clone());
        }
        self.history.push(record);
        self.loop_count += 1;
        debug_assert_eq!(self.loop_count as usize, self.history.len());
    }

    /// Summaries of prior loops for the Planner prompt: tool name, args,
    /// truncated output (<=500 chars), and the Responder's chosen next
    /// action - never the full tool output, to bound prompt growth.
    pub fn render_transcript(&self) -> String {
        self.history
            .iter()
            .map(|record| {
                let tool_summaries: Vec<String> = record
                    .tool_results
                    .iter()
                    .map(|r| {
                        let mut output = r.output.clone();
                        if output.len() > 500 {
                            let cut = crate::constraints::floor_char_boundary(&output, 500);
                            output.truncate(cut);
                        }
                        format!("{}({})={}", r.tool_name, r.args_echo, output)
                    })
                    .collect();
                format!(
                    "loop {}: reason=\"{}\" tools=[{}] next_action=\"{}\"",
                    record.loop_id,
                    record.planner_output.reason_brief,
                    tool_summaries.join(", "),
                    record
                        .responder_output
                        .as_ref()
                        .map(|r| r.next_action.as_str())
                        .unwrap_or(""),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_deltas_dedupes_facts() {
        let mut state = State::new();
        state.apply_deltas(&["a".to_string()], &[], &[]);
        state.apply_deltas(&["a".to_string(), "b".to_string()], &[], &[]);
        assert_eq!(state.facts, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_apply_deltas_resolves_tasks() {
        let mut state = State::new();
        state.apply_deltas(&[], &[], &["do_x".to_string(), "do_y".to_string()]);
        state.apply_deltas(&[], &["do_x".to_string()], &[]);
        assert_eq!(state.remaining_tasks, vec!["do_y".to_string()]);
    }

    #[test]
    fn test_record_loop_keeps_count_in_sync_with_history() {
        let mut state = State::new();
        let record = LoopRecord {
            loop_id: 1,
            planner_output: PlannerOutput {
                need_tools: false,
                tool_calls: vec![],
                reason_brief: "done".to_string(),
                stop_condition: String::new(),
                new_facts: vec![],
                resolved_tasks: vec![],
                added_tasks: vec![],
            },
            tool_results: vec![],
            responder_output: None,
        };
        state.record_loop(record);
        assert_eq!(state.loop_count as usize, state.history.len());
    }

    #[test]
    fn test_render_transcript_truncates_without_panicking_on_multibyte_boundary() {
        let mut state = State::new();
        // A multi-byte character straddling byte 500 used to panic `String::truncate`.
        let mut output = "a".repeat(499);
        output.push('€');
        output.push_str(&"b".repeat(100));

        let record = LoopRecord {
            loop_id: 1,
            planner_output: PlannerOutput {
                need_tools: true,
                tool_calls: vec![],
                reason_brief: "reading".to_string(),
                stop_condition: String::new(),
                new_facts: vec![],
                resolved_tasks: vec![],
                added_tasks: vec![],
            },
            tool_results: vec![ToolResult {
                tool_name: "read_file".to_string(),
                args_echo: serde_json::json!({}),
                success: true,
                output,
                error: String::new(),
                exit_code: None,
                duration_sec: 0.0,
                output_length: 600,
            }],
            responder_output: None,
        };
        state.record_loop(record);

        let transcript = state.render_transcript();
        assert!(transcript.contains("read_file"));
    }
}
