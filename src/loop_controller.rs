//! Ties the Planner, Tool Runner, and Responder into the
//! `INIT -> PLAN -> EXEC -> RESPOND -> [stop?] -> DONE` state machine that
//! drives one request to completion.
//!
//! Termination is checked in a fixed order after every loop: a Responder
//! final answer wins first, then a Planner that asked for no tools, then
//! loop-detection, then the hard `max_loops` ceiling. Nothing here retries
//! the LLM itself - that already happened once inside
//! [`crate::llm::complete_with_retry`]; a second transport failure here is
//! fatal and aborts the run.

use crate::audit::AuditLog;
use crate::constraints::Constraints;
use crate::error::AgentError;
use crate::llm::{LLMProvider, ProviderError, ToolRegistry};
use crate::memory::Memory;
use crate::planner::Planner;
use crate::responder::Responder;
use crate::state::{LoopRecord, State};
use crate::tool_runner::ToolRunner;
use std::sync::Arc;
use std::time::Duration;

pub struct LoopController {
    planner: Planner,
    responder: Responder,
    registry: Arc<ToolRegistry>,
    constraints: Constraints,
    audit: Arc<AuditLog>,
    memory: Arc<Memory>,
    max_loops: u32,
    loop_wait_sec: f64,
}

impl LoopController {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        constraints: Constraints,
        audit: Arc<AuditLog>,
        memory: Arc<Memory>,
        temperature: f32,
        max_tokens: u32,
        enable_function_calling: bool,
        max_loops: u32,
        loop_wait_sec: f64,
    ) -> Self {
        Self {
            planner: Planner::new(
                provider.clone(),
                registry.clone(),
                temperature,
                max_tokens,
                enable_function_calling,
            ),
            responder: Responder::new(provider, temperature, max_tokens),
            registry,
            constraints,
            audit,
            memory,
            max_loops,
            loop_wait_sec,
        }
    }

    /// Drive one request through the loop until a final answer, a detected
    /// stall, or `max_loops` is reached. Never panics on provider failure -
    /// a second consecutive transport failure is surfaced as
    /// [`AgentError::TransportExhausted`].
    pub async fn run(&self, request: &str) -> Result<String, AgentError> {
        let mut state = State::new();

        loop {
            let loop_id = state.loop_count + 1;
            let memory_rendered = self.memory.render();

            let planner_output = self
                .planner
                .plan(request, &memory_rendered, &state, loop_id)
                .await
                .map_err(transport_exhausted)?;

            state.apply_deltas(
                &planner_output.new_facts,
                &planner_output.resolved_tasks,
                &planner_output.added_tasks,
            );

            let tool_results = if planner_output.need_tools {
                let runner = ToolRunner::new(&self.registry, &self.constraints, &self.audit);
                runner.execute_batch(&planner_output.tool_calls, loop_id).await
            } else {
                Vec::new()
            };

            let stop_condition = planner_output.stop_condition.clone();
            let need_tools = planner_output.need_tools;

            let responder_output = if stop_condition == "loop_detected" {
                // The Planner already explained the stall in `reason_brief`;
                // no need to spend another LLM call asking the Responder to
                // restate it.
                crate::responder::ResponderOutput {
                    response: planner_output.reason_brief.clone(),
                    summary: planner_output.reason_brief.clone(),
                    next_action: String::new(),
                    is_final_answer: true,
                }
            } else {
                self.responder
                    .respond(request, &tool_results, &memory_rendered, &state, loop_id)
                    .await
                    .map_err(transport_exhausted)?
            };

            let final_answer = responder_output.is_final_answer;
            let response = responder_output.response.clone();

            state.record_loop(LoopRecord {
                loop_id,
                planner_output,
                tool_results,
                responder_output: Some(responder_output),
            });

            if final_answer {
                return Ok(response);
            }

            if !need_tools {
                return Ok(response);
            }

            if stop_condition == "loop_detected" {
                return Ok(response);
            }

            if state.loop_count >= self.max_loops {
                let limit_output = self
                    .responder
                    .respond_limit_reached(&state, &self.audit.path().display().to_string())
                    .await
                    .map_err(transport_exhausted)?;
                return Ok(limit_output.response);
            }

            tokio::time::sleep(Duration::from_secs_f64(self.loop_wait_sec)).await;
        }
    }
}

fn transport_exhausted(err: ProviderError) -> AgentError {
    AgentError::TransportExhausted {
        status: "retry-exhausted".to_string(),
        body_prefix: err.to_string().chars().take(200).collect(),
    }
}
