//! Second LLM call per loop. Given tool outputs, produces the natural
//! language reply and flags whether this is the final answer.

use crate::llm::{complete_with_retry, ChatRequest, LLMProvider, Message, ToolResult};
use crate::parsing::find_first_json_object;
use crate::state::State;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ResponderOutput {
    pub response: String,
    pub summary: String,
    pub next_action: String,
    pub is_final_answer: bool,
}

#[derive(Debug, Deserialize)]
struct FinalAnswerMarker {
    is_final_answer: bool,
}

pub struct Responder {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl Responder {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    pub async fn respond(
        &self,
        request: &str,
        tool_results: &[ToolResult],
        memory_rendered: &str,
        state: &State,
        loop_id: u32,
    ) -> Result<ResponderOutput, crate::llm::ProviderError> {
        let system_prompt = Self::system_prompt();
        let user_message = Self::render_user_message(request, tool_results, memory_rendered, state, loop_id);

        let messages = vec![Message::system(system_prompt), Message::user(user_message)];

        let response = complete_with_retry(
            self.provider.as_ref(),
            ChatRequest {
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: None,
            },
        )
        .await?;

        Ok(Self::parse(&response.message.content))
    }

    /// One final call made when `max_loops` is exhausted: summarise what was
    /// achieved, list unresolved tasks, and point at the audit log.
    pub async fn respond_limit_reached(
        &self,
        state: &State,
        audit_log_path: &str,
    ) -> Result<ResponderOutput, crate::llm::ProviderError> {
        let system_prompt = "The loop limit has been reached. Summarise what was achieved, \
             list unresolved tasks, and reference the audit log path. Set is_final_answer to true."
            .to_string();
        let user_message = format!(
            "Facts gathered: {:?}\nRemaining tasks: {:?}\nAudit log: {}",
            state.facts, state.remaining_tasks, audit_log_path
        );

        let response = complete_with_retry(
            self.provider.as_ref(),
            ChatRequest {
                messages: vec![Message::system(system_prompt), Message::user(user_message)],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: None,
            },
        )
        .await?;

        let mut output = Self::parse(&response.message.content);
        output.is_final_answer = true;
        Ok(output)
    }

    fn system_prompt() -> String {
        "Explain what was executed. Summarise the results. Do not invent facts beyond the tool \
         outputs. If the user's goal remains unmet, state the next action. Otherwise, include \
         {\"is_final_answer\": true} in your reply and give the final answer."
            .to_string()
    }

    fn render_user_message(
        request: &str,
        tool_results: &[ToolResult],
        memory_rendered: &str,
        state: &State,
        loop_id: u32,
    ) -> String {
        let rendered_results: Vec<String> = tool_results
            .iter()
            .map(|r| {
                format!(
                    "{}({}) success={} exit_code={:?}: {}",
                    r.tool_name,
                    r.args_echo,
                    r.success,
                    r.exit_code,
                    if r.success { &r.output } else { &r.error }
                )
            })
            .collect();

        format!(
            "Request: {}\nLoop: {}\nMemory:\n{}\nRemaining tasks: {:?}\nTool results:\n{}",
            request,
            loop_id,
            memory_rendered,
            state.remaining_tasks,
            rendered_results.join("\n"),
        )
    }

    fn parse(text: &str) -> ResponderOutput {
        let is_final_answer = find_first_json_object(text)
            .and_then(|json| serde_json::from_str::<FinalAnswerMarker>(json).ok())
            .map(|marker| marker.is_final_answer)
            .unwrap_or(false);

        // When the goal isn't met yet, the Responder's free text is itself
        // the stated next action (per the system prompt's instruction); a
        // final answer has no next action left to describe.
        let next_action = if is_final_answer {
            String::new()
        } else {
            text.trim().to_string()
        };

        ResponderOutput {
            response: text.to_string(),
            summary: text.chars().take(200).collect(),
            next_action,
            is_final_answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detects_final_answer_marker() {
        let text = r#"Here is the answer. {"is_final_answer": true}"#;
        let output = Responder::parse(text);
        assert!(output.is_final_answer);
    }

    #[test]
    fn test_parse_defaults_to_not_final() {
        let text = "I need to check one more file.";
        let output = Responder::parse(text);
        assert!(!output.is_final_answer);
    }

    #[test]
    fn test_parse_carries_next_action_when_not_final() {
        let text = "I need to check one more file.";
        let output = Responder::parse(text);
        assert_eq!(output.next_action, text);
    }

    #[test]
    fn test_parse_clears_next_action_when_final() {
        let text = r#"All done. {"is_final_answer": true}"#;
        let output = Responder::parse(text);
        assert!(output.next_action.is_empty());
    }
}
