//! Provider-facing types: the wire-level request/response shapes and the
//! [`LLMProvider`] trait itself.
//!
//! The core issues exactly two blocking HTTP calls per loop iteration (one
//! from the Planner, one from the Responder) against an OpenAI-compatible
//! `/chat/completions` endpoint. There is no streaming and no persistent
//! chat-loop handle: each call is a self-contained request/response pair.

use serde::{Deserialize, Serialize};

/// Request/response wrapper over the Chat Completions endpoint.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Issue one blocking chat completion call.
    ///
    /// `tools` is `None` when the caller does not want the structured-tool
    /// channel at all; implementations must omit the `tools` key from the
    /// wire request in that case rather than sending an empty array.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Issue `request` against `provider`, retrying exactly once with the same
/// payload on failure. A second failure is returned to the caller, which
/// the loop controller treats as fatal (§7: LLM transport failure).
pub async fn complete_with_retry(
    provider: &dyn LLMProvider,
    request: ChatRequest,
) -> Result<ChatResponse, ProviderError> {
    match provider.complete(request.clone()).await {
        Ok(response) => Ok(response),
        Err(_) => provider.complete(request).await,
    }
}

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools: Option<Vec<Tool>>,
}

// ============================================================================
// Message Types
// ============================================================================

/// Message role in conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message in conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Tool call ID (for tool-result messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls made by the assistant, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

/// A tool call requested by the LLM: one of the six registered primitives
/// with its argument mapping. `id` correlates structured OpenAI tool calls
/// with their eventual result message; the textual fallback protocol
/// synthesises a local id when none is present on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub args: serde_json::Value,
}

// ============================================================================
// Tool Definition and Results
// ============================================================================

/// Tool definition for function calling. The brief `description` is what is
/// sent over the wire to the LLM; `full_description`, when set, is used only
/// for the textual system-prompt rendering so the catalogue stays the single
/// source of truth for both channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,

    #[serde(skip_serializing, default)]
    pub full_description: Option<String>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        brief: impl Into<String>,
        full_description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: brief.into(),
            parameters,
            full_description: Some(full_description.into()),
        }
    }

    pub fn get_full_description(&self) -> &str {
        self.full_description
            .as_deref()
            .unwrap_or(&self.description)
    }

    /// Strip `full_description` for sending over the wire.
    pub fn as_brief(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            full_description: None,
        }
    }
}

/// Outcome of executing one `ToolCall` through the Tool Runner.
///
/// Invariant: when `success` is false, at least one of `error` or a nonzero
/// `exit_code` is populated. `output` has already been run through
/// `crate::constraints::truncate_output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub args_echo: serde_json::Value,
    pub success: bool,
    pub output: String,
    pub error: String,
    pub exit_code: Option<i32>,
    pub duration_sec: f64,
    pub output_length: usize,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// Token usage statistics for one request.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Reason why generation finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

// ============================================================================
// Error Types
// ============================================================================

/// Provider error types.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Tool calling not supported")]
    ToolCallingNotSupported,

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}
