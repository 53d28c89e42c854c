//! Crate-wide error type. Component-specific errors (`ProviderError`, IO
//! failures) convert into this via `#[from]`; the loop controller is the
//! only place that should ever see one directly, since every recoverable
//! failure is captured as a `ToolResult` or `PlannerOutput` before it gets
//! this far (§7 of the control-loop design).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM provider error: {0}")]
    Provider(#[from] crate::llm::ProviderError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("LLM transport failed after retry: status {status}, body: {body_prefix}")]
    TransportExhausted { status: String, body_prefix: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("failed to read memory file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write memory file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse memory file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to append audit entry to {path}: {source}")]
    Append {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),
}
