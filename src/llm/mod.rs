//! LLM Provider module: wire-level types, the OpenAI-compatible blocking
//! provider, the tool catalogue registry, and loop detection.

pub mod loop_detector;
pub mod openai;
pub mod provider;
pub mod registry;

pub use loop_detector::{LoopAction, LoopDetection, LoopDetector, LoopDetectorConfig, LoopType};
pub use openai::OpenAIProvider;
pub use provider::*;
pub use registry::ToolRegistry;
