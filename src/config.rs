//! Single JSON configuration document, loaded once at startup and treated
//! as immutable for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub vllm: VllmConfig,
    pub workspace: WorkspaceConfig,
    pub security: SecurityConfig,
    pub memory: MemoryConfig,
    pub audit: AuditConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VllmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub enable_function_calling: bool,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub allowed_commands: HashSet<String>,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,
    #[serde(default = "default_true")]
    pub exec_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub log_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_loops")]
    pub max_loops: u32,
    #[serde(default = "default_loop_wait_sec")]
    pub loop_wait_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub components: std::collections::HashMap<String, bool>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_timeout_sec() -> u64 {
    30
}
fn default_max_output_size() -> usize {
    10_000
}
fn default_true() -> bool {
    true
}
fn default_max_loops() -> u32 {
    5
}
fn default_loop_wait_sec() -> f64 {
    0.5
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::error::AgentError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| crate::error::AgentError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| crate::error::AgentError::Config(format!("invalid config JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "vllm": {"base_url": "http://localhost:8000/v1", "model": "local-model"},
                "workspace": {"dir": "./ws"},
                "security": {},
                "memory": {"path": "memory.json"},
                "audit": {"log_path": "audit.jsonl"},
                "agent": {}
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.vllm.model, "local-model");
        assert_eq!(config.agent.max_loops, 5);
        assert_eq!(config.security.timeout_sec, 30);
        assert!(!config.debug.enabled);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = Config::load("/nonexistent/path/config.json");
        assert!(result.is_err());
    }
}
