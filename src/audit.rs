//! Append-only audit trail of every tool invocation. Unlike
//! [`crate::applog`]'s bounded ring buffer, this log never truncates or
//! drops entries - it is the authoritative record the limit-reached
//! synthesis points users at.

use crate::error::AuditError;
use crate::llm::ToolResult;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub loop_id: u32,
    pub tool_name: String,
    pub args: serde_json::Value,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub duration_sec: f64,
    pub output_length: usize,
}

impl AuditEntry {
    pub fn from_tool_result(loop_id: u32, result: &ToolResult, timestamp: String) -> Self {
        Self {
            timestamp,
            loop_id,
            tool_name: result.tool_name.clone(),
            args: result.args_echo.clone(),
            success: result.success,
            exit_code: result.exit_code,
            duration_sec: result.duration_sec,
            output_length: result.output_length,
        }
    }
}

/// Process-wide singleton; one writer at a time via an internal lock so a
/// full JSON Lines entry is never interleaved with another writer's.
pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let line = serde_json::to_string(entry)?;

        let _guard = self.lock.lock().expect("audit log lock poisoned");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| AuditError::Append {
                    path: self.path.display().to_string(),
                    source: e,
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::Append {
                path: self.path.display().to_string(),
                source: e,
            })?;

        writeln!(file, "{}", line).map_err(|e| AuditError::Append {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Read back every entry, in append order. Used by tests and by the
    /// limit-reached synthesis to confirm the log path is reachable.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AuditError::Append {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        content
            .lines()
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(loop_id: u32) -> AuditEntry {
        AuditEntry {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            loop_id,
            tool_name: "read_file".to_string(),
            args: serde_json::json!({"path": "hello.txt"}),
            success: true,
            exit_code: None,
            duration_sec: 0.01,
            output_length: 3,
        }
    }

    #[test]
    fn test_append_then_read_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.jsonl"));

        log.append(&sample_entry(1)).unwrap();
        log.append(&sample_entry(2)).unwrap();
        log.append(&sample_entry(3)).unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].loop_id, 1);
        assert_eq!(entries[2].loop_id, 3);
    }

    #[test]
    fn test_read_all_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("nope.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_each_line_is_independently_parseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::new(&path);
        log.append(&sample_entry(1)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let line = content.lines().next().unwrap();
        let parsed: AuditEntry = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.tool_name, "read_file");
    }
}
