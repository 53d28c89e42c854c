//! `grep` — recursive substring or regex search over a directory tree.
//!
//! Walks with `ignore::WalkBuilder` so `.gitignore`/`.ignore` rules are
//! honoured the same way a developer's own search would; binary files are
//! skipped on first invalid-UTF-8 read rather than reported as errors.

use super::{BoxFuture, ToolOutput, ToolProvider};
use crate::llm::ToolCall;
use ignore::WalkBuilder;
use regex::Regex;
use serde_json::json;

#[derive(Clone, Default)]
pub struct GrepTool;

impl GrepTool {
    pub fn new() -> Self {
        Self
    }

    /// Try the pattern as a regex first; fall back to literal substring
    /// matching if it doesn't parse as one.
    fn matcher(pattern: &str) -> Box<dyn Fn(&str) -> bool + Send> {
        match Regex::new(pattern) {
            Ok(re) => Box::new(move |line: &str| re.is_match(line)),
            Err(_) => {
                let needle = pattern.to_string();
                Box::new(move |line: &str| line.contains(&needle))
            }
        }
    }
}

impl ToolProvider for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn brief(&self) -> &str {
        "Recursively search files for a substring or regex pattern."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Substring or regex to search for." },
                "path": { "type": "string", "description": "File or directory to search." }
            },
            "required": ["pattern", "path"]
        })
    }

    fn path_args(&self) -> &'static [&'static str] {
        &["path"]
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<ToolOutput, ToolOutput>> {
        Box::pin(async move {
            let pattern = call
                .args
                .get("pattern")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolOutput::err("missing 'pattern' argument"))?;
            let path = call
                .args
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolOutput::err("missing 'path' argument"))?;

            let is_match = Self::matcher(pattern);
            let mut matches = Vec::new();

            for entry in WalkBuilder::new(path).hidden(false).build() {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => continue,
                };
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let content = match std::fs::read_to_string(entry.path()) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                let display = entry.path().display().to_string();
                for (idx, line) in content.lines().enumerate() {
                    if is_match(line) {
                        matches.push(format!("{}:{}:{}", display, idx + 1, line));
                    }
                }
            }

            Ok(ToolOutput::ok(matches.join("\n")))
        })
    }
}
