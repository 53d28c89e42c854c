//! `edit_file` — single exact-match search-and-replace.
//!
//! No regex, no escape sequences: `oldText` must appear in the file exactly
//! once. Zero occurrences or more than one is rejected rather than guessed
//! at, so the caller is forced to supply enough surrounding context.

use super::{BoxFuture, ToolOutput, ToolProvider};
use crate::llm::ToolCall;
use serde_json::json;

#[derive(Clone, Default)]
pub struct EditFileTool;

impl EditFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolProvider for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn brief(&self) -> &str {
        "Replace one exact occurrence of oldText with newText in a file."
    }

    fn full_description(&self) -> String {
        r#"Edit a file by exact text replacement.

`oldText` must match exactly (whitespace and indentation matter) and must
appear exactly once in the file. Include enough surrounding context to make
the match unique. No regex, no escape sequences - literal text only."#
            .to_string()
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to edit."
                },
                "oldText": {
                    "type": "string",
                    "description": "Exact text to find; must appear exactly once."
                },
                "newText": {
                    "type": "string",
                    "description": "Text to replace it with."
                }
            },
            "required": ["path", "oldText", "newText"]
        })
    }

    fn path_args(&self) -> &'static [&'static str] {
        &["path"]
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<ToolOutput, ToolOutput>> {
        Box::pin(async move {
            let path = call
                .args
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolOutput::err("missing 'path' argument"))?;
            let old_text = call
                .args
                .get("oldText")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolOutput::err("missing 'oldText' argument"))?;
            let new_text = call
                .args
                .get("newText")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolOutput::err("missing 'newText' argument"))?;

            let content = std::fs::read_to_string(path)
                .map_err(|e| ToolOutput::err(format!("failed to read file '{}': {}", path, e)))?;

            let count = content.matches(old_text).count();
            if count == 0 {
                return Err(ToolOutput::err(format!(
                    "oldText not found in '{}':\n{}",
                    path, old_text
                )));
            }
            if count > 1 {
                return Err(ToolOutput::err(format!(
                    "oldText appears {} times in '{}' (must be unique); include more context:\n{}",
                    count, path, old_text
                )));
            }

            let updated = content.replacen(old_text, new_text, 1);
            std::fs::write(path, &updated)
                .map_err(|e| ToolOutput::err(format!("failed to write file '{}': {}", path, e)))?;

            Ok(ToolOutput::ok(format!("applied 1 edit to '{}'", path)))
        })
    }
}
