//! `list_dir`, `read_file`, `write_file` — the three plain filesystem
//! primitives. No path validation here; the registry validates every
//! path-bearing argument against `Constraints` before `execute` runs.

use super::{BoxFuture, ToolOutput, ToolProvider};
use crate::llm::ToolCall;
use serde_json::json;
use std::path::Path;

// ---------------------------------------------------------------------
// list_dir
// ---------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ListDirTool;

impl ListDirTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolProvider for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn brief(&self) -> &str {
        "List directory entries, one per line, trailing '/' on directories."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list." }
            },
            "required": ["path"]
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

            let entries = std::fs::read_dir(path)
                .map_err(|e| ToolOutput::err(format!("failed to read dir '{}': {}", path, e)))?;

            let mut names = Vec::new();
            for entry in entries {
                let entry =
                    entry.map_err(|e| ToolOutput::err(format!("failed to read entry: {}", e)))?;
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                let name = entry.file_name().to_string_lossy().into_owned();
                names.push(if is_dir { format!("{}/", name) } else { name });
            }
            names.sort();

            Ok(ToolOutput::ok(names.join("\n")))
        })
    }
}

// ---------------------------------------------------------------------
// read_file
// ---------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolProvider for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn brief(&self) -> &str {
        "Read lines from a file, optionally starting at an offset for up to limit lines."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to read." },
                "offset": { "type": "integer", "description": "0-based starting line index." },
                "limit": { "type": "integer", "description": "Maximum number of lines to return." }
            },
            "required": ["path"]
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
            let offset = call
                .args
                .get("offset")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
            let limit = call.args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

            let content = std::fs::read_to_string(path)
                .map_err(|e| ToolOutput::err(format!("failed to read file '{}': {}", path, e)))?;

            let lines: Vec<&str> = content.lines().collect();
            if offset > lines.len() {
                return Ok(ToolOutput::ok(String::new()));
            }
            let end = match limit {
                Some(l) => (offset + l).min(lines.len()),
                None => lines.len(),
            };

            Ok(ToolOutput::ok(lines[offset..end].join("\n")))
        })
    }
}

// ---------------------------------------------------------------------
// write_file
// ---------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolProvider for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn brief(&self) -> &str {
        "Create parent directories as needed and write UTF-8 content to a file."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to write." },
                "content": { "type": "string", "description": "UTF-8 content to write." }
            },
            "required": ["path", "content"]
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
            let content = call
                .args
                .get("content")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolOutput::err("missing 'content' argument"))?;

            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ToolOutput::err(format!("failed to create parent dirs: {}", e))
                    })?;
                }
            }

            std::fs::write(path, content)
                .map_err(|e| ToolOutput::err(format!("failed to write file '{}': {}", path, e)))?;

            Ok(ToolOutput::ok(format!(
                "wrote {} bytes to '{}'",
                content.len(),
                path
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "t1".to_string(),
            tool_name: name.to_string(),
            args,
        }
    }

    #[tokio::test]
    async fn test_list_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();

        let tool = ListDirTool::new();
        let result = tool
            .execute(&call("list_dir", json!({"path": dir.path().to_str().unwrap()})))
            .await
            .unwrap();
        assert!(result.content.contains("a_dir/"));
        assert!(result.content.contains("b.txt"));
    }

    #[tokio::test]
    async fn test_read_file_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hi\n").unwrap();

        let tool = ReadFileTool::new();
        let result = tool
            .execute(&call("read_file", json!({"path": path.to_str().unwrap()})))
            .await
            .unwrap();
        assert_eq!(result.content, "hi");
    }

    #[tokio::test]
    async fn test_read_file_offset_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        let tool = ReadFileTool::new();
        let result = tool
            .execute(&call(
                "read_file",
                json!({"path": path.to_str().unwrap(), "offset": 1, "limit": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(result.content, "two\nthree");
    }

    #[tokio::test]
    async fn test_write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/file.txt");

        let tool = WriteFileTool::new();
        let result = tool
            .execute(&call(
                "write_file",
                json!({"path": path.to_str().unwrap(), "content": "hello"}),
            ))
            .await
            .unwrap();
        assert!(result.content.contains("5 bytes"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }
}
