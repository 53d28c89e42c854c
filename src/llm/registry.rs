//! Tool catalogue: the single source of truth for tool descriptors.
//!
//! Both the structured-tool wire channel and the textual system-prompt
//! rendering (`crate::planner`) derive from [`ToolRegistry::get_tools_for_llm`]
//! / [`ToolRegistry::render_catalogue`] — nothing here duplicates a
//! description in two places.

use super::Tool;
use crate::tools::ToolProvider;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolProvider>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: ToolProvider + 'static>(mut self, tool: T) -> Self {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
        self
    }

    pub fn register_all_builtin(mut self) -> Self {
        for tool in crate::tools::all_tools() {
            let name = tool.name().to_string();
            self.tools.insert(name, tool);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolProvider>> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Full tool definitions for the structured-tool wire channel.
    pub fn get_tools_for_llm(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|provider| Tool {
                name: provider.name().to_string(),
                description: provider.brief().to_string(),
                parameters: provider.parameters(),
                full_description: None,
            })
            .collect()
    }

    /// Render the catalogue as `name: full description` lines, for the
    /// Planner's textual system prompt.
    pub fn render_catalogue(&self) -> String {
        let mut names: Vec<&Arc<dyn ToolProvider>> = self.tools.values().collect();
        names.sort_by_key(|t| t.name().to_string());
        names
            .into_iter()
            .map(|t| format!("- {}: {}", t.name(), t.full_description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new();
        assert!(registry.tool_names().is_empty());
    }

    #[test]
    fn test_register_all_builtin() {
        let registry = ToolRegistry::new().register_all_builtin();
        assert!(registry.get("exec_cmd").is_some());
        assert!(registry.get("grep").is_some());
        assert_eq!(registry.tool_names().len(), 6);
    }

    #[test]
    fn test_get_tools_for_llm_uses_brief_description() {
        let registry = ToolRegistry::new().register_all_builtin();
        let tools = registry.get_tools_for_llm();
        let exec = tools.iter().find(|t| t.name == "exec_cmd").unwrap();
        assert!(exec.full_description.is_none());
        assert_eq!(exec.description, "Run a shell command and return its combined stdout/stderr.");
    }

    #[test]
    fn test_render_catalogue_contains_all_tools() {
        let registry = ToolRegistry::new().register_all_builtin();
        let rendered = registry.render_catalogue();
        for name in ["list_dir", "read_file", "write_file", "edit_file", "exec_cmd", "grep"] {
            assert!(rendered.contains(name), "missing {} in catalogue", name);
        }
    }

    #[test]
    fn test_has_tool() {
        let registry = ToolRegistry::new().register_all_builtin();
        assert!(registry.has_tool("read_file"));
        assert!(!registry.has_tool("nonexistent"));
    }
}
