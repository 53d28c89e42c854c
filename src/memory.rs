//! Persistent, categorised fact store carried across requests.
//!
//! Flat and tree-shaped: category → key → value, no cycles possible.
//! Mutated only through `append_fact`, which does read-modify-write and an
//! atomic write-to-temp-then-rename, so a crash mid-write never corrupts the
//! file the next load sees.

use crate::error::MemoryError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const CATEGORY_USER_PREFERENCES: &str = "user_preferences";
pub const CATEGORY_ENVIRONMENT: &str = "environment";
pub const CATEGORY_REPEATED_DECISIONS: &str = "repeated_decisions";
pub const CATEGORY_FACTS: &str = "facts";

type CategoryMap = BTreeMap<String, BTreeMap<String, Value>>;

/// Process-wide singleton owned by the agent. Reads take a snapshot copy;
/// writes serialise through an internal lock, matching the "single writer
/// lock, snapshot-isolated readers" policy for multi-agent deployments.
pub struct Memory {
    path: PathBuf,
    data: RwLock<CategoryMap>,
}

impl Memory {
    /// Load from `path`. A missing file is treated as empty memory, not an
    /// error - the first `append_fact` call creates it.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| MemoryError::Read {
                path: path.display().to_string(),
                source: e,
            })?;
            serde_json::from_str(&content).map_err(|e| MemoryError::Parse {
                path: path.display().to_string(),
                source: e,
            })?
        } else {
            CategoryMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Immutable snapshot for prompt rendering.
    pub fn snapshot(&self) -> CategoryMap {
        self.data.read().expect("memory lock poisoned").clone()
    }

    /// Read-modify-write one fact, then persist atomically.
    pub fn append_fact(
        &self,
        category: impl Into<String>,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), MemoryError> {
        let category = category.into();
        let key = key.into();

        {
            let mut data = self.data.write().expect("memory lock poisoned");
            data.entry(category).or_default().insert(key, value);
        }

        self.persist()
    }

    fn persist(&self) -> Result<(), MemoryError> {
        let data = self.data.read().expect("memory lock poisoned");
        let serialized = serde_json::to_string_pretty(&*data).map_err(|e| MemoryError::Parse {
            path: self.path.display().to_string(),
            source: e,
        })?;
        atomic_write(&self.path, &serialized).map_err(|e| MemoryError::Write {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Render as `category.key: value` lines for the Planner system prompt.
    pub fn render(&self) -> String {
        let data = self.snapshot();
        let mut lines = Vec::new();
        for (category, entries) in &data {
            for (key, value) in entries {
                lines.push(format!("{}.{}: {}", category, key, value));
            }
        }
        lines.join("\n")
    }
}

fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mem = Memory::load(dir.path().join("memory.json")).unwrap();
        assert!(mem.snapshot().is_empty());
    }

    #[test]
    fn test_append_fact_then_reload_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let mem = Memory::load(&path).unwrap();
        mem.append_fact(CATEGORY_FACTS, "workspace_root", json!("/home/user/project"))
            .unwrap();
        mem.append_fact(CATEGORY_USER_PREFERENCES, "editor", json!("vim"))
            .unwrap();

        let reloaded = Memory::load(&path).unwrap();
        assert_eq!(reloaded.snapshot(), mem.snapshot());
    }

    #[test]
    fn test_render_produces_category_key_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mem = Memory::load(dir.path().join("memory.json")).unwrap();
        mem.append_fact(CATEGORY_FACTS, "shell", json!("zsh")).unwrap();
        let rendered = mem.render();
        assert_eq!(rendered, "facts.shell: \"zsh\"");
    }
}
