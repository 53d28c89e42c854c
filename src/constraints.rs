//! Security envelope applied to every tool invocation.
//!
//! Pure, side-effect-free validators: path confinement, command allowlisting,
//! timeout capping, and output truncation. Callers convert failures into
//! `ToolResult { success: false, .. }` themselves — nothing in here aborts
//! anything.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Immutable security envelope for one agent run.
#[derive(Debug, Clone)]
pub struct Constraints {
    pub allowed_root: PathBuf,
    pub command_allowlist: HashSet<String>,
    pub timeout_sec: u64,
    pub max_output_size: usize,
    pub exec_enabled: bool,
}

impl Constraints {
    pub fn new(
        allowed_root: impl Into<PathBuf>,
        command_allowlist: HashSet<String>,
        timeout_sec: u64,
        max_output_size: usize,
        exec_enabled: bool,
    ) -> Self {
        Self {
            allowed_root: allowed_root.into(),
            command_allowlist,
            timeout_sec,
            max_output_size,
            exec_enabled,
        }
    }

    /// Resolve `p` against `allowed_root` and confirm it stays inside it.
    ///
    /// Relative paths are joined onto `allowed_root`; absolute paths are used
    /// as-is. Both are canonicalised (symlinks resolved) before the
    /// containment check. `allowed_root == "/"` always succeeds. Returns the
    /// resolved path alongside the verdict - callers must execute against
    /// this path, not the original string, or confinement of relative paths
    /// is a no-op (they'd resolve against the process's own cwd instead).
    pub fn validate_path(&self, p: &str) -> (bool, String, PathBuf) {
        let candidate = Path::new(p);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.allowed_root.join(candidate)
        };

        let root_is_fs_root = self.allowed_root == Path::new("/");

        let canonical_root = match self.allowed_root.canonicalize() {
            Ok(r) => r,
            Err(_) if root_is_fs_root => PathBuf::from("/"),
            Err(e) => {
                return (
                    false,
                    format!("allowed_root does not exist: {}", e),
                    joined,
                )
            }
        };

        if root_is_fs_root {
            // Still canonicalise the candidate so symlink targets are checked,
            // but every result is accepted.
            let resolved = canonicalize_best_effort(&joined).unwrap_or(joined);
            return (true, String::new(), resolved);
        }

        let canonical = match canonicalize_best_effort(&joined) {
            Ok(c) => c,
            Err(e) => return (false, format!("cannot resolve path: {}", e), joined),
        };

        if canonical.starts_with(&canonical_root) {
            (true, String::new(), canonical)
        } else {
            (
                false,
                format!(
                    "path outside allowed root: {} is not under {}",
                    canonical.display(),
                    canonical_root.display()
                ),
                canonical,
            )
        }
    }

    /// Tokenise on whitespace and check the first token against the allowlist.
    /// An empty allowlist accepts every command. No shell semantics beyond
    /// first-token extraction — `exec_cmd` still runs through a real shell.
    pub fn validate_command(&self, cmd: &str) -> (bool, String) {
        if self.command_allowlist.is_empty() {
            return (true, String::new());
        }

        let first = cmd.split_whitespace().next().unwrap_or("");
        if first.is_empty() {
            return (false, "empty command".to_string());
        }

        if self.command_allowlist.contains(first) {
            (true, String::new())
        } else {
            (
                false,
                format!(
                    "command '{}' not in allowlist: {:?}",
                    first, self.command_allowlist
                ),
            )
        }
    }

    /// `min(requested or infinity, timeout_sec)`.
    pub fn effective_timeout(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(r) => r.min(self.timeout_sec),
            None => self.timeout_sec,
        }
    }
}

/// Canonicalise `p`. If `p` itself doesn't exist yet (e.g. a file about to be
/// written), canonicalise the deepest existing ancestor and re-append the
/// missing suffix, so writes to new files are still confined correctly.
fn canonicalize_best_effort(p: &Path) -> std::io::Result<PathBuf> {
    if let Ok(c) = p.canonicalize() {
        return Ok(c);
    }

    let mut missing = Vec::new();
    let mut cur = p;
    loop {
        match cur.canonicalize() {
            Ok(base) => {
                let mut result = base;
                for part in missing.into_iter().rev() {
                    result.push(part);
                }
                return Ok(result);
            }
            Err(e) => {
                let name = match cur.file_name() {
                    Some(n) => n,
                    None => return Err(e),
                };
                missing.push(name.to_owned());
                match cur.parent() {
                    Some(parent) => cur = parent,
                    None => return Err(e),
                }
            }
        }
    }
}

/// Upper bound on `"\n... ({N} chars hidden) ...\n"`'s own length: 25 fixed
/// characters plus room for up to 20 digits of `N` (more than `usize::MAX`
/// ever needs). Reserved out of `cap` so the marker never pushes the result
/// past `cap` itself.
const MARKER_RESERVE: usize = 45;

/// Truncate `s` to `cap` bytes, preserving a byte prefix and suffix so
/// diagnostic text at either end survives. Idempotent: truncating an already
/// truncated string with the same cap is a no-op, because the result never
/// exceeds `cap`.
pub fn truncate_output(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }

    let half = cap.saturating_sub(MARKER_RESERVE) / 2;
    let prefix_end = floor_char_boundary(s, half);
    let suffix_start = ceil_char_boundary(s, s.len() - half);

    let hidden = s.len() - prefix_end - (s.len() - suffix_start);
    format!(
        "{}\n... ({} chars hidden) ...\n{}",
        &s[..prefix_end],
        hidden,
        &s[suffix_start..]
    )
}

pub(crate) fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
