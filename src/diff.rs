//! Unified line diffs via Myers' algorithm (`similar`), used for tool-result
//! summaries and the TUI's diff view.

use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
}

impl DiffStats {
    pub fn summary(&self) -> String {
        format!("+{}, -{}", self.additions, self.deletions)
    }
}

/// Render a unified diff (`@@ -a,b +c,d @@` hunks) between `old` and `new`,
/// with `context` lines of surrounding unchanged content per hunk.
pub fn unified_diff(old: &str, new: &str, path: &str, context: usize) -> String {
    let diff = TextDiff::from_lines(old, new);
    diff.unified_diff()
        .context_radius(context)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

/// Count additions/deletions between `old` and `new`.
pub fn stats(old: &str, new: &str) -> DiffStats {
    let diff = TextDiff::from_lines(old, new);
    let mut out = DiffStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => out.additions += 1,
            ChangeTag::Delete => out.deletions += 1,
            ChangeTag::Equal => {}
        }
    }
    out
}
