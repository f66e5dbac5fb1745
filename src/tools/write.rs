//! `write` tool: create or overwrite a file, auto-creating parent directories.

use std::path::Path;

use serde_json::Value;

use crate::diff;

use super::{resolve_path, ToolError, ToolOutcome};

const CONTEXT_LINES: usize = 3;

pub async fn run(args: &Value, cwd: &Path) -> Result<ToolOutcome, ToolError> {
    let path = args.get("path").and_then(Value::as_str).ok_or(ToolError::MissingArg("path"))?;
    let content_value = args.get("content").ok_or(ToolError::MissingArg("content"))?;
    let content = match content_value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };

    let resolved = resolve_path(cwd, path);
    if let Some(parent) = resolved.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let existed = tokio::fs::metadata(&resolved).await.is_ok();
    let old_content = if existed {
        tokio::fs::read_to_string(&resolved).await.unwrap_or_default()
    } else {
        String::new()
    };

    tokio::fs::write(&resolved, &content).await?;

    let summary = if existed {
        let stats = diff::stats(&old_content, &content);
        format!("wrote {path} ({})", stats.summary())
    } else {
        format!("created {path} ({} bytes)", content.len())
    };
    let diff_text = diff::unified_diff(&old_content, &content, path, CONTEXT_LINES);

    Ok(ToolOutcome { output: summary.clone(), display_summary: summary, display_diff: Some(diff_text), is_error: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creates_file_and_parent_directories() {
        let dir = tempdir().unwrap();
        let outcome = run(&json!({"path": "nested/dir/f.txt", "content": "hello"}), dir.path()).await.unwrap();
        assert!(!outcome.is_error);
        assert!(outcome.display_summary.starts_with("created"));
        let written = tokio::fs::read_to_string(dir.path().join("nested/dir/f.txt")).await.unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn overwrite_reports_diff_stats() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "old\n").await.unwrap();
        let outcome = run(&json!({"path": "f.txt", "content": "new\n"}), dir.path()).await.unwrap();
        assert!(outcome.display_summary.starts_with("wrote"));
        assert!(outcome.display_diff.unwrap().contains("-old"));
    }

    #[tokio::test]
    async fn non_string_content_is_serialized_as_pretty_json() {
        let dir = tempdir().unwrap();
        let outcome = run(&json!({"path": "f.json", "content": {"a": 1}}), dir.path()).await.unwrap();
        assert!(!outcome.is_error);
        let written = tokio::fs::read_to_string(dir.path().join("f.json")).await.unwrap();
        assert!(written.contains("\"a\": 1"));
    }
}
