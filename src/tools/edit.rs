//! `edit` tool: decode either edit shape, dispatch to the hashline engine,
//! and hand back a diff plus fresh hashlines over the touched region.

use std::path::Path;

use serde_json::Value;

use crate::diff;
use crate::hashline::{apply_edits, format_lines, EditOp};

use super::{resolve_path, ToolError, ToolOutcome};

const CONTEXT_LINES: usize = 3;

pub async fn run(args: &Value, cwd: &Path) -> Result<ToolOutcome, ToolError> {
    let path = args.get("path").and_then(Value::as_str).ok_or(ToolError::MissingArg("path"))?;
    let edits_json = args.get("edits").and_then(Value::as_array).ok_or(ToolError::MissingArg("edits"))?;

    let ops = edits_json.iter().map(parse_edit_op).collect::<Result<Vec<_>, _>>()?;

    let resolved = resolve_path(cwd, path);
    let old_content = tokio::fs::read_to_string(&resolved).await?;

    let outcome = apply_edits(&old_content, &ops)?;
    tokio::fs::write(&resolved, &outcome.content).await?;

    let stats = diff::stats(&old_content, &outcome.content);
    let diff_text = diff::unified_diff(&old_content, &outcome.content, path, CONTEXT_LINES);
    let fresh = fresh_hashlines_around(&ops, &outcome.content);

    let summary = format!("edited {path} ({})", stats.summary());
    let output = if fresh.is_empty() {
        summary.clone()
    } else {
        format!("{summary}\n\n{fresh}")
    };

    Ok(ToolOutcome { output, display_summary: summary, display_diff: Some(diff_text), is_error: false })
}

/// Normalize the model's edit item - flat (`{type: "set_line", ...}`) or
/// nested (`{set_line: {...}}`) - into an `EditOp`.
fn parse_edit_op(v: &Value) -> Result<EditOp, ToolError> {
    let obj = v.as_object().ok_or(ToolError::MissingArg("edits[]"))?;

    if let Some(kind) = obj.get("type").and_then(Value::as_str) {
        return build_op(kind, v);
    }
    for kind in ["set_line", "replace_lines", "insert_after"] {
        if let Some(fields) = obj.get(kind) {
            return build_op(kind, fields);
        }
    }
    Err(ToolError::MissingArg("edits[].type"))
}

fn build_op(kind: &str, fields: &Value) -> Result<EditOp, ToolError> {
    match kind {
        "set_line" => {
            let anchor = fields.get("anchor").and_then(Value::as_str).ok_or(ToolError::MissingArg("anchor"))?;
            let new_text = fields.get("new_text").and_then(Value::as_str).unwrap_or("");
            Ok(EditOp::set_line(anchor, new_text)?)
        }
        "replace_lines" => {
            let start = fields.get("start_anchor").and_then(Value::as_str).ok_or(ToolError::MissingArg("start_anchor"))?;
            let end = fields.get("end_anchor").and_then(Value::as_str).ok_or(ToolError::MissingArg("end_anchor"))?;
            let new_text = fields.get("new_text").and_then(Value::as_str).unwrap_or("");
            Ok(EditOp::replace_lines(start, end, new_text)?)
        }
        "insert_after" => {
            let anchor = fields.get("anchor").and_then(Value::as_str).ok_or(ToolError::MissingArg("anchor"))?;
            let text = fields.get("text").and_then(Value::as_str).unwrap_or("");
            Ok(EditOp::insert_after(anchor, text)?)
        }
        other => Err(ToolError::Unrecognized(format!("edit kind '{other}'"))),
    }
}

fn op_anchor_lines(op: &EditOp) -> [usize; 2] {
    match op {
        EditOp::SetLine { anchor, .. } => [anchor.line, anchor.line],
        EditOp::ReplaceLines { start, end, .. } => [start.line, end.line],
        EditOp::InsertAfter { anchor, .. } => [anchor.line, anchor.line],
    }
}

/// Fresh hashlines spanning every edit's pre-edit anchor lines plus context,
/// re-rendered against the post-edit content so the model can keep editing
/// without a full re-read. Line numbers shift with the edit, so this is a
/// best-effort window, not a precise re-mapping of each anchor.
fn fresh_hashlines_around(ops: &[EditOp], new_content: &str) -> String {
    if ops.is_empty() {
        return String::new();
    }
    let new_lines: Vec<&str> = if new_content.is_empty() {
        Vec::new()
    } else {
        new_content.strip_suffix('\n').unwrap_or(new_content).split('\n').collect()
    };
    let total = new_lines.len();
    if total == 0 {
        return String::new();
    }

    let (min_line, max_line) = ops
        .iter()
        .flat_map(|op| op_anchor_lines(op).into_iter())
        .fold((usize::MAX, 0usize), |(lo, hi), l| (lo.min(l), hi.max(l)));

    let start = min_line.saturating_sub(CONTEXT_LINES).max(1);
    let end = (max_line + CONTEXT_LINES).min(total).max(start);

    format_lines(&new_lines[(start - 1)..end], start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashline::hash_line;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn flat_set_line_edit_applies_and_rewrites_file() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "foo\nbar\nbaz\n").await.unwrap();
        let anchor = format!("2:{}", hash_line("bar"));

        let outcome = run(
            &json!({"path": "f.txt", "edits": [{"type": "set_line", "anchor": anchor, "new_text": "BAR"}]}),
            dir.path(),
        )
        .await
        .unwrap();

        assert!(!outcome.is_error);
        assert!(outcome.display_diff.is_some());
        let written = tokio::fs::read_to_string(dir.path().join("f.txt")).await.unwrap();
        assert_eq!(written, "foo\nBAR\nbaz\n");
        assert!(outcome.output.contains("BAR"));
    }

    #[tokio::test]
    async fn nested_replace_lines_edit_shape_is_accepted() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "foo\nbar\nbaz\n").await.unwrap();
        let anchor = format!("2:{}", hash_line("bar"));

        let outcome = run(
            &json!({"path": "f.txt", "edits": [{"replace_lines": {"start_anchor": anchor, "end_anchor": anchor, "new_text": "REPLACED"}}]}),
            dir.path(),
        )
        .await
        .unwrap();

        assert!(!outcome.is_error);
        let written = tokio::fs::read_to_string(dir.path().join("f.txt")).await.unwrap();
        assert_eq!(written, "foo\nREPLACED\nbaz\n");
    }

    #[tokio::test]
    async fn stale_anchor_leaves_file_untouched_and_reports_mismatch() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "foo\nqux\nbaz\n").await.unwrap();
        let stale_anchor = format!("2:{}", hash_line("bar"));

        let err = run(
            &json!({"path": "f.txt", "edits": [{"type": "set_line", "anchor": stale_anchor, "new_text": "BAR"}]}),
            dir.path(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ToolError::Hashline(_)));
        let untouched = tokio::fs::read_to_string(dir.path().join("f.txt")).await.unwrap();
        assert_eq!(untouched, "foo\nqux\nbaz\n");
    }
}
