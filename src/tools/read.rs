//! `read` tool: render a file in hashline display form, paginated.

use std::path::Path;

use serde_json::Value;

use crate::hashline::{format_lines, MAX_BYTES, MAX_LINES};

use super::{resolve_path, ToolError, ToolOutcome};

pub async fn run(args: &Value, cwd: &Path) -> Result<ToolOutcome, ToolError> {
    let path = args.get("path").and_then(Value::as_str).ok_or(ToolError::MissingArg("path"))?;
    let resolved = resolve_path(cwd, path);

    let metadata = tokio::fs::metadata(&resolved).await?;
    if metadata.is_dir() {
        return Err(ToolError::IsDirectory(path.to_string()));
    }

    let offset = args.get("offset").and_then(Value::as_u64).unwrap_or(1).max(1) as usize;
    let limit = args
        .get("limit")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(MAX_LINES)
        .min(MAX_LINES);

    let content = tokio::fs::read_to_string(&resolved).await?;
    let all_lines = to_lines(&content);
    let total = all_lines.len();

    let start_idx = (offset - 1).min(total);
    let end_idx = (start_idx + limit).min(total);
    let slice = &all_lines[start_idx..end_idx];

    let mut display = format_lines(slice, start_idx + 1);

    let byte_truncated = display.len() > MAX_BYTES;
    if byte_truncated {
        let mut cut = MAX_BYTES;
        while cut > 0 && !display.is_char_boundary(cut) {
            cut -= 1;
        }
        display.truncate(cut);
    }

    if end_idx < total {
        display.push_str(&format!(
            "\n[{} more lines. Use offset={} to continue]",
            total - end_idx,
            end_idx + 1
        ));
    }
    if byte_truncated {
        display.push_str(&format!("\n[truncated: output exceeds {MAX_BYTES} bytes]"));
    }

    let summary = format!("read {} lines from {path}", slice.len());
    Ok(ToolOutcome { output: display, display_summary: summary, display_diff: None, is_error: false })
}

fn to_lines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        return Vec::new();
    }
    content.strip_suffix('\n').unwrap_or(content).split('\n').collect()
}
