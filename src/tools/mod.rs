//! Named tool operations the agent loop dispatches by name: `read`, `edit`,
//! `write`, `shell`, `shell_status`. Each one is `(args, cwd, process manager)
//! -> ToolOutcome`; the registry's only other job is handing out JSON-Schema
//! descriptions in the one dialect every provider adapter shares.

pub mod edit;
pub mod read;
pub mod shell;
pub mod write;

use std::path::Path;

use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::types::ToolDefinition;
use crate::process::ProcessManager;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing required argument '{0}'")]
    MissingArg(&'static str),

    #[error("'{0}' is a directory, not a file")]
    IsDirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Hashline(#[from] crate::hashline::HashlineError),

    #[error("process error: {0}")]
    Process(#[from] crate::process::ProcessError),

    #[error("unrecognized {0}")]
    Unrecognized(String),
}

/// The uniform result every tool call resolves to. Distinct from
/// `llm::types::ToolResult`, which additionally carries the `tool_call_id`
/// binding this back to the model's request.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: String,
    pub display_summary: String,
    pub display_diff: Option<String>,
    pub is_error: bool,
}

impl ToolOutcome {
    fn error(e: impl std::fmt::Display) -> Self {
        let output = e.to_string();
        Self {
            display_summary: output.lines().next().unwrap_or_default().to_string(),
            output,
            display_diff: None,
            is_error: true,
        }
    }
}

fn resolve_path(cwd: &Path, path: &str) -> std::path::PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}

/// Dispatch a tool call by name. Never returns `Err` - failures are folded
/// into an `is_error` outcome so the agent loop can append a `ToolResult`
/// unconditionally (per spec: a tool error is model-visible text, not a
/// process-level failure).
pub async fn dispatch(name: &str, args: &Value, cwd: &Path, processes: &ProcessManager) -> ToolOutcome {
    let result = match name {
        "read" => read::run(args, cwd).await,
        "edit" => edit::run(args, cwd).await,
        "write" => write::run(args, cwd).await,
        "shell" => shell::run_shell(args, processes).await,
        "shell_status" => shell::run_shell_status(args, processes).await,
        other => return ToolOutcome::error(format!("Unknown tool: {other}")),
    };
    result.unwrap_or_else(ToolOutcome::error)
}

/// JSON-Schema descriptions of every tool, in the provider-agnostic shape
/// each adapter wraps into its own tool-definition envelope.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "read".into(),
            description: "Read a file in hashline display form (`line:hash|content`) so later edits can reference exact lines.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path to the file, relative to the working directory or absolute"},
                    "offset": {"type": "integer", "description": "First line to read, 1-based (default: 1)"},
                    "limit": {"type": "integer", "description": "Maximum lines to return (default and maximum: 2000)"}
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: "edit".into(),
            description: "Apply one or more hashline-anchored edits to a file. Each edit is set_line, replace_lines, or insert_after; anchors must match the file's current hashes or the whole call is rejected and no line is written.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path to the file to edit"},
                    "edits": {
                        "type": "array",
                        "description": "Batch of edit operations, each anchored to the file state from the last read",
                        "items": {
                            "type": "object",
                            "properties": {
                                "type": {"type": "string", "enum": ["set_line", "replace_lines", "insert_after"]},
                                "anchor": {"type": "string", "description": "line:hash anchor, for set_line and insert_after"},
                                "start_anchor": {"type": "string", "description": "line:hash anchor for the first line of a replace_lines range"},
                                "end_anchor": {"type": "string", "description": "line:hash anchor for the last line of a replace_lines range"},
                                "new_text": {"type": "string", "description": "Replacement text for set_line/replace_lines; empty string deletes"},
                                "text": {"type": "string", "description": "Text to insert after the anchor, for insert_after"}
                            },
                            "required": ["type"]
                        }
                    }
                },
                "required": ["path", "edits"]
            }),
        },
        ToolDefinition {
            name: "write".into(),
            description: "Create or overwrite a file with the given content. Parent directories are created as needed.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path to the file to write"},
                    "content": {"description": "File content. Non-string values are serialized as pretty JSON."}
                },
                "required": ["path", "content"]
            }),
        },
        ToolDefinition {
            name: "shell".into(),
            description: "Run a shell command in the working directory. Commands that outlast the wait budget are backgrounded and tracked by pid instead of being killed.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Command to run under sh -c"},
                    "wait_ms": {"type": "integer", "description": "Milliseconds to wait before backgrounding (default: 30000; 0 backgrounds immediately)"}
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: "shell_status".into(),
            description: "Inspect or control backgrounded shell commands. Without a pid, lists every tracked process.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pid": {"type": "integer", "description": "Process id to inspect; omit to list all tracked processes"},
                    "action": {"type": "string", "enum": ["status", "output", "tail", "kill"], "description": "What to do with pid (default: status)"},
                    "n": {"type": "integer", "description": "Byte count for action=tail (default: 2048)"}
                },
                "required": []
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definitions_cover_all_five_names() {
        let names: Vec<&str> = tool_definitions().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read", "edit", "write", "shell", "shell_status"]);
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_an_error_outcome() {
        let processes = ProcessManager::new(std::env::temp_dir());
        let outcome = dispatch("frobnicate", &json!({}), Path::new("."), &processes).await;
        assert!(outcome.is_error);
        assert!(outcome.output.contains("Unknown tool"));
    }
}
