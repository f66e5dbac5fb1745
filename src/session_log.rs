//! Per-run JSONL session log (§3.1, §6). Laid out the same way as the
//! teacher's tracing log directory, via `directories::ProjectDirs`, but
//! written as one JSON object per line rather than formatted text.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::agent::SessionSink;
use crate::error::{NavError, Result};

const TOOL_RESULT_TRUNCATE: usize = 5000;

pub fn log_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "nav", "nav")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("/tmp/nav/logs"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Config,
    SystemPrompt,
    UserMessage,
    AssistantMessage,
    ToolCall,
    ToolResult,
    Error,
    Usage,
}

#[derive(Debug, Serialize)]
pub struct SessionRecord {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

pub struct SessionLogger {
    file: File,
}

impl SessionLogger {
    /// Opens `<data-dir>/nav/logs/<timestamp>.jsonl`, creating the directory
    /// if needed.
    pub fn open(now: DateTime<Utc>) -> Result<Self> {
        Self::open_in(&log_dir(), now)
    }

    pub fn open_in(dir: &std::path::Path, now: DateTime<Utc>) -> Result<Self> {
        fs::create_dir_all(dir).map_err(NavError::Io)?;
        let path = dir.join(format!("{}.jsonl", now.format("%Y%m%dT%H%M%S")));
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(NavError::Io)?;
        Ok(Self { file })
    }

    pub fn log(&mut self, record_type: RecordType, timestamp: DateTime<Utc>, data: Value) -> Result<()> {
        let record = SessionRecord { record_type, timestamp, data };
        let line = serde_json::to_string(&record).map_err(|e| NavError::Config(e.to_string()))?;
        writeln!(self.file, "{line}").map_err(NavError::Io)
    }

    pub fn log_tool_result(&mut self, timestamp: DateTime<Utc>, tool_name: &str, output: &str, is_error: bool) -> Result<()> {
        let truncated = truncate_tool_result(output);
        self.log(
            RecordType::ToolResult,
            timestamp,
            serde_json::json!({ "tool": tool_name, "output": truncated, "is_error": is_error }),
        )
    }
}

fn record_type_from_str(s: &str) -> Option<RecordType> {
    Some(match s {
        "config" => RecordType::Config,
        "system_prompt" => RecordType::SystemPrompt,
        "user_message" => RecordType::UserMessage,
        "assistant_message" => RecordType::AssistantMessage,
        "tool_call" => RecordType::ToolCall,
        "tool_result" => RecordType::ToolResult,
        "error" => RecordType::Error,
        "usage" => RecordType::Usage,
        _ => return None,
    })
}

/// Adapts a shared `SessionLogger` to `agent::SessionSink`, so the agent
/// loop can emit `tool_call`/`tool_result`/`error`/`usage` records without
/// knowing about file placement or JSONL framing.
#[derive(Clone)]
pub struct SharedSessionLogger(pub Arc<Mutex<SessionLogger>>);

impl SessionSink for SharedSessionLogger {
    fn record(&self, record_type: &str, mut data: Value) {
        let Some(record_type) = record_type_from_str(record_type) else { return };
        if record_type == RecordType::ToolResult {
            if let Some(output) = data.get("output").and_then(|v| v.as_str()) {
                let truncated = truncate_tool_result(output);
                data["output"] = Value::String(truncated);
            }
        }
        if let Ok(mut logger) = self.0.lock() {
            let _ = logger.log(record_type, Utc::now(), data);
        }
    }
}

fn truncate_tool_result(output: &str) -> String {
    if output.len() <= TOOL_RESULT_TRUNCATE {
        return output.to_string();
    }
    let mut truncated: String = output.chars().take(TOOL_RESULT_TRUNCATE).collect();
    truncated.push_str("… [truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T10:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn truncate_passes_short_output_through() {
        assert_eq!(truncate_tool_result("short"), "short");
    }

    #[test]
    fn truncate_caps_long_output() {
        let long = "x".repeat(TOOL_RESULT_TRUNCATE + 500);
        let truncated = truncate_tool_result(&long);
        assert!(truncated.ends_with("… [truncated]"));
        assert!(truncated.len() < long.len());
    }

    #[test]
    fn log_writes_one_json_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::open_in(tmp.path(), fixed_time()).unwrap();
        logger.log(RecordType::UserMessage, fixed_time(), serde_json::json!({"text": "hi"})).unwrap();
        logger.log(RecordType::AssistantMessage, fixed_time(), serde_json::json!({"text": "hello"})).unwrap();
        logger.file.flush().unwrap();
        drop(logger);

        let path = tmp.path().join(format!("{}.jsonl", fixed_time().format("%Y%m%dT%H%M%S")));
        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"type\":\"user_message\""));
    }

    #[test]
    fn tool_result_is_truncated_before_logging() {
        let tmp = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::open_in(tmp.path(), fixed_time()).unwrap();
        let long = "y".repeat(TOOL_RESULT_TRUNCATE + 10);
        logger.log_tool_result(fixed_time(), "shell", &long, false).unwrap();
        logger.file.flush().unwrap();
        drop(logger);

        let path = tmp.path().join(format!("{}.jsonl", fixed_time().format("%Y%m%dT%H%M%S")));
        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.contains("truncated"));
    }
}
