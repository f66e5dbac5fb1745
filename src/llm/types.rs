//! Provider-agnostic conversation vocabulary shared by every wire adapter.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn assistant_with_tool_calls(text: Option<String>, tool_calls: Vec<ToolUse>) -> Self {
        let mut content: Vec<ContentBlock> = text
            .filter(|t| !t.is_empty())
            .map(ContentBlock::Text)
            .into_iter()
            .collect();
        content.extend(tool_calls.into_iter().map(ContentBlock::ToolUse));
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<&ToolUse> {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentBlock::ToolUse(tu) => Some(tu),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// The registry's answer to one `ToolUse`, bound back by id.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// JSON-Schema tool description handed to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The only cross-component streaming vocabulary; adapters never leak their
/// wire-format types past this boundary.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Text(String),
    ToolCall(ToolUse),
    Done(Usage),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("authentication failed: {message}")]
    Auth { message: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u32 },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("stream interrupted")]
    StreamInterrupted,

    #[error("failed to parse provider response: {message}")]
    Parse { message: String },
}
