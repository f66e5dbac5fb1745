//! LLM provider layer: one streaming contract, three wire protocols.

pub mod anthropic;
pub mod manager;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use manager::LlmManager;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use provider::{LLMProvider, StreamBox};
pub use types::{
    ContentBlock, LLMError, Message, Role, StreamEvent, ToolDefinition, ToolResult, ToolUse, Usage,
};
