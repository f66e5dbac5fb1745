//! The single trait the agent loop drives; adapters for the three wire
//! protocols implement it and never leak their native types past `StreamEvent`.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::types::{LLMError, Message, StreamEvent, ToolDefinition};

pub type StreamBox = Pin<Box<dyn Stream<Item = Result<StreamEvent, LLMError>> + Send>>;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    async fn stream(
        &self,
        system_prompt: &str,
        conversation: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        cancel: CancellationToken,
    ) -> Result<StreamBox, LLMError>;
}
