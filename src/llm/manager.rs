//! Holds the one LLM client the agent loop borrows; swapped atomically
//! between turns by `/model`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::provider::{LLMProvider, StreamBox};
use super::types::{LLMError, Message, ToolDefinition};

pub struct LlmManager {
    client: Arc<dyn LLMProvider>,
    model: String,
}

impl LlmManager {
    pub fn new(client: Arc<dyn LLMProvider>, model: String) -> Self {
        Self { client, model }
    }

    pub fn provider_name(&self) -> &str {
        self.client.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Atomic swap of the provider adapter; must only be called between turns.
    pub fn set_llm(&mut self, client: Arc<dyn LLMProvider>, model: String) {
        self.client = client;
        self.model = model;
    }

    pub async fn stream(
        &self,
        system_prompt: &str,
        conversation: &[Message],
        tools: &[ToolDefinition],
        cancel: CancellationToken,
    ) -> Result<StreamBox, LLMError> {
        self.client.stream(system_prompt, conversation, tools, &self.model, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;

    struct StubProvider(&'static str);

    #[async_trait]
    impl LLMProvider for StubProvider {
        fn name(&self) -> &str {
            self.0
        }

        fn default_model(&self) -> &str {
            "stub-model"
        }

        async fn stream(
            &self,
            _system_prompt: &str,
            _conversation: &[Message],
            _tools: &[ToolDefinition],
            _model: &str,
            _cancel: CancellationToken,
        ) -> Result<StreamBox, LLMError> {
            Ok(Box::pin(stream::empty()))
        }
    }

    #[test]
    fn set_llm_swaps_provider_and_model() {
        let mut mgr = LlmManager::new(Arc::new(StubProvider("a")), "model-a".into());
        assert_eq!(mgr.provider_name(), "a");
        mgr.set_llm(Arc::new(StubProvider("b")), "model-b".into());
        assert_eq!(mgr.provider_name(), "b");
        assert_eq!(mgr.model(), "model-b");
    }
}
