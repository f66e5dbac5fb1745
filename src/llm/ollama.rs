//! Ollama-native adapter: NDJSON-framed chat streaming, no SSE envelope.
//!
//! Ollama doesn't issue tool-call ids, so this adapter synthesizes `call_N`
//! ids when building requests, and resolves `tool_name` back from a
//! per-request id→name table when translating tool results.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::provider::{LLMProvider, StreamBox};
use super::types::{ContentBlock, LLMError, Message, Role, StreamEvent, ToolDefinition, ToolUse, Usage};

pub struct OllamaProvider {
    base_url: String,
    http_client: Client,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: Client::new(),
            default_model: default_model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    fn build_body(&self, system_prompt: &str, conversation: &[Message], tools: &[ToolDefinition], model: &str) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(json!({"role": "system", "content": system_prompt}));
        }

        let mut id_to_name: HashMap<String, String> = HashMap::new();

        for m in conversation {
            let tool_results: Vec<_> = m
                .content
                .iter()
                .filter_map(|c| match c {
                    ContentBlock::ToolResult(r) => Some(r),
                    _ => None,
                })
                .collect();

            if !tool_results.is_empty() {
                for r in tool_results {
                    let tool_name = id_to_name.get(&r.tool_call_id).cloned().unwrap_or_default();
                    messages.push(json!({"role": "tool", "tool_name": tool_name, "content": r.content}));
                }
                continue;
            }

            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let text = m.text();
            let calls = m.tool_calls();
            for tu in &calls {
                id_to_name.insert(tu.id.clone(), tu.name.clone());
            }

            let mut msg = json!({"role": role, "content": text});
            if !calls.is_empty() {
                let tool_calls: Vec<Value> = calls
                    .iter()
                    .map(|tu| json!({"function": {"name": tu.name, "arguments": tu.input}}))
                    .collect();
                msg["tool_calls"] = json!(tool_calls);
            }
            messages.push(msg);
        }

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": true,
        });
        if !tools.is_empty() {
            let defs: Vec<Value> = tools
                .iter()
                .map(|t| json!({"type": "function", "function": {"name": t.name, "description": t.description, "parameters": t.input_schema}}))
                .collect();
            body["tools"] = json!(defs);
        }
        body
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn stream(
        &self,
        system_prompt: &str,
        conversation: &[Message],
        tools: &[ToolDefinition],
        model: &str,
        cancel: CancellationToken,
    ) -> Result<StreamBox, LLMError> {
        let body = self.build_body(system_prompt, conversation, tools, model);

        let response = self
            .http_client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network { message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Provider { status: status.as_u16(), message: text });
        }

        let (tx, rx) = mpsc::channel::<Result<StreamEvent, LLMError>>(32);
        let byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            pump(byte_stream, tx, cancel).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

async fn pump(
    mut byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
    tx: mpsc::Sender<Result<StreamEvent, LLMError>>,
    cancel: CancellationToken,
) {
    let mut buffer = String::new();
    let mut next_call_id = 0u32;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            chunk = byte_stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(Err(LLMError::Network { message: e.to_string() })).await;
                break;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim().to_string();
            buffer = buffer[pos + 1..].to_string();
            if line.is_empty() {
                continue;
            }
            let Ok(json) = serde_json::from_str::<Value>(&line) else { continue };

            if let Some(text) = json["message"]["content"].as_str() {
                if !text.is_empty() && tx.send(Ok(StreamEvent::Text(text.to_string()))).await.is_err() {
                    return;
                }
            }

            if let Some(tool_calls) = json["message"]["tool_calls"].as_array() {
                for tc in tool_calls {
                    let name = tc["function"]["name"].as_str().unwrap_or_default().to_string();
                    let input = tc["function"]["arguments"].clone();
                    let id = format!("call_{next_call_id}");
                    next_call_id += 1;
                    if tx.send(Ok(StreamEvent::ToolCall(ToolUse { id, name, input }))).await.is_err() {
                        return;
                    }
                }
            }

            if json["done"].as_bool() == Some(true) {
                let usage = Usage {
                    input_tokens: json["prompt_eval_count"].as_u64().unwrap_or(0) as u32,
                    output_tokens: json["eval_count"].as_u64().unwrap_or(0) as u32,
                };
                let _ = tx.send(Ok(StreamEvent::Done(usage))).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_tool_calls_synthesize_id_to_name_table() {
        let provider = OllamaProvider::new("http://localhost:11434", "llama3");
        let conv = vec![
            Message::assistant_with_tool_calls(
                None,
                vec![ToolUse { id: "call_0".into(), name: "read".into(), input: json!({"path": "a.rs"}) }],
            ),
            Message::tool_results(vec![super::super::types::ToolResult {
                tool_call_id: "call_0".into(),
                content: "ok".into(),
                is_error: false,
            }]),
        ];
        let body = provider.build_body("sys", &conv, &[], "llama3");
        let messages = body["messages"].as_array().unwrap();
        let tool_msg = messages.iter().find(|m| m["role"] == "tool").unwrap();
        assert_eq!(tool_msg["tool_name"], json!("read"));
    }

    #[tokio::test]
    async fn assistant_text_and_tool_calls_roundtrip() {
        let provider = OllamaProvider::new("http://localhost:11434", "llama3");
        let conv = vec![Message::assistant_with_tool_calls(
            Some("checking".into()),
            vec![ToolUse { id: "call_1".into(), name: "read".into(), input: json!({"path": "a.rs"}) }],
        )];
        let body = provider.build_body("sys", &conv, &[], "llama3");
        let messages = body["messages"].as_array().unwrap();
        let assistant_msg = messages.iter().find(|m| m["role"] == "assistant").unwrap();
        assert_eq!(assistant_msg["content"], json!("checking"));
        assert_eq!(assistant_msg["tool_calls"][0]["function"]["name"], json!("read"));
    }
}
