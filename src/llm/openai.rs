//! OpenAI-compatible chat-completions adapter (OpenAI itself, and any
//! self-hosted server that mirrors its wire format).

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::provider::{LLMProvider, StreamBox};
use super::types::{ContentBlock, LLMError, Message, Role, StreamEvent, ToolDefinition, ToolUse, Usage};

pub struct OpenAIProvider {
    base_url: String,
    api_key: String,
    http_client: Client,
    default_model: String,
}

impl OpenAIProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http_client: Client::new(),
            default_model: default_model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_body(&self, system_prompt: &str, conversation: &[Message], tools: &[ToolDefinition], model: &str) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(json!({"role": "system", "content": system_prompt}));
        }

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
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": r.tool_call_id,
                        "content": r.content,
                    }));
                }
                continue;
            }

            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let text = m.text();
            let tool_calls: Vec<Value> = m
                .tool_calls()
                .into_iter()
                .map(|tu| {
                    json!({
                        "id": tu.id,
                        "type": "function",
                        "function": {"name": tu.name, "arguments": tu.input.to_string()},
                    })
                })
                .collect();

            let mut msg = json!({"role": role, "content": if text.is_empty() { Value::Null } else { json!(text) }});
            if !tool_calls.is_empty() {
                msg["tool_calls"] = json!(tool_calls);
            }
            messages.push(msg);
        }

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        if !tools.is_empty() {
            let defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {"name": t.name, "description": t.description, "parameters": t.input_schema},
                    })
                })
                .collect();
            body["tools"] = json!(defs);
        }

        body
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
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
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network { message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error_response(status.as_u16(), &text));
        }

        let (tx, rx) = mpsc::channel::<Result<StreamEvent, LLMError>>(32);
        let byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            pump(byte_stream, tx, cancel).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[derive(Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

async fn pump(
    mut byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
    tx: mpsc::Sender<Result<StreamEvent, LLMError>>,
    cancel: CancellationToken,
) {
    let mut buffer = String::new();
    let mut calls: BTreeMap<u64, PendingCall> = BTreeMap::new();

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
            let Some(data) = line.strip_prefix("data: ") else { continue };
            if data == "[DONE]" {
                continue;
            }
            let Ok(json) = serde_json::from_str::<Value>(data) else { continue };

            if let Some(usage) = json.get("usage").and_then(|u| u.as_object()) {
                let usage = Usage {
                    input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
                    output_tokens: usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
                };
                for (_, call) in std::mem::take(&mut calls) {
                    if tx.send(Ok(StreamEvent::ToolCall(finish_call(call)))).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(Ok(StreamEvent::Done(usage))).await;
                continue;
            }

            let Some(choices) = json["choices"].as_array() else { continue };
            for choice in choices {
                let delta = &choice["delta"];

                if let Some(text) = delta["content"].as_str() {
                    if !text.is_empty() && tx.send(Ok(StreamEvent::Text(text.to_string()))).await.is_err() {
                        return;
                    }
                }

                if let Some(tool_calls) = delta["tool_calls"].as_array() {
                    for tc in tool_calls {
                        let index = tc["index"].as_u64().unwrap_or(0);
                        let entry = calls.entry(index).or_default();
                        if let Some(id) = tc["id"].as_str() {
                            entry.id = id.to_string();
                        }
                        if let Some(name) = tc["function"]["name"].as_str() {
                            entry.name = name.to_string();
                        }
                        if let Some(args) = tc["function"]["arguments"].as_str() {
                            entry.arguments.push_str(args);
                        }
                    }
                }

                if choice["finish_reason"].is_string() {
                    for (_, call) in std::mem::take(&mut calls) {
                        if tx.send(Ok(StreamEvent::ToolCall(finish_call(call)))).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn finish_call(call: PendingCall) -> ToolUse {
    let input = serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
    ToolUse { id: call.id, name: call.name, input }
}

fn parse_error_response(status: u16, body: &str) -> LLMError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json["error"]["message"].as_str().unwrap_or("unknown error").to_string();
        match json["error"]["type"].as_str().unwrap_or("") {
            "invalid_api_key" => LLMError::Auth { message },
            "rate_limit_error" => LLMError::RateLimit { retry_after_secs: 60 },
            "invalid_request_error" => LLMError::InvalidRequest { message },
            _ => LLMError::Provider { status, message },
        }
    } else {
        LLMError::Provider { status, message: body.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_call_falls_back_to_empty_object_on_bad_json() {
        let call = PendingCall { id: "call_1".into(), name: "read".into(), arguments: "{not json".into() };
        let tu = finish_call(call);
        assert_eq!(tu.input, json!({}));
    }

    #[test]
    fn parse_error_response_maps_auth_error() {
        let body = r#"{"error":{"message":"bad key","type":"invalid_api_key"}}"#;
        assert!(matches!(parse_error_response(401, body), LLMError::Auth { .. }));
    }

    #[tokio::test]
    async fn assistant_text_and_tool_calls_roundtrip() {
        let provider = OpenAIProvider::new("https://api.example.com/v1", "key", "gpt-test");
        let conv = vec![Message::assistant_with_tool_calls(
            Some("checking".into()),
            vec![ToolUse { id: "call_1".into(), name: "read".into(), input: json!({"path": "a.rs"}) }],
        )];
        let body = provider.build_body("sys", &conv, &[], "gpt-test");
        let messages = body["messages"].as_array().unwrap();
        let assistant_msg = messages.iter().find(|m| m["role"] == "assistant").unwrap();
        assert_eq!(assistant_msg["content"], json!("checking"));
        assert_eq!(assistant_msg["tool_calls"][0]["function"]["name"], json!("read"));
    }

    #[test]
    fn tool_results_become_distinct_tool_role_messages() {
        let provider = OpenAIProvider::new("https://api.example.com/v1", "key", "gpt-test");
        let conv = vec![Message::tool_results(vec![
            super::super::types::ToolResult { tool_call_id: "call_1".into(), content: "ok".into(), is_error: false },
            super::super::types::ToolResult { tool_call_id: "call_2".into(), content: "ok2".into(), is_error: false },
        ])];
        let body = provider.build_body("sys", &conv, &[], "gpt-test");
        let messages = body["messages"].as_array().unwrap();
        let tool_msgs: Vec<_> = messages.iter().filter(|m| m["role"] == "tool").collect();
        assert_eq!(tool_msgs.len(), 2);
    }
}
