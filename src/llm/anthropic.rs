//! Anthropic Messages API adapter: content-block streaming over SSE.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::provider::{LLMProvider, StreamBox};
use super::types::{ContentBlock, LLMError, Message, Role, StreamEvent, ToolDefinition, ToolUse, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    http_client: Client,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http_client: Client::new(),
            default_model: default_model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn build_body(&self, system_prompt: &str, conversation: &[Message], tools: &[ToolDefinition], model: &str) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        let mut pending_tool_results: Vec<Value> = Vec::new();

        let flush = |messages: &mut Vec<Value>, pending: &mut Vec<Value>| {
            if !pending.is_empty() {
                messages.push(json!({"role": "user", "content": std::mem::take(pending)}));
            }
        };

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
                    pending_tool_results.push(json!({
                        "type": "tool_result",
                        "tool_use_id": r.tool_call_id,
                        "content": r.content,
                        "is_error": r.is_error,
                    }));
                }
                continue;
            }
            flush(&mut messages, &mut pending_tool_results);

            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let mut content: Vec<Value> = Vec::new();
            for block in &m.content {
                match block {
                    ContentBlock::Text(t) if !t.is_empty() => content.push(json!({"type": "text", "text": t})),
                    ContentBlock::ToolUse(tu) => content.push(json!({
                        "type": "tool_use", "id": tu.id, "name": tu.name, "input": tu.input,
                    })),
                    _ => {}
                }
            }
            messages.push(json!({"role": role, "content": content}));
        }
        flush(&mut messages, &mut pending_tool_results);

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": 8192,
            "stream": true,
        });
        if !system_prompt.is_empty() {
            body["system"] = json!(system_prompt);
        }
        if !tools.is_empty() {
            let defs: Vec<Value> = tools
                .iter()
                .map(|t| json!({"name": t.name, "description": t.description, "input_schema": t.input_schema}))
                .collect();
            body["tools"] = json!(defs);
        }
        body
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
struct InFlightToolUse {
    id: String,
    name: String,
    partial_json: String,
}

async fn pump(
    mut byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
    tx: mpsc::Sender<Result<StreamEvent, LLMError>>,
    cancel: CancellationToken,
) {
    let mut buffer = String::new();
    let mut in_flight: Option<InFlightToolUse> = None;

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

        while let Some(pos) = buffer.find("\n\n") {
            let event_str = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();

            match parse_event(&event_str, &mut in_flight) {
                Some(Ok(events)) => {
                    for e in events {
                        if tx.send(Ok(e)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
                None => {}
            }
        }
    }
}

fn parse_event(event_str: &str, in_flight: &mut Option<InFlightToolUse>) -> Option<Result<Vec<StreamEvent>, LLMError>> {
    let mut event_type = String::new();
    let mut data = String::new();
    for line in event_str.lines() {
        if let Some(et) = line.strip_prefix("event: ") {
            event_type = et.to_string();
        } else if let Some(d) = line.strip_prefix("data: ") {
            data = d.to_string();
        }
    }
    if data.is_empty() {
        return None;
    }
    let json: Value = serde_json::from_str(&data).ok()?;

    match event_type.as_str() {
        "content_block_start" => {
            if json["content_block"]["type"].as_str() == Some("tool_use") {
                *in_flight = Some(InFlightToolUse {
                    id: json["content_block"]["id"].as_str().unwrap_or_default().to_string(),
                    name: json["content_block"]["name"].as_str().unwrap_or_default().to_string(),
                    partial_json: String::new(),
                });
            }
            None
        }
        "content_block_delta" => {
            let delta = &json["delta"];
            match delta["type"].as_str()? {
                "text_delta" => Some(Ok(vec![StreamEvent::Text(delta["text"].as_str()?.to_string())])),
                "input_json_delta" => {
                    if let Some(tu) = in_flight {
                        tu.partial_json.push_str(delta["partial_json"].as_str().unwrap_or(""));
                    }
                    None
                }
                _ => None,
            }
        }
        "content_block_stop" => {
            if let Some(tu) = in_flight.take() {
                let input = serde_json::from_str(&tu.partial_json).unwrap_or_else(|_| json!({}));
                return Some(Ok(vec![StreamEvent::ToolCall(ToolUse { id: tu.id, name: tu.name, input })]));
            }
            None
        }
        "message_delta" => {
            let usage = json["usage"].as_object().map(|u| Usage {
                input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
                output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            });
            usage.map(|u| Ok(vec![StreamEvent::Done(u)]))
        }
        "error" => {
            let message = json["error"]["message"].as_str().unwrap_or("unknown error").to_string();
            Some(Err(LLMError::Provider { status: 500, message }))
        }
        _ => None,
    }
}

fn parse_error_response(status: u16, body: &str) -> LLMError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json["error"]["message"].as_str().unwrap_or("unknown error").to_string();
        match json["error"]["type"].as_str().unwrap_or("") {
            "authentication_error" => LLMError::Auth { message },
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
    fn parses_text_delta_event() {
        let mut in_flight = None;
        let event = "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}";
        let events = parse_event(event, &mut in_flight).unwrap().unwrap();
        assert!(matches!(&events[0], StreamEvent::Text(t) if t == "hi"));
    }

    #[test]
    fn assembles_tool_use_from_start_delta_stop() {
        let mut in_flight = None;
        parse_event(
            "event: content_block_start\ndata: {\"content_block\":{\"type\":\"tool_use\",\"id\":\"call_1\",\"name\":\"read\"}}",
            &mut in_flight,
        );
        parse_event(
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"path\\\":\\\"a.rs\\\"}\"}}",
            &mut in_flight,
        );
        let events = parse_event("event: content_block_stop\ndata: {\"index\":0}", &mut in_flight)
            .unwrap()
            .unwrap();
        match &events[0] {
            StreamEvent::ToolCall(tu) => {
                assert_eq!(tu.id, "call_1");
                assert_eq!(tu.name, "read");
                assert_eq!(tu.input, json!({"path": "a.rs"}));
            }
            _ => panic!("expected ToolCall"),
        }
    }

    #[tokio::test]
    async fn assistant_text_and_tool_calls_roundtrip() {
        let provider = AnthropicProvider::new("https://api.anthropic.com", "key", "claude-test");
        let conv = vec![Message::assistant_with_tool_calls(
            Some("checking".into()),
            vec![ToolUse { id: "call_1".into(), name: "read".into(), input: json!({"path": "a.rs"}) }],
        )];
        let body = provider.build_body("sys", &conv, &[], "claude-test");
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert!(content.iter().any(|b| b["type"] == "text" && b["text"] == "checking"));
        assert!(content.iter().any(|b| b["type"] == "tool_use" && b["name"] == "read"));
    }

    #[test]
    fn consecutive_tool_results_coalesce_into_one_message() {
        let provider = AnthropicProvider::new("https://api.anthropic.com", "key", "claude-test");
        let conv = vec![Message::tool_results(vec![
            super::super::types::ToolResult { tool_call_id: "call_1".into(), content: "ok".into(), is_error: false },
            super::super::types::ToolResult { tool_call_id: "call_2".into(), content: "ok2".into(), is_error: false },
        ])];
        let body = provider.build_body("sys", &conv, &[], "claude-test");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"].as_array().unwrap().len(), 2);
    }
}
