//! The agent loop: one `run()` per user turn, stepping the LLM and the tool
//! registry until the model stops asking for tools or the step budget runs
//! out. Cancellation, interjections, and auto-handover all thread through
//! this single state machine.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;

use crate::llm::{LlmManager, Message, StreamEvent, ToolDefinition, ToolResult, ToolUse};
use crate::process::ProcessManager;
use crate::tools;

use super::ui::AgentUi;

/// Safety net, not the normal exit condition: the loop exits as soon as the
/// model replies with no tool calls.
const MAX_STEPS: usize = 50;

/// Sink for the structured session log (§6): `tool_call`, `tool_result`,
/// `error`, and `usage` records all originate here, next to the events they
/// describe, rather than being reconstructed later from the transcript.
/// A trait (not a concrete `SessionLogger`) so the loop doesn't need to know
/// about file placement or JSONL framing.
pub trait SessionSink: Send + Sync {
    fn record(&self, record_type: &str, data: Value);
}

impl SessionSink for () {
    fn record(&self, _record_type: &str, _data: Value) {}
}

/// `AgentState` (§3): everything the loop needs to carry between turns.
pub struct Agent<U: AgentUi> {
    llm: LlmManager,
    processes: ProcessManager,
    tools: Vec<ToolDefinition>,
    ui: Arc<U>,
    session_sink: Option<Arc<dyn SessionSink>>,
    working_dir: PathBuf,
    conversation: Vec<Message>,
    system_prompt: String,
    context_window: Option<u32>,
    handover_threshold: f32,
    last_input_tokens: u32,
    pending_auto_handover: bool,
}

impl<U: AgentUi> Agent<U> {
    pub fn new(
        llm: LlmManager,
        processes: ProcessManager,
        working_dir: PathBuf,
        system_prompt: String,
        context_window: Option<u32>,
        handover_threshold: f32,
        ui: Arc<U>,
    ) -> Self {
        Self {
            llm,
            processes,
            tools: tools::tool_definitions(),
            ui,
            session_sink: None,
            working_dir,
            conversation: Vec::new(),
            system_prompt,
            context_window,
            handover_threshold,
            last_input_tokens: 0,
            pending_auto_handover: false,
        }
    }

    pub fn with_session_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.session_sink = Some(sink);
        self
    }

    fn record(&self, record_type: &str, data: Value) {
        if let Some(sink) = &self.session_sink {
            sink.record(record_type, data);
        }
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn provider_name(&self) -> &str {
        self.llm.provider_name()
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Clean-shutdown exit hook (§5): tears down any shell commands still
    /// running in the background rather than leaving them orphaned.
    pub async fn kill_background_processes(&self) {
        self.processes.kill_all().await;
    }

    /// Atomic swap of the provider adapter; the conversation is preserved
    /// and replayed to the new provider on the next turn. Must only be
    /// called between turns.
    pub fn set_llm(&mut self, client: Arc<dyn crate::llm::LLMProvider>, model: String) {
        self.llm.set_llm(client, model);
    }

    /// Breaks the provider's prompt-cache invariant; use only when external
    /// state (new skills, AGENTS.md) changed between turns.
    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = prompt;
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Surfaces a message in the transcript outside of a running turn, e.g.
    /// for command-dispatch feedback (`/model`, `/help`) that isn't part of
    /// the conversation itself.
    pub fn notify(&self, message: &str) {
        self.ui.info(message);
    }

    pub fn notify_error(&self, message: &str) {
        self.ui.error(message);
    }

    /// Runs one user turn to completion (or to `MAX_STEPS`, or to a
    /// mid-turn handover). Boxed because it and `handover` call each other.
    pub fn run<'a>(&'a mut self, user_prompt: String) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if self.pending_auto_handover && self.context_window.is_some() {
                self.pending_auto_handover = false;
                self.handover(Some(user_prompt)).await;
                return;
            }
            self.run_turn(user_prompt).await;
        })
    }

    async fn run_turn(&mut self, user_prompt: String) {
        self.conversation.push(Message::user(user_prompt));
        self.ui.set_running(true);
        let cancel = self.ui.new_cancel_signal();

        for _ in 0..MAX_STEPS {
            self.drain_interjection();

            let mut stream = match self
                .llm
                .stream(&self.system_prompt, &self.conversation, &self.tools, cancel.clone())
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    self.ui.error(&e.to_string());
                    self.record("error", serde_json::json!({"message": e.to_string()}));
                    break;
                }
            };

            let mut text = String::new();
            let mut tool_calls: Vec<ToolUse> = Vec::new();
            let mut stream_failed = false;

            while let Some(event) = stream.next().await {
                match event {
                    Ok(StreamEvent::Text(t)) => {
                        self.ui.stream_text(&t);
                        text.push_str(&t);
                    }
                    Ok(StreamEvent::ToolCall(tool_use)) => tool_calls.push(tool_use),
                    Ok(StreamEvent::Done(usage)) => {
                        self.last_input_tokens = usage.input_tokens;
                        self.record(
                            "usage",
                            serde_json::json!({"input_tokens": usage.input_tokens, "output_tokens": usage.output_tokens}),
                        );
                    }
                    Err(e) => {
                        if !self.ui.is_cancelled() {
                            self.ui.error(&e.to_string());
                        }
                        self.record("error", serde_json::json!({"message": e.to_string()}));
                        stream_failed = true;
                        break;
                    }
                }
            }
            self.ui.end_stream();

            if stream_failed {
                break;
            }

            let over_threshold = self
                .context_window
                .map(|window| window > 0 && (self.last_input_tokens as f32 / window as f32) >= self.handover_threshold)
                .unwrap_or(false);

            if tool_calls.is_empty() {
                self.conversation.push(Message::assistant(text));
                if over_threshold {
                    self.pending_auto_handover = true;
                }
                if self.drain_interjection() {
                    continue;
                }
                break;
            }

            let assistant_text = if text.is_empty() { None } else { Some(text) };
            self.conversation.push(Message::assistant_with_tool_calls(assistant_text, tool_calls.clone()));

            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                if cancel.is_cancelled() {
                    break;
                }
                let args = normalize_args(&call.input);
                self.ui.tool_call(&call.name, &args);
                self.record("tool_call", serde_json::json!({"name": call.name, "args": args}));
                let outcome = tools::dispatch(&call.name, &args, &self.working_dir, &self.processes).await;
                self.ui.tool_result(&outcome);
                self.record(
                    "tool_result",
                    serde_json::json!({"name": call.name, "output": outcome.output, "is_error": outcome.is_error}),
                );
                results.push(ToolResult {
                    tool_call_id: call.id.clone(),
                    content: outcome.output,
                    is_error: outcome.is_error,
                });
            }
            if !results.is_empty() {
                self.conversation.push(Message::tool_results(results));
            }

            if over_threshold {
                self.handover(None).await;
                return;
            }

            self.drain_interjection();
        }

        self.ui.set_running(false);
    }

    /// Summarizes the conversation, clears it (keeping the system prompt
    /// byte-identical), and continues with a composed prompt. Leaves the
    /// conversation untouched if cancelled or the model returns nothing.
    pub fn handover<'a>(&'a mut self, instructions: Option<String>) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.conversation.push(Message::user(
                "Summarize concisely what has been done so far in this conversation, so the work can continue after context is cleared.",
            ));
            self.ui.set_running(true);
            let cancel = self.ui.new_cancel_signal();
            let mut stream = match self.llm.stream(&self.system_prompt, &self.conversation, &[], cancel.clone()).await {
                Ok(s) => s,
                Err(e) => {
                    self.ui.error(&e.to_string());
                    self.record("error", serde_json::json!({"message": e.to_string()}));
                    self.conversation.pop();
                    self.ui.set_running(false);
                    return;
                }
            };

            let mut summary = String::new();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(StreamEvent::Text(t)) => {
                        self.ui.stream_text(&t);
                        summary.push_str(&t);
                    }
                    Ok(StreamEvent::Done(_)) | Ok(StreamEvent::ToolCall(_)) => {}
                    Err(e) => {
                        if !self.ui.is_cancelled() {
                            self.ui.error(&e.to_string());
                        }
                        break;
                    }
                }
            }
            self.ui.end_stream();

            if self.ui.is_cancelled() || summary.trim().is_empty() {
                self.conversation.pop();
                self.ui.set_running(false);
                return;
            }

            self.clear();
            self.ui.handover_banner();

            let mut prompt = format!(
                "Continue working on the task. Here's a summary of what was done previously:\n\n{}",
                summary.trim()
            );
            if let Some(instructions) = instructions.filter(|s| !s.is_empty()) {
                prompt.push_str(&format!("\n\nAdditional instructions: {instructions}"));
            }

            self.run(prompt).await;
        })
    }

    /// Drains queued input (if any) into one `User` message, joined by
    /// newlines. Returns whether anything was drained.
    fn drain_interjection(&mut self) -> bool {
        let queued = self.ui.drain_running_input();
        if queued.is_empty() {
            return false;
        }
        let joined = queued.join("\n");
        self.ui.interjection(&joined);
        self.conversation.push(Message::user(joined));
        true
    }
}

/// An unparseable or non-object tool argument becomes an empty object plus
/// a visible error rather than aborting the step.
fn normalize_args(input: &Value) -> Value {
    if input.is_object() {
        input.clone()
    } else {
        serde_json::json!({})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{LLMProvider, StreamBox};
    use crate::llm::LLMError;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    type Script = Vec<Result<StreamEvent, LLMError>>;

    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Script>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Script>) -> Self {
            Self { scripts: Mutex::new(scripts.into_iter().collect()) }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-model"
        }

        async fn stream(
            &self,
            _system_prompt: &str,
            _conversation: &[Message],
            _tools: &[ToolDefinition],
            _model: &str,
            cancel: CancellationToken,
        ) -> Result<StreamBox, LLMError> {
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            Ok(Box::pin(stream::unfold((script.into_iter(), cancel), |(mut it, cancel)| async move {
                // Check-after-sleep lets an external cancel() land between items.
                tokio::time::sleep(Duration::from_millis(5)).await;
                if cancel.is_cancelled() {
                    return None;
                }
                let next = it.next()?;
                Some((next, (it, cancel)))
            })))
        }
    }

    #[derive(Default)]
    struct TestUi {
        token: Mutex<Option<CancellationToken>>,
        queue: Mutex<VecDeque<String>>,
        running: Mutex<bool>,
    }

    impl TestUi {
        fn push_queued(&self, line: impl Into<String>) {
            self.queue.lock().unwrap().push_back(line.into());
        }

        fn cancel(&self) {
            if let Some(token) = self.token.lock().unwrap().as_ref() {
                token.cancel();
            }
        }
    }

    impl AgentUi for TestUi {
        fn set_running(&self, running: bool) {
            *self.running.lock().unwrap() = running;
        }

        fn new_cancel_signal(&self) -> CancellationToken {
            let token = CancellationToken::new();
            *self.token.lock().unwrap() = Some(token.clone());
            token
        }

        fn is_cancelled(&self) -> bool {
            self.token.lock().unwrap().as_ref().map(|t| t.is_cancelled()).unwrap_or(false)
        }

        fn drain_running_input(&self) -> Vec<String> {
            self.queue.lock().unwrap().drain(..).collect()
        }

        fn stream_text(&self, _text: &str) {}
        fn end_stream(&self) {}
        fn interjection(&self, _text: &str) {}
        fn tool_call(&self, _name: &str, _args: &Value) {}
        fn tool_result(&self, _outcome: &tools::ToolOutcome) {}
        fn info(&self, _message: &str) {}
        fn error(&self, _message: &str) {}
        fn handover_banner(&self) {}
    }

    fn new_agent(ui: Arc<TestUi>, provider: ScriptedProvider) -> Agent<TestUi> {
        let llm = LlmManager::new(Arc::new(provider), "scripted-model".into());
        let processes = ProcessManager::new(std::env::temp_dir());
        Agent::new(llm, processes, std::env::temp_dir(), "be terse".into(), None, 0.8, ui)
    }

    #[tokio::test]
    async fn cancel_mid_stream_keeps_partial_text() {
        let ui = Arc::new(TestUi::default());
        let provider = ScriptedProvider::new(vec![vec![Ok(StreamEvent::Text("Hello ".into())), Ok(StreamEvent::Text("World".into()))]]);
        let mut agent = new_agent(ui.clone(), provider);

        let ui_for_cancel = ui.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(7)).await;
            ui_for_cancel.cancel();
        });

        agent.run("go".to_string()).await;

        assert!(ui.is_cancelled());
        assert_eq!(agent.conversation().len(), 2);
        let assistant_text = agent.conversation()[1].text();
        assert_eq!(assistant_text, "Hello ");
    }

    #[tokio::test]
    async fn interjection_and_next_turn_stay_separate() {
        let ui = Arc::new(TestUi::default());
        let provider = ScriptedProvider::new(vec![
            vec![
                Ok(StreamEvent::ToolCall(ToolUse { id: "call_1".into(), name: "unknown_tool".into(), input: serde_json::json!({}) })),
                Ok(StreamEvent::Done(crate::llm::Usage::default())),
            ],
            vec![Ok(StreamEvent::Text("final reply".into())), Ok(StreamEvent::Done(crate::llm::Usage::default()))],
        ]);
        let mut agent = new_agent(ui.clone(), provider);

        let ui_for_input = ui.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(8)).await;
            ui_for_input.push_queued("typed while running");
        });

        agent.run("first prompt".to_string()).await;

        let texts: Vec<String> = agent.conversation().iter().map(|m| m.text()).collect();
        assert!(texts.contains(&"typed while running".to_string()));
        assert!(texts.contains(&"final reply".to_string()));
        // The interjection must be its own message, not fused onto the tool-call step.
        let interjection_idx = texts.iter().position(|t| t == "typed while running").unwrap();
        assert_eq!(texts[interjection_idx], "typed while running");

        let provider2 = ScriptedProvider::new(vec![vec![Ok(StreamEvent::Text("second reply".into())), Ok(StreamEvent::Done(crate::llm::Usage::default()))]]);
        agent.set_llm(Arc::new(provider2), "scripted-model-2".into());
        agent.run("second prompt".to_string()).await;

        let final_texts: Vec<String> = agent.conversation().iter().map(|m| m.text()).collect();
        let second_prompt_idx = final_texts.iter().position(|t| t == "second prompt").unwrap();
        // The new turn's user message stands alone; it wasn't appended onto
        // the prior interjection or merged with anything else.
        assert_eq!(final_texts[second_prompt_idx], "second prompt");
        assert_eq!(final_texts.last().unwrap(), "second reply");
    }
}
