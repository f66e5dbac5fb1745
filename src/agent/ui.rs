//! The contract the agent loop drives the terminal through (§4.6). Kept as a
//! trait so `engine.rs` can be built and tested well ahead of the real
//! `ratatui` frontend; the eventual TUI is just another implementor.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tools::ToolOutcome;

/// Everything the agent loop needs from the terminal: running-state toggle,
/// cancellation, the interjection queue, and the handful of render calls
/// that turn loop events into screen output.
pub trait AgentUi: Send + Sync {
    /// Toggles Prompting vs Running mode; Running captures keystrokes into
    /// the input queue instead of reading a line.
    fn set_running(&self, running: bool);

    /// A fresh abort handle for the run about to start. Cancelling it is the
    /// Escape key's only effect; it is safe to cancel at most once per run.
    fn new_cancel_signal(&self) -> CancellationToken;

    /// Whether the signal handed out by the most recent `new_cancel_signal`
    /// call has fired.
    fn is_cancelled(&self) -> bool;

    /// Non-blocking drain of whatever lines were queued while the agent was
    /// running. Empty when nothing was typed.
    fn drain_running_input(&self) -> Vec<String>;

    /// An assistant text delta, forwarded to the streaming sink.
    fn stream_text(&self, text: &str);

    /// Closes the current streamed line; always called once per step even
    /// if no text arrived, so tool-call output never intermixes with it.
    fn end_stream(&self);

    /// Echoes a drained interjection back as a "queued:" line.
    fn interjection(&self, text: &str);

    fn tool_call(&self, name: &str, args: &Value);

    fn tool_result(&self, outcome: &ToolOutcome);

    fn info(&self, message: &str);

    fn error(&self, message: &str);

    /// Shown right after a handover clears the conversation.
    fn handover_banner(&self);
}
