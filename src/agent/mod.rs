//! Drives the LLM through one step loop per user turn, dispatching tool
//! calls through the tool registry and handling cancellation, mid-run
//! interjections, and context-window-triggered handovers.

pub mod engine;
pub mod prompt;
pub mod ui;

pub use engine::{Agent, SessionSink};
pub use prompt::{PlatformInfo, RepoContextInfo, SystemPromptBuilder};
pub use ui::AgentUi;
