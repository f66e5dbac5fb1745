//! Terminal frontend: a persistent transcript plus a bottom input line over
//! `ratatui`/`crossterm`, in the two modes described by §4.6. `AgentUi` is
//! implemented by `TerminalUi` against state shared with the render loop in
//! `Tui`, so the agent loop never touches the terminal directly.

pub mod mode;
pub mod spinner;
pub mod state;
pub mod terminal;
pub mod ui;

pub use mode::Mode;
pub use spinner::Spinner;
pub use state::TuiState;
pub use terminal::Tui;
pub use ui::TerminalUi;
