//! Which of the two input modes (§4.6) is currently active.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Prompting,
    Running,
}

impl Mode {
    pub fn is_running(&self) -> bool {
        matches!(self, Mode::Running)
    }
}
