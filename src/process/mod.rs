//! Shell executor: races command completion against a wait budget and
//! transparently backgrounds long-running commands.

pub mod buffer;
pub mod manager;

pub use buffer::{OutputBuffer, MAX_OUTPUT_BYTES};
pub use manager::{ProcessManager, ProcessStatus, ShellResult};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("spawned process reported no pid")]
    NoPid,

    #[error("failed while waiting on process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("no tracked process with pid {0}")]
    NotFound(u32),
}
