// Top-level error type - unifies the subsystem errors into one surface for main.rs.
#![allow(dead_code)]

use thiserror::Error;

use crate::hashline::HashlineError;
use crate::llm::LLMError;
use crate::process::ProcessError;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("hashline error: {0}")]
    Hashline(#[from] HashlineError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NavError>;
