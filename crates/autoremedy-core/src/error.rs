//! Error types for Autoremedy

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config not found: {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no handler for state '{state}' in {bot}")]
    NoHandlerForState { bot: String, state: String },

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("duplicate trigger '{trigger}': {existing} vs {incoming}")]
    DuplicateTrigger {
        trigger: String,
        existing: String,
        incoming: String,
    },

    #[error("could not extract file path from: {0}")]
    PathExtraction(String),

    #[error("audit script failed (exit code {code:?}): {stderr}")]
    SubprocessFailure { code: Option<i32>, stderr: String },

    #[error("transition limit exceeded in {bot} after {limit} transitions")]
    TransitionLimitExceeded { bot: String, limit: usize },

    #[error("no bots registered")]
    NoBotsRegistered,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn no_handler(bot: impl Into<String>, state: impl Into<String>) -> Self {
        Self::NoHandlerForState {
            bot: bot.into(),
            state: state.into(),
        }
    }

    pub fn transition_limit(bot: impl Into<String>, limit: usize) -> Self {
        Self::TransitionLimitExceeded {
            bot: bot.into(),
            limit,
        }
    }

    /// Whether the failure stops the process rather than one bot, line, or cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoBotsRegistered)
    }
}
