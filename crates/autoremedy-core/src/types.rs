//! Core types for Autoremedy

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::Error;

/// FSM state label. Bots declare their own labels; three are reserved.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(Cow<'static, str>);

impl State {
    /// Conventional starting state.
    pub const INITIAL: State = State(Cow::Borrowed("INITIAL"));
    /// Terminal: remediation applied.
    pub const DONE: State = State(Cow::Borrowed("DONE"));
    /// Terminal: remediation abandoned.
    pub const ERROR: State = State(Cow::Borrowed("ERROR"));

    pub const fn from_static(label: &'static str) -> Self {
        Self(Cow::Borrowed(label))
    }

    pub fn new(label: impl Into<String>) -> Self {
        Self(Cow::Owned(label.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::DONE || *self == Self::ERROR
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for State {
    fn from(s: &'static str) -> Self {
        Self::from_static(s)
    }
}

impl From<String> for State {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Why a run was forced into `ERROR` by the run loop rather than by a handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Halt {
    NoHandler { state: State },
    TransitionLimit { limit: usize },
}

impl Halt {
    pub fn into_error(self, bot: impl Into<String>) -> Error {
        match self {
            Self::NoHandler { state } => Error::no_handler(bot, state.as_str()),
            Self::TransitionLimit { limit } => Error::transition_limit(bot, limit),
        }
    }
}

impl std::fmt::Display for Halt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHandler { state } => write!(f, "no handler for state '{}'", state),
            Self::TransitionLimit { limit } => {
                write!(f, "transition limit exceeded ({} transitions)", limit)
            }
        }
    }
}

/// Result of one bot run. The only observable output besides file side effects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub final_state: State,
    /// Handler invocations performed.
    pub transitions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt: Option<Halt>,
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        self.final_state == State::DONE
    }
}
