//! Bot contract and the FSM run loop
//!
//! A bot repairs exactly one file. It declares its states and a transition
//! table mapping each non-terminal state to an action; the action does the
//! work for that state and returns the next state. `run()` drives the table
//! until `DONE` or `ERROR` and reports the final state.

use autoremedy_core::{Error, Halt, Result, RunOutcome, State};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Default cap on handler invocations per run.
pub const DEFAULT_MAX_TRANSITIONS: usize = 1000;

/// A state handler. Owns its I/O failures: it must return `State::ERROR`
/// instead of surfacing them.
pub type Action<B> = fn(&mut B) -> State;

/// State → action table for a concrete bot type.
pub struct Transitions<B> {
    table: HashMap<State, Action<B>>,
}

impl<B> Default for Transitions<B> {
    fn default() -> Self { Self::new() }
}

impl<B> Transitions<B> {
    pub fn new() -> Self { Self { table: HashMap::new() } }

    /// Builder-style registration. A second action for the same state replaces the first.
    pub fn on(mut self, state: impl Into<State>, action: Action<B>) -> Self {
        self.table.insert(state.into(), action);
        self
    }

    pub fn get(&self, state: &State) -> Option<Action<B>> {
        self.table.get(state).copied()
    }

    pub fn contains(&self, state: &State) -> bool {
        self.table.contains_key(state)
    }

    pub fn len(&self) -> usize { self.table.len() }

    pub fn is_empty(&self) -> bool { self.table.is_empty() }
}

/// The Bot trait. Implement this to add a remediation.
///
/// Instances are single-use: one construction, one `run()`.
pub trait Bot: Send {
    /// Bot name used in logs (e.g. "MissingReferencesFix").
    fn name(&self) -> &str;

    /// The one file this bot may modify.
    fn file_path(&self) -> &Path;

    /// Every declared state, terminal labels included.
    fn states(&self) -> &[State];

    fn initial_state(&self) -> State { State::INITIAL }

    /// Apply the action registered for `state` and return the next state.
    /// `None` when the table has no entry for `state`.
    fn transition(&mut self, state: &State) -> Option<State>;

    /// Drive the machine to a terminal state. Never fails: a missing handler
    /// or a run past `max_transitions` ends in `ERROR`.
    fn run(&mut self, max_transitions: usize) -> RunOutcome {
        let name = self.name().to_string();
        info!("[{}] Running on '{}'", name, self.file_path().display());

        let mut current = self.initial_state();
        let mut transitions = 0usize;
        let mut halt = None;

        while !current.is_terminal() {
            if transitions >= max_transitions {
                let reason = Halt::TransitionLimit { limit: max_transitions };
                error!("[{}] {} (state '{}'). Halting.", name, reason.clone().into_error(&name), current);
                halt = Some(reason);
                current = State::ERROR;
                break;
            }
            match self.transition(&current) {
                Some(next) => {
                    transitions += 1;
                    debug!("[{}] {} -> {}", name, current, next);
                    current = next;
                }
                None => {
                    let reason = Halt::NoHandler { state: current };
                    error!("[{}] {}. Halting.", name, reason.clone().into_error(&name));
                    halt = Some(reason);
                    current = State::ERROR;
                    break;
                }
            }
        }

        info!("[{}] Finished with state '{}'", name, current);
        RunOutcome { final_state: current, transitions, halt }
    }
}

/// Static registration metadata plus the one-argument constructor.
///
/// The trigger is consumed only by the registry; the bot itself never reads it.
pub trait BotPlugin: Bot + Sized + 'static {
    const NAME: &'static str;
    const TRIGGER: &'static str;

    fn new(file_path: &str) -> Result<Self>;
}

/// Validate a constructor argument. Empty or whitespace-only paths are rejected.
pub fn require_path(file_path: &str) -> Result<PathBuf> {
    let trimmed = file_path.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_input("file path cannot be empty"));
    }
    Ok(PathBuf::from(trimmed))
}
