//! MissingReferencesFix: append a standard references section to a document

use crate::bot::{require_path, Bot, BotPlugin, Transitions};
use autoremedy_core::{Result, State};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Appended verbatim. Not checked for an existing block.
pub const REFERENCES_BLOCK: &str = "\n\n### References\n- See /reference_vault/README.md\n";

pub struct MissingReferencesFix {
    file_path: PathBuf,
    states: Vec<State>,
    transitions: Transitions<Self>,
}

impl MissingReferencesFix {
    fn append_references(&mut self) -> State {
        info!("[{}] Applying fix to {}...", Self::NAME, self.file_path.display());

        if !self.file_path.is_file() {
            error!("[{}] File not found at '{}'. Transitioning to ERROR.", Self::NAME, self.file_path.display());
            return State::ERROR;
        }

        // append(true) without create(true): a file removed since the check is not recreated
        let written = OpenOptions::new()
            .append(true)
            .open(&self.file_path)
            .and_then(|mut f| f.write_all(REFERENCES_BLOCK.as_bytes()));

        match written {
            Ok(()) => {
                info!("[{}] Successfully applied fix.", Self::NAME);
                State::DONE
            }
            Err(e) => {
                error!("[{}] Failed to write to {}: {}", Self::NAME, self.file_path.display(), e);
                State::ERROR
            }
        }
    }
}

impl BotPlugin for MissingReferencesFix {
    const NAME: &'static str = "MissingReferencesFix";
    const TRIGGER: &'static str = "Missing References section";

    fn new(file_path: &str) -> Result<Self> {
        Ok(Self {
            file_path: require_path(file_path)?,
            states: vec![State::INITIAL, State::DONE, State::ERROR],
            transitions: Transitions::new().on(State::INITIAL, Self::append_references),
        })
    }
}

impl Bot for MissingReferencesFix {
    fn name(&self) -> &str { Self::NAME }

    fn file_path(&self) -> &Path { &self.file_path }

    fn states(&self) -> &[State] { &self.states }

    fn transition(&mut self, state: &State) -> Option<State> {
        let action = self.transitions.get(state)?;
        Some(action(self))
    }
}
