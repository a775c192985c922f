//! Audit-log dispatch: line cleaning, target extraction, and the
//! sequential log-file walk.

use crate::registry::BotRegistry;
use autoremedy_core::{Error, Result, RunOutcome};
use regex::Regex;
use serde::Serialize;
use std::any::Any;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{error, info, warn};

/// Separator preceding the target path in "... in: <path>" findings.
pub const IN_DELIMITER: &str = " in: ";

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ANSI pattern compiles"));

static LEADING_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):\d+").expect("location pattern compiles"));

/// Remove terminal color codes (ESC [ digits/semicolons m).
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(line, "")
}

/// Target file for a cleaned line: the text after the last " in: ", else a
/// leading `path:line` location. `None` when neither yields a non-empty path.
pub fn extract_file_path(clean_line: &str) -> Option<String> {
    if let Some((_, tail)) = clean_line.rsplit_once(IN_DELIMITER) {
        let path = tail.trim();
        if !path.is_empty() {
            return Some(path.to_string());
        }
    }
    LEADING_LOCATION
        .captures(clean_line)
        .map(|c| c[1].trim().to_string())
        .filter(|p| !p.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// No trigger occurs in the line.
    NoMatch,
    /// A trigger matched but no file path could be derived.
    NoPath { bot: String },
    /// The bot could not be constructed, or panicked while running.
    Failed { bot: String, file_path: String, error: String },
    /// The bot ran to a terminal state.
    Completed { bot: String, file_path: String, outcome: RunOutcome },
}

impl DispatchOutcome {
    /// Whether a bot was constructed and run.
    pub fn invoked(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn bot(&self) -> Option<&str> {
        match self {
            Self::NoMatch => None,
            Self::NoPath { bot } | Self::Failed { bot, .. } | Self::Completed { bot, .. } => Some(bot),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogSummary {
    pub log_path: PathBuf,
    pub log_found: bool,
    pub lines: usize,
    /// One entry per line, in file order.
    pub outcomes: Vec<DispatchOutcome>,
}

impl LogSummary {
    fn missing(log_path: &Path) -> Self {
        Self { log_path: log_path.to_path_buf(), log_found: false, lines: 0, outcomes: Vec::new() }
    }

    pub fn invocations(&self) -> usize {
        self.outcomes.iter().filter(|o| o.invoked()).count()
    }

    pub fn repaired(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DispatchOutcome::Completed { outcome, .. } if outcome.is_done()))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| match o {
                DispatchOutcome::Failed { .. } | DispatchOutcome::NoPath { .. } => true,
                DispatchOutcome::Completed { outcome, .. } => !outcome.is_done(),
                DispatchOutcome::NoMatch => false,
            })
            .count()
    }
}

impl BotRegistry {
    /// Match one audit-log line against the registered triggers and run the
    /// first matching bot. Failures stay inside the returned outcome.
    pub fn dispatch(&self, raw_line: &str) -> DispatchOutcome {
        let clean_line = strip_ansi(raw_line);
        let clean_line = clean_line.trim();

        let Some(descriptor) = self.match_line(clean_line) else {
            return DispatchOutcome::NoMatch;
        };

        let Some(file_path) = extract_file_path(clean_line) else {
            warn!("{}", Error::PathExtraction(clean_line.to_string()));
            return DispatchOutcome::NoPath { bot: descriptor.name.clone() };
        };

        info!("Dispatching '{}' for file: {}", descriptor.name, file_path);
        let max_transitions = self.max_transitions();
        let run = panic::catch_unwind(AssertUnwindSafe(|| {
            descriptor.build(&file_path).map(|mut bot| bot.run(max_transitions))
        }));
        match run {
            Ok(Ok(outcome)) => DispatchOutcome::Completed { bot: descriptor.name.clone(), file_path, outcome },
            Ok(Err(e)) => {
                error!("Failed to instantiate bot {} for {}: {}", descriptor.name, file_path, e);
                DispatchOutcome::Failed { bot: descriptor.name.clone(), file_path, error: e.to_string() }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Bot {} panicked on {}: {}", descriptor.name, file_path, message);
                DispatchOutcome::Failed {
                    bot: descriptor.name.clone(),
                    file_path,
                    error: format!("panicked: {}", message),
                }
            }
        }
    }

    /// Dispatch every line of an audit log, strictly in file order and one at
    /// a time. A missing log is a warning, not an error.
    ///
    /// The log is read without locking: callers must only invoke this once the
    /// process writing it has exited.
    pub fn run_on_log_file(&self, log_path: &Path) -> Result<LogSummary> {
        if !log_path.exists() {
            warn!("Audit log file not found at '{}'. Nothing to process.", log_path.display());
            return Ok(LogSummary::missing(log_path));
        }

        info!("Starting bot dispatch for log file: '{}'", log_path.display());
        let mut reader = BufReader::new(File::open(log_path)?);
        let mut summary = LogSummary {
            log_path: log_path.to_path_buf(),
            log_found: true,
            lines: 0,
            outcomes: Vec::new(),
        };

        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            summary.lines += 1;
            summary.outcomes.push(self.dispatch(&line));
        }

        info!(
            "Bot dispatch finished: {} lines, {} bots run, {} repaired, {} failed",
            summary.lines,
            summary.invocations(),
            summary.repaired(),
            summary.failures()
        );
        Ok(summary)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
