//! Autoremedy Bots: FSM bot contract, registry, and audit-log dispatch
//!
//! Each bot is a self-contained file in src/bots/.
//! To add a bot: create the file, implement Bot + BotPlugin, register below.
//! To remove a bot: delete the file, remove from mod.rs and registry below.

pub mod bot;
pub mod bots;
pub mod dispatch;
pub mod registry;

pub use bot::{require_path, Action, Bot, BotPlugin, Transitions, DEFAULT_MAX_TRANSITIONS};
pub use bots::missing_references::MissingReferencesFix;
pub use dispatch::{extract_file_path, strip_ansi, DispatchOutcome, LogSummary};
pub use registry::{BotDescriptor, BotFactory, BotRegistry, DuplicatePolicy, Registration};

/// Create the default registry with all builtin bots.
pub fn create_default_registry() -> BotRegistry {
    create_registry(DuplicatePolicy::default(), DEFAULT_MAX_TRANSITIONS)
}

/// Create the builtin registry with an explicit collision policy and run cap.
///
/// Edit this function to add or remove bots. Order matters: it is the order
/// triggers are tested against each log line.
pub fn create_registry(policy: DuplicatePolicy, max_transitions: usize) -> BotRegistry {
    let mut registry = BotRegistry::new()
        .with_policy(policy)
        .with_max_transitions(max_transitions);

    // --- Documentation fixes ---
    registry.register_bot::<MissingReferencesFix>();

    registry
}
