//! Bot registry: trigger string → bot constructor
//!
//! Registration is explicit and happens once at startup (see
//! create_registry() in lib.rs). Triggers are kept in registration order,
//! which is also the order they are tested against each log line.

use crate::bot::{Bot, BotPlugin, DEFAULT_MAX_TRANSITIONS};
use autoremedy_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// One-argument constructor: target file path → ready-to-run bot.
pub type BotFactory = Arc<dyn Fn(&str) -> Result<Box<dyn Bot>> + Send + Sync>;

#[derive(Clone)]
pub struct BotDescriptor {
    pub name: String,
    pub trigger: String,
    pub factory: BotFactory,
}

impl BotDescriptor {
    pub fn new<F>(name: impl Into<String>, trigger: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> Result<Box<dyn Bot>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            trigger: trigger.into(),
            factory: Arc::new(factory),
        }
    }

    /// Descriptor for a statically known bot type.
    pub fn of<B: BotPlugin>() -> Self {
        Self::new(B::NAME, B::TRIGGER, |path: &str| {
            Ok(Box::new(B::new(path)?) as Box<dyn Bot>)
        })
    }

    pub fn build(&self, file_path: &str) -> Result<Box<dyn Bot>> {
        (self.factory)(file_path)
    }
}

impl std::fmt::Debug for BotDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotDescriptor")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// What happens when a trigger is registered twice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The most recent registration replaces the earlier one.
    #[default]
    LastWins,
    /// The earliest registration is kept; later ones are dropped.
    FirstWins,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LastWins => write!(f, "last-wins"),
            Self::FirstWins => write!(f, "first-wins"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// LastWins collision. `previous` names the bot that was displaced.
    Replaced { previous: String },
    /// FirstWins collision. `kept` names the bot that stays registered.
    Ignored { kept: String },
    /// Empty trigger.
    Rejected,
}

pub struct BotRegistry {
    bots: Vec<BotDescriptor>,
    policy: DuplicatePolicy,
    max_transitions: usize,
}

impl Default for BotRegistry {
    fn default() -> Self { Self::new() }
}

impl BotRegistry {
    pub fn new() -> Self {
        Self {
            bots: Vec::new(),
            policy: DuplicatePolicy::default(),
            max_transitions: DEFAULT_MAX_TRANSITIONS,
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_transitions(mut self, max_transitions: usize) -> Self {
        self.max_transitions = max_transitions;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy { self.policy }

    pub fn max_transitions(&self) -> usize { self.max_transitions }

    /// Register a bot. A replaced descriptor keeps the slot of the first
    /// registration for its trigger, so iteration order never depends on
    /// which duplicate won.
    pub fn register(&mut self, descriptor: BotDescriptor) -> Registration {
        if descriptor.trigger.is_empty() {
            warn!("Bot '{}' is missing a trigger. Not registered.", descriptor.name);
            return Registration::Rejected;
        }

        let Some(slot) = self.bots.iter().position(|b| b.trigger == descriptor.trigger) else {
            info!("Registered bot '{}' for trigger: '{}'", descriptor.name, descriptor.trigger);
            self.bots.push(descriptor);
            return Registration::Added;
        };

        let existing = self.bots[slot].name.clone();
        let collision = Error::DuplicateTrigger {
            trigger: descriptor.trigger.clone(),
            existing: existing.clone(),
            incoming: descriptor.name.clone(),
        };
        match self.policy {
            DuplicatePolicy::LastWins => {
                warn!("{}; keeping '{}' ({})", collision, descriptor.name, self.policy);
                self.bots[slot] = descriptor;
                Registration::Replaced { previous: existing }
            }
            DuplicatePolicy::FirstWins => {
                warn!("{}; keeping '{}' ({})", collision, existing, self.policy);
                Registration::Ignored { kept: existing }
            }
        }
    }

    pub fn register_bot<B: BotPlugin>(&mut self) -> Registration {
        self.register(BotDescriptor::of::<B>())
    }

    pub fn get(&self, trigger: &str) -> Option<&BotDescriptor> {
        self.bots.iter().find(|b| b.trigger == trigger)
    }

    /// First descriptor, in registration order, whose trigger occurs in `clean_line`.
    pub fn match_line(&self, clean_line: &str) -> Option<&BotDescriptor> {
        self.bots.iter().find(|b| clean_line.contains(b.trigger.as_str()))
    }

    /// (name, trigger) pairs in registration order.
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.bots.iter().map(|b| (b.name.as_str(), b.trigger.as_str())).collect()
    }

    /// A registry with no bots cannot repair anything: `Error::NoBotsRegistered`.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.bots.is_empty() {
            return Err(Error::NoBotsRegistered);
        }
        Ok(())
    }

    pub fn len(&self) -> usize { self.bots.len() }

    pub fn is_empty(&self) -> bool { self.bots.is_empty() }
}
