//! Individual bot implementations.
//!
//! Each bot is a self-contained module. To add a new bot:
//! 1. Create a new file in this directory
//! 2. Implement `Bot` and `BotPlugin`
//! 3. Add `pub mod <name>;` here
//! 4. Register it in create_registry() in ../lib.rs

pub mod missing_references;
