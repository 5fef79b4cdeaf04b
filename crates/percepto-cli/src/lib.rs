//! # percepto-cli
//!
//! Command-line interface for the Percepto assistant.
//!
//! ## Commands
//!
//! - `percepto ask`: Answer one query
//! - `percepto chat`: Interactive chat in the terminal
//! - `percepto seed`: Store the configured facts in memory
//! - `percepto consolidate`: Summarize and rebuild memory
//! - `percepto memory`: Inspect and search memory records
//! - `percepto conversations`: Browse saved conversations
//! - `percepto config`: Show configuration
//! - `percepto status`: Show memory and tool status

pub mod commands;

pub use commands::Cli;
