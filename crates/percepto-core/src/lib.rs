//! # percepto-core
//!
//! Core types, traits, and primitives shared by every crate in the Percepto
//! workspace: the unified error type, chat messages, route kinds, and the
//! tool retriever contract.

pub mod error;
pub mod message;
pub mod tool;
pub mod types;

pub use error::{PerceptoError, Result};
pub use message::{Message, Role};
pub use tool::{ToolAnswer, ToolRetriever};
pub use types::*;
