//! # percepto-memory
//!
//! Persistent state for the Percepto assistant:
//!
//! - **Memory store**: embedding-indexed records (facts, remembered
//!   statements, summaries) in SQLite, searched by cosine similarity and
//!   replaced wholesale through a shadow collection during consolidation.
//! - **Transcript store**: conversations, their messages, and the running
//!   interaction counter that drives consolidation.

pub mod record;
pub mod similarity;
pub mod store;
pub mod transcripts;

pub use record::{MemoryKind, MemoryRecord, RecordFilter, ScoredRecord};
pub use similarity::cosine_similarity;
pub use store::{MemoryStore, ShadowCollection};
pub use transcripts::{Conversation, InteractionCounter, SavedMessage, StoredMessage, TranscriptStore};
