//! # percepto-runtime
//!
//! The assistant runtime: turns a user query into a routed answer and keeps
//! long-term memory bounded.
//!
//! ## Flow
//!
//! ```text
//!   query ──► embed ──► similarity search ──► prompt ──► LLM
//!                                                        │
//!                                                        ▼
//!                                          ┌──────── Router ────────┐
//!                                          │ question / statement   │
//!                                          │ use_*_tool ─► retriever│
//!                                          └───────────┬────────────┘
//!                                                      ▼
//!                          answer ──► transcript ──► counter ──► consolidation
//!                                                               (cluster, summarize,
//!                                                                rebuild collection)
//! ```

pub mod assistant;
pub mod clustering;
pub mod consolidation;
pub mod context;
pub mod pipeline;
pub mod prompt;
pub mod router;
pub mod seed;

pub use assistant::{Assistant, ConversationTarget, Interaction, generate_title};
pub use clustering::{Cluster, cluster_records};
pub use consolidation::{
    ConsolidationEngine, ConsolidationOutcome, ConsolidationReport, ConsolidationState,
};
pub use context::{AssistantContext, build_test_context};
pub use pipeline::{QueryPipeline, QueryResponse};
pub use router::{RouteDecision, TOOL_FAILURE_REPLY, TOOL_ROUTES, classify, route};
pub use seed::{SeedReport, seed_facts};
