use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a memory record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// A seeded fact about the user.
    Fact,
    /// A statement the user made during a conversation.
    Conversation,
    /// A consolidated summary of a cluster of records.
    Summary,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Fact => "fact",
            MemoryKind::Conversation => "conversation",
            MemoryKind::Summary => "summary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(MemoryKind::Fact),
            "conversation" => Some(MemoryKind::Conversation),
            "summary" => Some(MemoryKind::Summary),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of long-term memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub kind: MemoryKind,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// A new record with a fresh id, stamped now (microsecond precision, as stored).
    pub fn new(content: impl Into<String>, embedding: Vec<f32>, kind: MemoryKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            embedding,
            kind,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}

/// Which records a query should see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFilter {
    #[default]
    Any,
    Only(MemoryKind),
    Except(MemoryKind),
}

impl RecordFilter {
    pub fn matches(self, kind: MemoryKind) -> bool {
        match self {
            RecordFilter::Any => true,
            RecordFilter::Only(k) => kind == k,
            RecordFilter::Except(k) => kind != k,
        }
    }

    /// SQL predicate on the `kind` column, bound to parameter `?2`.
    pub(crate) fn sql(self) -> (&'static str, Option<&'static str>) {
        match self {
            RecordFilter::Any => ("", None),
            RecordFilter::Only(k) => (" AND kind = ?2", Some(k.as_str())),
            RecordFilter::Except(k) => (" AND kind != ?2", Some(k.as_str())),
        }
    }
}

/// A record returned by similarity search with its score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f32,
}
