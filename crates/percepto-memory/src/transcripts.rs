use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use percepto_core::{ConversationId, MessageId, PerceptoError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const INTERACTIONS_KEY: &str = "total_interactions_count";

fn db_err(e: impl std::fmt::Display) -> PerceptoError {
    PerceptoError::Transcript(e.to_string())
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(db_err)
}

/// Running count of saved interactions, read and reset by consolidation.
pub trait InteractionCounter: Send + Sync {
    fn count(&self) -> Result<u64>;
    fn reset(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub user_input: String,
    pub ai_response: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of saving one interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedMessage {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    /// True when saving this message created the conversation.
    pub new_conversation: bool,
    /// Interaction counter after the save.
    pub interaction_count: u64,
}

/// Relational log of conversations and their messages.
#[derive(Clone)]
pub struct TranscriptStore {
    db: Arc<Mutex<Connection>>,
}

impl TranscriptStore {
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening transcript store");
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        // The memory and transcript stores share one file through separate connections.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(db_err)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                user_input TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .map_err(db_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, '0')",
            params![INTERACTIONS_KEY],
        )
        .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an empty conversation and return its id.
    pub fn create_conversation(&self) -> Result<ConversationId> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO conversations (title, created_at) VALUES (NULL, ?1)",
            params![now()],
        )
        .map_err(db_err)?;
        let id = db.last_insert_rowid();
        debug!(conversation_id = id, "conversation created");
        Ok(id)
    }

    /// The most recently created conversation, if any.
    pub fn latest_conversation_id(&self) -> Result<Option<ConversationId>> {
        let db = self.db.lock();
        db.query_row(
            "SELECT id FROM conversations ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    /// Save one interaction and bump the interaction counter.
    ///
    /// `conversation = None` appends to the latest conversation, creating one
    /// if none exists. A source URL is appended to the stored response.
    pub fn save_message(
        &self,
        user_input: &str,
        ai_response: &str,
        source_url: Option<&str>,
        conversation: Option<ConversationId>,
    ) -> Result<SavedMessage> {
        let full_response = match source_url {
            Some(url) => format!("{ai_response}\n\nSources Links: {url}"),
            None => ai_response.to_string(),
        };

        let mut db = self.db.lock();
        let tx = db.transaction().map_err(db_err)?;

        let existing = match conversation {
            Some(id) => {
                let found: Option<i64> = tx
                    .query_row("SELECT id FROM conversations WHERE id = ?1", params![id], |r| r.get(0))
                    .optional()
                    .map_err(db_err)?;
                if found.is_none() {
                    return Err(PerceptoError::Transcript(format!("conversation {id} not found")));
                }
                found
            }
            None => tx
                .query_row(
                    "SELECT id FROM conversations ORDER BY created_at DESC, id DESC LIMIT 1",
                    [],
                    |r| r.get(0),
                )
                .optional()
                .map_err(db_err)?,
        };

        let (conversation_id, new_conversation) = match existing {
            Some(id) => (id, false),
            None => {
                tx.execute(
                    "INSERT INTO conversations (title, created_at) VALUES (NULL, ?1)",
                    params![now()],
                )
                .map_err(db_err)?;
                (tx.last_insert_rowid(), true)
            }
        };

        tx.execute(
            "INSERT INTO messages (conversation_id, user_input, ai_response, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, user_input, full_response, now()],
        )
        .map_err(db_err)?;
        let message_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE settings SET value = CAST(value AS INTEGER) + 1 WHERE key = ?1",
            params![INTERACTIONS_KEY],
        )
        .map_err(db_err)?;
        let count: String = tx
            .query_row("SELECT value FROM settings WHERE key = ?1", params![INTERACTIONS_KEY], |r| {
                r.get(0)
            })
            .map_err(db_err)?;

        tx.commit().map_err(db_err)?;

        let interaction_count = count.parse::<u64>().map_err(db_err)?;
        debug!(conversation_id, message_id, interaction_count, "message saved");
        Ok(SavedMessage {
            conversation_id,
            message_id,
            new_conversation,
            interaction_count,
        })
    }

    /// Conversations, newest first.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT c.id, c.title, c.created_at, COUNT(m.id)
                 FROM conversations c LEFT JOIN messages m ON m.conversation_id = c.id
                 GROUP BY c.id ORDER BY c.created_at DESC, c.id DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(id, title, created_at, count)| {
                Ok(Conversation {
                    id,
                    title,
                    created_at: parse_time(&created_at)?,
                    message_count: count as usize,
                })
            })
            .collect()
    }

    /// A single conversation by id.
    pub fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        Ok(self.list_conversations()?.into_iter().find(|c| c.id == id))
    }

    /// Messages of a conversation in chronological order, at most `limit`.
    pub fn messages(&self, conversation_id: ConversationId, limit: usize) -> Result<Vec<StoredMessage>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT id, conversation_id, user_input, ai_response, timestamp
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY timestamp ASC, id ASC LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![conversation_id, limit as i64], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                ))
            })
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(id, conversation_id, user_input, ai_response, timestamp)| {
                Ok(StoredMessage {
                    id,
                    conversation_id,
                    user_input,
                    ai_response,
                    timestamp: parse_time(&timestamp)?,
                })
            })
            .collect()
    }

    /// Set a conversation's title. Returns false if the conversation does not exist.
    pub fn update_title(&self, conversation_id: ConversationId, title: &str) -> Result<bool> {
        let db = self.db.lock();
        let rows = db
            .execute(
                "UPDATE conversations SET title = ?1 WHERE id = ?2",
                params![title, conversation_id],
            )
            .map_err(db_err)?;
        Ok(rows > 0)
    }
}

impl InteractionCounter for TranscriptStore {
    fn count(&self) -> Result<u64> {
        let db = self.db.lock();
        let value: Option<String> = db
            .query_row("SELECT value FROM settings WHERE key = ?1", params![INTERACTIONS_KEY], |r| {
                r.get(0)
            })
            .optional()
            .map_err(db_err)?;
        match value {
            Some(v) => v.parse::<u64>().map_err(db_err),
            None => Ok(0),
        }
    }

    fn reset(&self) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO settings (key, value) VALUES (?1, '0')
             ON CONFLICT(key) DO UPDATE SET value = '0'",
            params![INTERACTIONS_KEY],
        )
        .map_err(db_err)?;
        info!("interaction counter reset");
        Ok(())
    }
}
