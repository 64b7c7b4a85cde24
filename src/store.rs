//! Conversation history
//!
//! Every completed request is saved as one record: what the user asked,
//! which agent or pattern answered, and the final document.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Conversation store lock poisoned")]
    Lock,
}

/// A conversation to be saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub user_input: String,
    /// Agent wire name, or `collaborative:<pattern>`
    pub agent_type: String,
    pub ai_output: String,
    pub metadata: serde_json::Value,
}

/// A saved conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_input: String,
    pub agent_type: String,
    pub ai_output: String,
    pub metadata: serde_json::Value,
}

pub trait ConversationStore: Send + Sync {
    fn save_conversation(&self, conversation: NewConversation)
        -> Result<ConversationRecord, StoreError>;

    /// Most recent first
    fn recent(&self, limit: usize) -> Result<Vec<ConversationRecord>, StoreError>;

    fn get(&self, id: Uuid) -> Result<Option<ConversationRecord>, StoreError>;

    /// Returns whether a record was removed
    fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// SQLite-backed conversation store
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            // Connection::open reports a missing directory as CANTOPEN
            let _ = std::fs::create_dir_all(parent);
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                user_input TEXT NOT NULL,
                agent_type TEXT NOT NULL,
                ai_output TEXT NOT NULL,
                metadata TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_created ON conversations(created_at);
            CREATE INDEX IF NOT EXISTS idx_conversations_agent ON conversations(agent_type);
        "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        f(&conn)
    }
}

/// Raw column values; parsed outside the rusqlite row callback
struct RawRow {
    id: String,
    created_at: String,
    user_input: String,
    agent_type: String,
    ai_output: String,
    metadata: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            user_input: row.get(2)?,
            agent_type: row.get(3)?,
            ai_output: row.get(4)?,
            metadata: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<ConversationRecord, StoreError> {
        let id = Uuid::parse_str(&self.id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
            })?
            .with_timezone(&Utc);

        Ok(ConversationRecord {
            id,
            created_at,
            user_input: self.user_input,
            agent_type: self.agent_type,
            ai_output: self.ai_output,
            metadata: serde_json::from_str(&self.metadata)?,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, created_at, user_input, agent_type, ai_output, metadata FROM conversations";

impl ConversationStore for SqliteConversationStore {
    fn save_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<ConversationRecord, StoreError> {
        let record = ConversationRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            user_input: conversation.user_input,
            agent_type: conversation.agent_type,
            ai_output: conversation.ai_output,
            metadata: conversation.metadata,
        };
        let metadata = serde_json::to_string(&record.metadata)?;

        self.with_conn(|conn| {
            conn.execute(
                r#"INSERT INTO conversations
                   (id, created_at, user_input, agent_type, ai_output, metadata)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    record.id.to_string(),
                    record.created_at.to_rfc3339(),
                    record.user_input,
                    record.agent_type,
                    record.ai_output,
                    metadata
                ],
            )?;
            Ok(())
        })?;

        tracing::debug!(
            conversation_id = %record.id,
            agent_type = %record.agent_type,
            "Saved conversation"
        );
        Ok(record)
    }

    fn recent(&self, limit: usize) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                SELECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([limit as i64], RawRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(RawRow::into_record).collect()
    }

    fn get(&self, id: Uuid) -> Result<Option<ConversationRecord>, StoreError> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                    [id.to_string()],
                    RawRow::from_row,
                )
                .optional()?)
        })?;

        row.map(RawRow::into_record).transpose()
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM conversations WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }
}
