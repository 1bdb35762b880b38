//! Durable record of past conversations.
//!
//! Every completed exchange appends one row holding a full snapshot of the
//! conversation so far. Rows are never updated or deleted; a conversation that
//! runs for ten exchanges leaves ten rows behind, each a prefix of the next.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Once;
use std::time::Duration;

use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;
use time::error::IndeterminateOffset;
use time::macros::format_description;

use crate::observability::{STORE_APPENDS, STORE_ERRORS};
use crate::types::Turn;
use crate::{Error, Result};

/// Display name used when the triggering prompt is empty.
pub const UNTITLED_CHAT: &str = "Untitled Chat";

/// Number of characters of the prompt kept in a display name.
pub const CHAT_NAME_CHARS: usize = 50;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    user_id TEXT NOT NULL,
    chat_name TEXT NOT NULL,
    messages TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_user_timestamp ON chats(user_id, timestamp);
"#;

/// One stored conversation snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRecord {
    /// Auto-assigned identifier.
    pub id: i64,
    /// Local time of the write, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// The user the conversation belongs to.
    pub user_id: String,
    /// Short display name derived from the prompt that triggered the write.
    pub chat_name: String,
    /// The conversation at the time of the write.
    pub turns: Vec<Turn>,
}

#[derive(FromRow)]
struct ChatRow {
    id: i64,
    timestamp: String,
    user_id: String,
    chat_name: String,
    messages: String,
}

impl TryFrom<ChatRow> for ConversationRecord {
    type Error = Error;

    fn try_from(row: ChatRow) -> Result<Self> {
        let turns = serde_json::from_str(&row.messages).map_err(|e| {
            Error::database(
                format!("chat {} has unreadable messages: {e}", row.id),
                Some(Box::new(e)),
            )
        })?;
        Ok(Self {
            id: row.id,
            timestamp: row.timestamp,
            user_id: row.user_id,
            chat_name: row.chat_name,
            turns,
        })
    }
}

/// Derive a display name from the prompt that triggered a write.
///
/// ```
/// assert_eq!(parley::store::chat_name(""), "Untitled Chat");
/// assert_eq!(parley::store::chat_name("Hello"), "Hello");
/// ```
pub fn chat_name(prompt: &str) -> String {
    if prompt.is_empty() {
        UNTITLED_CHAT.to_string()
    } else {
        prompt.chars().take(CHAT_NAME_CHARS).collect()
    }
}

static UTC_FALLBACK: Once = Once::new();

fn local_or_utc(local: std::result::Result<OffsetDateTime, IndeterminateOffset>) -> OffsetDateTime {
    match local {
        Ok(now) => now,
        Err(err) => {
            UTC_FALLBACK.call_once(|| {
                tracing::warn!(error = %err, "local UTC offset unknown; chat timestamps are in UTC");
            });
            OffsetDateTime::now_utc()
        }
    }
}

/// The current local time in the stored timestamp format.
///
/// Falls back to UTC when the local offset cannot be determined, with a
/// warning the first time that happens.
pub fn local_timestamp() -> Result<String> {
    let now = local_or_utc(OffsetDateTime::now_local());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .map_err(|e| Error::database(format!("cannot format timestamp: {e}"), Some(Box::new(e))))
}

/// Handle to the conversation database.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Open or create the database at `path` and initialize its schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::database(
                    format!("cannot open {}: {e}", path.display()),
                    Some(Box::new(e)),
                )
            })?;

        let store = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        store.initialize().await?;
        tracing::debug!(path = %path.display(), "opened record store");
        Ok(store)
    }

    /// A private, initialized database that lives as long as the handle.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool, path: None };
        store.initialize().await?;
        Ok(store)
    }

    /// Create the table if it does not exist.
    ///
    /// Safe to call any number of times; existing rows are kept.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await.map_err(|e| {
            STORE_ERRORS.click();
            Error::database(format!("cannot initialize schema: {e}"), Some(Box::new(e)))
        })?;
        Ok(())
    }

    /// The database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Store a snapshot of `turns` stamped with the current local time.
    ///
    /// Returns the identifier of the new row.
    pub async fn append(&self, user_id: &str, chat_name: &str, turns: &[Turn]) -> Result<i64> {
        let timestamp = local_timestamp()?;
        self.insert(user_id, chat_name, turns, &timestamp).await
    }

    pub(crate) async fn insert(
        &self,
        user_id: &str,
        chat_name: &str,
        turns: &[Turn],
        timestamp: &str,
    ) -> Result<i64> {
        let messages = serde_json::to_string(turns).map_err(|e| {
            STORE_ERRORS.click();
            Error::database(format!("cannot serialize turns: {e}"), Some(Box::new(e)))
        })?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO chats (timestamp, user_id, chat_name, messages)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(timestamp)
        .bind(user_id)
        .bind(chat_name)
        .bind(&messages)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            STORE_ERRORS.click();
            Error::database(format!("cannot save chat: {e}"), Some(Box::new(e)))
        })?;

        STORE_APPENDS.click();
        tracing::debug!(id, user_id, turns = turns.len(), "saved chat");
        Ok(id)
    }

    /// Every conversation of `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ConversationRecord>> {
        let rows = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, timestamp, user_id, chat_name, messages
            FROM chats
            WHERE user_id = ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ConversationRecord::try_from).collect()
    }

    /// One conversation of `user_id`.
    ///
    /// Another user's conversation is reported as not found.
    pub async fn get(&self, user_id: &str, id: i64) -> Result<ConversationRecord> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, timestamp, user_id, chat_name, messages
            FROM chats
            WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row.try_into(),
            None => Err(Error::not_found(
                format!("no chat belongs to {user_id}"),
                Some(id),
            )),
        }
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
