//! SQLite session store.
//!
//! One database file (`localmind.db`) holds four tables:
//! - `users` and `model_configs`: profile records
//! - `chats`: the transcript, one row per turn
//! - `session_summaries`: the chapter ledger
//!
//! Compaction commits run inside a single transaction and use a
//! compare-and-swap update on `is_summarized`, so two concurrent compaction
//! attempts can never produce overlapping chapters.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use localmind_core::error::StoreError;
use localmind_core::message::{Role, SummaryChapter, Turn, TurnId};
use localmind_core::profile::{
    ModelProfile, ProfileProvider, STANDARD_CHAT_TEMPLATE, UserProfile, DEFAULT_CONTEXT_LIMIT,
    DEFAULT_MODEL_SYSTEM_PROMPT,
};
use localmind_core::store::{SessionStore, SummaryLedger, TranscriptStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Connect a pool with the pragmas every LocalMind database uses.
///
/// In-memory databases are per-connection, so they get a single connection.
pub(crate) async fn connect(
    options: SqliteConnectOptions,
    in_memory: bool,
) -> Result<SqlitePool, sqlx::Error> {
    let options = options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("foreign_keys", "ON");

    SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 4 })
        .connect_with(options)
        .await
}

/// Parse a stored timestamp: RFC 3339 from this crate, or SQLite's
/// `CURRENT_TIMESTAMP` format from older databases.
pub(crate) fn parse_timestamp(raw: Option<String>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// `?, ?, ?` for an `IN (...)` clause.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// The production transcript store, summary ledger and profile provider.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a store from a SQLite URL or filename.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?;
        let pool = connect(options, url.contains(":memory:"))
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite session store initialized at {url}");
        Ok(store)
    }

    /// Open (or create) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        let options = SqliteConnectOptions::new().filename(path);
        let pool = connect(options, false)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite session store initialized at {}", path.display());
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        store.seed_default_user().await?;
        Ok(store)
    }

    /// Create tables and bring legacy tables up to the current shape.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id       TEXT PRIMARY KEY,
                password_hash TEXT,
                display_name  TEXT,
                workspace     TEXT,
                preferences   TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS model_configs (
                model_id           TEXT PRIMARY KEY,
                display_name       TEXT,
                context_limit      INTEGER,
                base_system_prompt TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("model_configs table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id    TEXT,
                role          TEXT,
                content       TEXT,
                timestamp     DATETIME DEFAULT CURRENT_TIMESTAMP,
                model_used    TEXT,
                is_summarized BOOLEAN DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chats table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_summaries (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id    TEXT,
                content       TEXT,
                start_chat_id INTEGER,
                end_chat_id   INTEGER,
                timestamp     DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("session_summaries table: {e}")))?;

        // Databases from before compaction existed have no is_summarized column.
        let columns = sqlx::query("PRAGMA table_info(chats)")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("chats table_info: {e}")))?;
        let has_flag = columns
            .iter()
            .any(|row| row.try_get::<String, _>("name").is_ok_and(|n| n == "is_summarized"));
        if !has_flag {
            info!("Migration: adding 'is_summarized' column to 'chats'");
            sqlx::query("ALTER TABLE chats ADD COLUMN is_summarized BOOLEAN DEFAULT 0")
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("is_summarized column: {e}")))?;
        }

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chats_session_backlog ON chats(session_id, is_summarized, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("backlog index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_summaries_session ON session_summaries(session_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("summaries index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Insert the demo user into an empty `users` table.
    async fn seed_default_user(&self) -> Result<(), StoreError> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT users: {e}")))?;
        if users > 0 {
            return Ok(());
        }

        info!("Seeding default user");
        let preferences = serde_json::json!({
            "style": "structural",
            "detail_level": "high",
            "show_prompt_inspector": true
        });
        sqlx::query(
            "INSERT INTO users (user_id, display_name, workspace, preferences) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind("demo_user")
        .bind("Jacob")
        .bind("LocalMIND Lab")
        .bind(preferences.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Seed user: {e}")))?;
        Ok(())
    }

    /// Insert or replace a user profile.
    pub async fn put_user_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let preferences = serde_json::Value::Object(profile.preferences.clone()).to_string();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, display_name, workspace, preferences)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                workspace = excluded.workspace,
                preferences = excluded.preferences
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.display_name)
        .bind(&profile.workspace)
        .bind(preferences)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT user: {e}")))?;
        Ok(())
    }

    /// Insert or replace a model profile.
    pub async fn put_model_profile(&self, profile: &ModelProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO model_configs (model_id, display_name, context_limit, base_system_prompt)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(model_id) DO UPDATE SET
                display_name = excluded.display_name,
                context_limit = excluded.context_limit,
                base_system_prompt = excluded.base_system_prompt
            "#,
        )
        .bind(&profile.model_id)
        .bind(&profile.display_name)
        .bind(profile.context_limit as i64)
        .bind(&profile.base_system_prompt)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT model: {e}")))?;
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let session_id: Option<String> = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let role: Option<String> = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: Option<String> = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let timestamp: Option<String> = row.try_get("timestamp").unwrap_or(None);
        let model_used: Option<String> = row.try_get("model_used").unwrap_or(None);
        let summarized: Option<i64> = row.try_get("is_summarized").unwrap_or(None);

        Ok(Turn {
            id,
            session_id: session_id.unwrap_or_default(),
            role: Role::parse(role.as_deref().unwrap_or("assistant")),
            content: content.unwrap_or_default(),
            created_at: parse_timestamp(timestamp),
            model_used,
            summarized: summarized.is_some_and(|flag| flag != 0),
        })
    }

    fn row_to_chapter(row: &sqlx::sqlite::SqliteRow) -> Result<SummaryChapter, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let session_id: Option<String> = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let content: Option<String> = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let start: Option<i64> = row
            .try_get("start_chat_id")
            .map_err(|e| StoreError::QueryFailed(format!("start_chat_id column: {e}")))?;
        let end: Option<i64> = row
            .try_get("end_chat_id")
            .map_err(|e| StoreError::QueryFailed(format!("end_chat_id column: {e}")))?;
        let timestamp: Option<String> = row.try_get("timestamp").unwrap_or(None);

        Ok(SummaryChapter {
            id,
            session_id: session_id.unwrap_or_default(),
            content: content.unwrap_or_default(),
            start_turn_id: start.unwrap_or_default(),
            end_turn_id: end.unwrap_or_default(),
            created_at: parse_timestamp(timestamp),
        })
    }
}

const TURN_COLUMNS: &str = "id, session_id, role, content, timestamp, model_used, is_summarized";
const CHAPTER_COLUMNS: &str = "id, session_id, content, start_chat_id, end_chat_id, timestamp";

#[async_trait]
impl TranscriptStore for SqliteStore {
    async fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        model_used: Option<&str>,
    ) -> Result<TurnId, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO chats (session_id, role, content, timestamp, model_used, is_summarized)
            VALUES (?1, ?2, ?3, ?4, ?5, 0)
            "#,
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .bind(model_used)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT turn: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(session_id, turn_id = id, role = %role, "Appended turn");
        Ok(id)
    }

    async fn count_unsummarized(&self, session_id: &str) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chats WHERE session_id = ?1 AND COALESCE(is_summarized, 0) = 0",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("COUNT backlog: {e}")))?;
        Ok(count as usize)
    }

    async fn oldest_unsummarized(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        let sql = format!(
            "SELECT {TURN_COLUMNS} FROM chats \
             WHERE session_id = ?1 AND COALESCE(is_summarized, 0) = 0 \
             ORDER BY id ASC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT backlog: {e}")))?;
        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn mark_summarized(&self, turn_ids: &[TurnId]) -> Result<usize, StoreError> {
        if turn_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE chats SET is_summarized = 1 \
             WHERE COALESCE(is_summarized, 0) = 0 AND id IN ({})",
            placeholders(turn_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in turn_ids {
            query = query.bind(id);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE is_summarized: {e}")))?;
        Ok(result.rows_affected() as usize)
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let sql = format!(
            "SELECT {TURN_COLUMNS} FROM chats WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT recent: {e}")))?;

        let mut turns = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn all_turns(&self, session_id: &str) -> Result<Vec<Turn>, StoreError> {
        let sql = format!("SELECT {TURN_COLUMNS} FROM chats WHERE session_id = ?1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT turns: {e}")))?;
        rows.iter().map(Self::row_to_turn).collect()
    }
}

#[async_trait]
impl SummaryLedger for SqliteStore {
    async fn append_chapter(
        &self,
        session_id: &str,
        content: &str,
        start_id: TurnId,
        end_id: TurnId,
    ) -> Result<SummaryChapter, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO session_summaries (session_id, content, start_chat_id, end_chat_id, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(session_id)
        .bind(content)
        .bind(start_id)
        .bind(end_id)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chapter: {e}")))?;

        Ok(SummaryChapter {
            id: result.last_insert_rowid(),
            session_id: session_id.to_string(),
            content: content.to_string(),
            start_turn_id: start_id,
            end_turn_id: end_id,
            created_at,
        })
    }

    async fn chapters(&self, session_id: &str) -> Result<Vec<SummaryChapter>, StoreError> {
        let sql = format!(
            "SELECT {CHAPTER_COLUMNS} FROM session_summaries WHERE session_id = ?1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT chapters: {e}")))?;
        rows.iter().map(Self::row_to_chapter).collect()
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn commit_compaction(
        &self,
        session_id: &str,
        content: &str,
        turn_ids: &[TurnId],
    ) -> Result<SummaryChapter, StoreError> {
        let (Some(&start), Some(&end)) = (turn_ids.first(), turn_ids.last()) else {
            return Err(StoreError::QueryFailed(
                "commit_compaction needs at least one turn".into(),
            ));
        };
        let violation = || StoreError::RangeInvariantViolation {
            session_id: session_id.to_string(),
            start_turn_id: start,
            end_turn_id: end,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN: {e}")))?;

        // The range must continue the ledger: no unsummarized turn of this
        // session may precede it, and it must not reach back into a chapter.
        let last_end: Option<i64> =
            sqlx::query_scalar("SELECT MAX(end_chat_id) FROM session_summaries WHERE session_id = ?1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("SELECT last chapter: {e}")))?;
        if last_end.is_some_and(|last| start <= last) {
            warn!(session_id, start_turn_id = start, end_turn_id = end, "Chapter range overlaps ledger");
            return Err(violation());
        }

        let skipped: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chats WHERE session_id = ?1 AND id < ?2 AND COALESCE(is_summarized, 0) = 0",
        )
        .bind(session_id)
        .bind(start)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("COUNT preceding backlog: {e}")))?;
        let in_range: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chats WHERE session_id = ?1 AND id BETWEEN ?2 AND ?3",
        )
        .bind(session_id)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("COUNT range: {e}")))?;
        if skipped > 0 || in_range as usize != turn_ids.len() {
            warn!(session_id, start_turn_id = start, end_turn_id = end, "Chapter range leaves a gap");
            return Err(violation());
        }

        // Compare-and-swap: every selected turn must still be unsummarized.
        let sql = format!(
            "UPDATE chats SET is_summarized = 1 \
             WHERE session_id = ? AND COALESCE(is_summarized, 0) = 0 AND id IN ({})",
            placeholders(turn_ids.len())
        );
        let mut mark = sqlx::query(&sql).bind(session_id);
        for id in turn_ids {
            mark = mark.bind(id);
        }
        let marked = mark
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE is_summarized: {e}")))?
            .rows_affected();
        if marked as usize != turn_ids.len() {
            warn!(
                session_id,
                start_turn_id = start,
                end_turn_id = end,
                marked,
                "Turns already summarized by a concurrent compaction"
            );
            tx.rollback()
                .await
                .map_err(|e| StoreError::Storage(format!("ROLLBACK: {e}")))?;
            return Err(violation());
        }

        let created_at = Utc::now();
        let chapter_id = sqlx::query(
            r#"
            INSERT INTO session_summaries (session_id, content, start_chat_id, end_chat_id, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(session_id)
        .bind(content)
        .bind(start)
        .bind(end)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chapter: {e}")))?
        .last_insert_rowid();

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT: {e}")))?;

        debug!(session_id, chapter_id, start_turn_id = start, end_turn_id = end, "Committed chapter");
        Ok(SummaryChapter {
            id: chapter_id,
            session_id: session_id.to_string(),
            content: content.to_string(),
            start_turn_id: start,
            end_turn_id: end,
            created_at,
        })
    }

    async fn wipe(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN: {e}")))?;
        for table in ["chats", "session_summaries"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Storage(format!("DELETE {table}: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT: {e}")))?;
        info!("Wiped transcript and summary ledger");
        Ok(())
    }
}

#[async_trait]
impl ProfileProvider for SqliteStore {
    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, display_name, workspace, preferences FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT user: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let display_name: Option<String> = row.try_get("display_name").unwrap_or(None);
        let workspace: Option<String> = row.try_get("workspace").unwrap_or(None);
        let preferences: Option<String> = row.try_get("preferences").unwrap_or(None);
        let preferences = preferences
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        Ok(Some(UserProfile {
            user_id: user_id.to_string(),
            display_name: display_name.unwrap_or_else(|| user_id.to_string()),
            workspace: workspace.unwrap_or_default(),
            preferences,
        }))
    }

    async fn get_model_profile(&self, model_id: &str) -> Result<Option<ModelProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT display_name, context_limit, base_system_prompt FROM model_configs WHERE model_id = ?1",
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT model: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let display_name: Option<String> = row.try_get("display_name").unwrap_or(None);
        let context_limit: Option<i64> = row.try_get("context_limit").unwrap_or(None);
        let base_system_prompt: Option<String> = row.try_get("base_system_prompt").unwrap_or(None);

        Ok(Some(ModelProfile {
            model_id: model_id.to_string(),
            display_name: display_name.unwrap_or_else(|| model_id.to_string()),
            context_limit: context_limit
                .and_then(|l| u32::try_from(l).ok())
                .unwrap_or(DEFAULT_CONTEXT_LIMIT),
            base_system_prompt: base_system_prompt
                .unwrap_or_else(|| DEFAULT_MODEL_SYSTEM_PROMPT.to_string()),
            prompt_template: STANDARD_CHAT_TEMPLATE.to_string(),
        }))
    }
}
