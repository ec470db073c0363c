//! SQLite persistence for accounts, chat history, journal entries and
//! per-user context.
//!
//! One connection behind a mutex; every call is a short synchronous
//! statement. Emotion payloads are stored as JSON text.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use sonia_core::{EmotionData, JournalEntry, Message, MessageKind, MessageRole, User, UserContext};
use thiserror::Error;
use tracing::info;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Lock error")]
    Lock,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Already exists: {0}")]
    Duplicate(String),
}

/// SQLite-backed store for all per-user state.
pub struct WellnessStore {
    conn: Mutex<Connection>,
}

impl WellnessStore {
    /// Opens (or creates) the database at `path`, creating parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        info!("Database initialized at {}", path.display());
        Ok(store)
    }

    /// Creates an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL DEFAULT 'text',
                emotion TEXT,
                audio_url TEXT,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS journal_entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                emotion TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS user_contexts (
                user_id TEXT PRIMARY KEY,
                context TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id, seq);
            CREATE INDEX IF NOT EXISTS idx_journal_user ON journal_entries(user_id, timestamp);
            "#,
        )?;

        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────────

    /// Inserts a new user; a taken email yields [`StoreError::Duplicate`].
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.name, user.email, user.password_hash, user.created_at],
        );
        match result {
            Ok(_) => {
                info!("Created user {}", user.id);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::Duplicate(user.email.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // ── Chat history ─────────────────────────────────────────────────────────

    /// Appends a message to the user's history.
    pub fn append_message(&self, user_id: &str, message: &Message) -> Result<(), StoreError> {
        let emotion = message.emotion.as_ref().map(serde_json::to_string).transpose()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (id, user_id, role, content, timestamp, kind, emotion, audio_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id,
                user_id,
                message.role.as_str(),
                message.content,
                message.timestamp,
                message.kind.as_str(),
                emotion,
                message.audio_url,
            ],
        )?;
        Ok(())
    }

    /// All of a user's messages in the order they were appended.
    pub fn list_messages(&self, user_id: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, role, content, timestamp, kind, emotion, audio_url
             FROM messages WHERE user_id = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, role, content, timestamp, kind, emotion, audio_url) = row?;
            let emotion: Option<EmotionData> = emotion.as_deref().map(serde_json::from_str).transpose()?;
            messages.push(Message {
                id,
                role: MessageRole::from_str(&role).unwrap_or(MessageRole::User),
                content,
                timestamp,
                emotion,
                kind: MessageKind::from_str(&kind),
                audio_url,
            });
        }
        Ok(messages)
    }

    // ── Journal ──────────────────────────────────────────────────────────────

    pub fn add_journal_entry(&self, user_id: &str, entry: &JournalEntry) -> Result<(), StoreError> {
        let emotion = serde_json::to_string(&entry.emotion)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO journal_entries (id, user_id, title, content, timestamp, emotion)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![entry.id, user_id, entry.title, entry.content, entry.timestamp, emotion],
        )?;
        Ok(())
    }

    /// A user's journal entries, oldest first.
    pub fn list_journal_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, content, timestamp, emotion
             FROM journal_entries WHERE user_id = ?1 ORDER BY timestamp ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, title, content, timestamp, emotion) = row?;
            entries.push(JournalEntry {
                id,
                title,
                content,
                timestamp,
                emotion: serde_json::from_str(&emotion)?,
            });
        }
        Ok(entries)
    }

    /// Deletes an entry owned by `user_id`; returns whether anything was removed.
    pub fn delete_journal_entry(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM journal_entries WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(removed > 0)
    }

    // ── Context ──────────────────────────────────────────────────────────────

    /// The user's saved context, or the default when none was saved.
    pub fn get_context(&self, user_id: &str) -> Result<UserContext, StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT context FROM user_contexts WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(UserContext::default()),
        }
    }

    pub fn put_context(&self, user_id: &str, context: &UserContext) -> Result<(), StoreError> {
        let raw = serde_json::to_string(context)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO user_contexts (user_id, context) VALUES (?1, ?2)",
            params![user_id, raw],
        )?;
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonia_core::{EmotionLabel, Language, LifeContext};

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            name: "Asha".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: 1_700_000_000_000,
        }
    }

    fn store_with_user() -> WellnessStore {
        let store = WellnessStore::in_memory().unwrap();
        store.create_user(&user("u1", "asha@example.com")).unwrap();
        store
    }

    #[test]
    fn test_user_crud() {
        let store = store_with_user();

        let found = store.find_user_by_email("asha@example.com").unwrap().unwrap();
        assert_eq!(found.id, "u1");
        assert_eq!(store.get_user("u1").unwrap().unwrap().email, "asha@example.com");
        assert!(store.get_user("nobody").unwrap().is_none());
        assert!(store.find_user_by_email("other@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email() {
        let store = store_with_user();
        let err = store.create_user(&user("u2", "asha@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn test_messages_keep_arrival_order() {
        let store = store_with_user();

        let first = Message::new("m1", MessageRole::User, "I feel tired", 200);
        let second = Message::new("m2", MessageRole::Assistant, "That sounds heavy", 100)
            .with_emotion(EmotionData::new(EmotionLabel::Burnout, 0.9, 75.0));
        let third = Message::new("m3", MessageRole::User, "voice note", 300).with_kind(MessageKind::Voice);
        store.append_message("u1", &first).unwrap();
        store.append_message("u1", &second).unwrap();
        store.append_message("u1", &third).unwrap();

        let history = store.list_messages("u1").unwrap();
        assert_eq!(history, vec![first, second, third]);
        assert!(store.list_messages("someone-else").unwrap().is_empty());
    }

    #[test]
    fn test_journal_entries() {
        let store = store_with_user();

        let later = JournalEntry {
            id: "j2".into(),
            title: "Evening".into(),
            content: "calmer now".into(),
            timestamp: 2_000,
            emotion: EmotionData::neutral(),
        };
        let earlier = JournalEntry {
            id: "j1".into(),
            title: "Morning".into(),
            content: "anxious about exams".into(),
            timestamp: 1_000,
            emotion: EmotionData::new(EmotionLabel::Anxiety, 0.8, 70.0),
        };
        store.add_journal_entry("u1", &later).unwrap();
        store.add_journal_entry("u1", &earlier).unwrap();

        let entries = store.list_journal_entries("u1").unwrap();
        assert_eq!(entries.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["j1", "j2"]);
        assert_eq!(entries[0].emotion.label, EmotionLabel::Anxiety);

        assert!(!store.delete_journal_entry("someone-else", "j1").unwrap());
        assert!(store.delete_journal_entry("u1", "j1").unwrap());
        assert!(!store.delete_journal_entry("u1", "j1").unwrap());
        assert_eq!(store.list_journal_entries("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_context_defaults_then_persists() {
        let store = store_with_user();
        assert_eq!(store.get_context("u1").unwrap(), UserContext::default());

        let ctx = UserContext { role: LifeContext::Student, language: Language::Hindi };
        store.put_context("u1", &ctx).unwrap();
        assert_eq!(store.get_context("u1").unwrap(), ctx);

        let ctx = UserContext { role: LifeContext::PersonalLife, language: Language::Hindi };
        store.put_context("u1", &ctx).unwrap();
        assert_eq!(store.get_context("u1").unwrap(), ctx);
    }

    #[test]
    fn test_file_backed_store_creates_directory() {
        let dir = std::env::temp_dir().join(format!("sonia-store-{}", std::process::id()));
        let path = dir.join("nested").join("sonia.db");
        {
            let store = WellnessStore::new(&path).unwrap();
            store.create_user(&user("u1", "a@b.c")).unwrap();
        }
        let reopened = WellnessStore::new(&path).unwrap();
        assert!(reopened.get_user("u1").unwrap().is_some());
        let _ = fs::remove_dir_all(dir);
    }
}
